//! # Domain Services
//!
//! Domain services encapsulate business rules that don't naturally belong to
//! a single entity.
//!
//! - **FriendshipPolicy**: Friendship state machine (which transitions are legal)

mod friendship_policy;

pub use friendship_policy::*;
