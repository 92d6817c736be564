//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! - **HubGroup**: Real-time broadcast target (`user_{id}` or `room_{name}`)
//! - **RoomName**: Validated room identifier

mod hub_group;

pub use hub_group::*;
