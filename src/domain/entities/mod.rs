//! # Domain Entities
//!
//! Core domain entities of the community platform.
//! All entities map directly to their corresponding database tables.
//!
//! - **User**: Member account with authentication data and profile
//! - **Session**: Refresh token sessions
//! - **Friendship**: One relationship row per unordered user pair
//! - **Notification**: Persisted inbox entries behind real-time pushes
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer.

mod friendship;
mod notification;
mod session;
mod user;

pub use friendship::{Friendship, FriendshipFilter, FriendshipRepository, FriendshipStatus};
pub use notification::{Notification, NotificationKind, NotificationRepository};
pub use session::{Session, SessionRepository};
pub use user::{User, UserRepository};
