//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **AuthService**: Registration, login, JWT and refresh sessions
//! - **UserService**: User profile management
//! - **FriendshipService**: Friend requests, friends and blocks
//! - **NotificationService**: Inbox persistence and real-time pushes

pub mod auth_service;
pub mod friendship_service;
pub mod notification_service;
pub mod user_service;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export auth service types
pub use auth_service::{AuthError, AuthService, AuthServiceImpl, AuthTokens, Claims};

// Re-export user service types
pub use user_service::{UpdateProfileDto, UserDto, UserError, UserService, UserServiceImpl};

// Re-export friendship service types
pub use friendship_service::{
    FriendDto, FriendshipDto, FriendshipError, FriendshipService, FriendshipServiceImpl,
    RelationshipDto, RequestDirection,
};

// Re-export notification service types
pub use notification_service::{
    Broadcaster, NewNotification, NotificationError, NotificationService, NotificationServiceImpl,
};
