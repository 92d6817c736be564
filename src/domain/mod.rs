//! # Domain Layer
//!
//! The domain layer contains the core business logic of the community hub.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Core domain entities (User, Session, Friendship, Notification)
//! - **value_objects**: Immutable value types (HubGroup, RoomName)
//! - **services**: Domain services (FriendshipPolicy)
//! - **events**: Named real-time events pushed through the hub
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts

pub mod entities;
pub mod events;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use events::*;
pub use value_objects::*;
