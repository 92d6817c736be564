//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! ## Available Repositories
//!
//! - **PgUserRepository** - User accounts
//! - **PgSessionRepository** - Refresh token sessions
//! - **PgFriendshipRepository** - One relationship row per user pair
//! - **PgNotificationRepository** - Notification inbox
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use crate::infrastructure::repositories::{PgFriendshipRepository, PgUserRepository};
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let user_repo = PgUserRepository::new(pool.clone());
//!     let friendship_repo = PgFriendshipRepository::new(pool);
//! }
//! ```

pub mod friendship_repository;
pub mod notification_repository;
pub mod session_repository;
pub mod user_repository;

pub use friendship_repository::PgFriendshipRepository;
pub use notification_repository::PgNotificationRepository;
pub use session_repository::PgSessionRepository;
pub use user_repository::PgUserRepository;
