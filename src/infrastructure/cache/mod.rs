//! Cache Module
//!
//! Redis connection management and presence tracking.
//!
//! ```text
//! +-------------------+
//! |  Hub / Services   |
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! |  PresenceStore    |  <-- Abstract interface
//! +-------------------+
//!      |         |
//!      v         v
//!   Redis      Local (single instance)
//! ```

mod presence;

pub use presence::{LocalPresenceStore, PresenceStore, RedisPresenceStore};

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Cache key prefixes.
pub mod keys {
    /// Prefix for user presence counters (e.g., "presence:user_id")
    pub const USER_PRESENCE: &str = "presence:";

    #[inline]
    pub fn presence(user_id: impl std::fmt::Display) -> String {
        format!("{}{}", USER_PRESENCE, user_id)
    }
}
