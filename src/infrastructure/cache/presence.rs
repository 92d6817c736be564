//! Presence tracking.
//!
//! Counts live hub connections per user. A user is online while the count is
//! positive. The Redis store shares the count across instances; the local
//! store is used when Redis is disabled.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::instrument;

use super::keys;
use crate::shared::error::AppError;

#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Record a new connection. Returns true if the user just came online.
    async fn connect(&self, user_id: i64) -> Result<bool, AppError>;

    /// Record a closed connection. Returns true if the user just went offline.
    async fn disconnect(&self, user_id: i64) -> Result<bool, AppError>;

    /// Extend the presence entry of a live user (called on heartbeat).
    async fn refresh(&self, user_id: i64) -> Result<(), AppError>;

    async fn is_online(&self, user_id: i64) -> Result<bool, AppError>;

    /// Subset of `user_ids` that are online.
    async fn online_among(&self, user_ids: &[i64]) -> Result<HashSet<i64>, AppError>;
}

/// Decrement and delete at zero in one step, so a concurrent connect cannot
/// land between the two and be wiped. A missing key means the user already
/// timed out: returns -1 and leaves the key absent.
static DISCONNECT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        if redis.call('EXISTS', KEYS[1]) == 0 then
            return -1
        end
        local n = redis.call('DECR', KEYS[1])
        if n <= 0 then
            redis.call('DEL', KEYS[1])
            return 0
        end
        return n
        "#,
    )
});

/// Extend the TTL, or restore a counter that expired under a live connection.
/// Returns 1 when the counter was restored.
static REFRESH: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        if redis.call('EXPIRE', KEYS[1], ARGV[1]) == 1 then
            return 0
        end
        redis.call('SET', KEYS[1], 1, 'EX', ARGV[1])
        return 1
        "#,
    )
});

/// Redis-backed presence: `presence:{id}` holds the connection count with a TTL,
/// so a crashed instance's users fall offline once heartbeats stop refreshing it.
#[derive(Clone)]
pub struct RedisPresenceStore {
    redis: ConnectionManager,
    ttl_secs: u64,
}

impl RedisPresenceStore {
    pub fn new(redis: ConnectionManager, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    #[instrument(skip(self))]
    async fn connect(&self, user_id: i64) -> Result<bool, AppError> {
        let key = keys::presence(user_id);
        let mut conn = self.redis.clone();

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .expire(&key, self.ttl_secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count == 1)
    }

    #[instrument(skip(self))]
    async fn disconnect(&self, user_id: i64) -> Result<bool, AppError> {
        let key = keys::presence(user_id);
        let mut conn = self.redis.clone();

        let remaining: i64 = DISCONNECT.key(&key).invoke_async(&mut conn).await?;
        Ok(remaining == 0)
    }

    async fn refresh(&self, user_id: i64) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        let restored: i64 = REFRESH
            .key(keys::presence(user_id))
            .arg(self.ttl_secs as i64)
            .invoke_async(&mut conn)
            .await?;
        if restored == 1 {
            tracing::debug!(user_id, "Presence counter expired under a live connection, restored");
        }
        Ok(())
    }

    async fn is_online(&self, user_id: i64) -> Result<bool, AppError> {
        let mut conn = self.redis.clone();
        let count: Option<i64> = conn.get(keys::presence(user_id)).await?;
        Ok(count.unwrap_or(0) > 0)
    }

    async fn online_among(&self, user_ids: &[i64]) -> Result<HashSet<i64>, AppError> {
        if user_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let redis_keys: Vec<String> = user_ids.iter().map(|id| keys::presence(id)).collect();
        let mut conn = self.redis.clone();
        let counts: Vec<Option<i64>> = redis::cmd("MGET")
            .arg(&redis_keys)
            .query_async(&mut conn)
            .await?;

        Ok(user_ids
            .iter()
            .zip(counts)
            .filter(|(_, count)| count.unwrap_or(0) > 0)
            .map(|(id, _)| *id)
            .collect())
    }
}

/// In-process presence for single-instance deployments.
#[derive(Default)]
pub struct LocalPresenceStore {
    connections: DashMap<i64, usize>,
}

impl LocalPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceStore for LocalPresenceStore {
    async fn connect(&self, user_id: i64) -> Result<bool, AppError> {
        let mut count = self.connections.entry(user_id).or_insert(0);
        *count += 1;
        Ok(*count == 1)
    }

    async fn disconnect(&self, user_id: i64) -> Result<bool, AppError> {
        let went_offline = match self.connections.get_mut(&user_id) {
            Some(mut count) => {
                *count = count.saturating_sub(1);
                *count == 0
            }
            None => return Ok(false),
        };

        if went_offline {
            self.connections.remove_if(&user_id, |_, count| *count == 0);
        }
        Ok(went_offline)
    }

    async fn refresh(&self, _user_id: i64) -> Result<(), AppError> {
        Ok(())
    }

    async fn is_online(&self, user_id: i64) -> Result<bool, AppError> {
        Ok(self.connections.get(&user_id).map(|c| *c > 0).unwrap_or(false))
    }

    async fn online_among(&self, user_ids: &[i64]) -> Result<HashSet<i64>, AppError> {
        let mut online = HashSet::new();
        for id in user_ids {
            if self.is_online(*id).await? {
                online.insert(*id);
            }
        }
        Ok(online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_presence_counts_connections() {
        let store = LocalPresenceStore::new();

        assert!(store.connect(1).await.unwrap());
        assert!(!store.connect(1).await.unwrap());
        assert!(store.is_online(1).await.unwrap());

        assert!(!store.disconnect(1).await.unwrap());
        assert!(store.is_online(1).await.unwrap());
        assert!(store.disconnect(1).await.unwrap());
        assert!(!store.is_online(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_local_disconnect_unknown_user() {
        let store = LocalPresenceStore::new();
        assert!(!store.disconnect(5).await.unwrap());
    }

    #[tokio::test]
    async fn test_local_interleaved_connections_go_offline_once() {
        let store = LocalPresenceStore::new();

        assert!(store.connect(7).await.unwrap());
        assert!(!store.connect(7).await.unwrap());
        assert!(!store.disconnect(7).await.unwrap());
        store.refresh(7).await.unwrap();
        assert!(store.is_online(7).await.unwrap());

        assert!(store.disconnect(7).await.unwrap());
        assert!(!store.disconnect(7).await.unwrap());
        assert!(!store.is_online(7).await.unwrap());
    }

    #[tokio::test]
    async fn test_local_online_among() {
        let store = LocalPresenceStore::new();
        store.connect(1).await.unwrap();
        store.connect(3).await.unwrap();

        let online = store.online_among(&[1, 2, 3]).await.unwrap();
        assert_eq!(online, HashSet::from([1, 3]));
    }

    async fn redis_store(ttl_secs: u64) -> RedisPresenceStore {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let client = redis::Client::open(url).unwrap();
        RedisPresenceStore::new(ConnectionManager::new(client).await.unwrap(), ttl_secs)
    }

    fn fresh_user_id() -> i64 {
        (uuid::Uuid::new_v4().as_u128() >> 65) as i64
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_redis_interleaved_connections_go_offline_once() {
        let store = redis_store(60).await;
        let user = fresh_user_id();

        assert!(store.connect(user).await.unwrap());
        assert!(!store.connect(user).await.unwrap());
        assert!(!store.disconnect(user).await.unwrap());
        store.refresh(user).await.unwrap();
        assert!(store.is_online(user).await.unwrap());

        assert!(store.disconnect(user).await.unwrap());
        assert!(!store.disconnect(user).await.unwrap());
        assert!(!store.is_online(user).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_redis_refresh_restores_expired_counter() {
        let store = redis_store(60).await;
        let user = fresh_user_id();
        store.connect(user).await.unwrap();

        // Simulate the TTL lapsing while the socket stays open.
        let mut conn = store.redis.clone();
        conn.del::<_, ()>(keys::presence(user)).await.unwrap();
        assert!(!store.is_online(user).await.unwrap());

        store.refresh(user).await.unwrap();
        assert!(store.is_online(user).await.unwrap());
        assert!(store.disconnect(user).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_redis_concurrent_connect_and_disconnect_keep_count() {
        let store = redis_store(60).await;
        let user = fresh_user_id();

        // Short-lived sockets churn while one socket opens and stays open.
        let mut tasks = Vec::new();
        for i in 0..50 {
            let s = store.clone();
            tasks.push(tokio::spawn(async move {
                s.connect(user).await.unwrap();
                if i != 25 {
                    s.disconnect(user).await.unwrap();
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        assert!(store.is_online(user).await.unwrap());
        assert!(store.disconnect(user).await.unwrap());
        assert!(!store.is_online(user).await.unwrap());
    }
}
