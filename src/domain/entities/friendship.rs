//! Friendship entity and repository trait.
//!
//! Maps to the `friendships` table. A single row describes the relationship
//! between an unordered pair of users; `user_id` is whoever created the row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Relationship status between two users.
///
/// `None` is never persisted; it is reported when no row exists for the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    #[default]
    None,
    Pending,
    Accepted,
    Blocked,
}

impl FriendshipStatus {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => Self::Pending,
            "accepted" => Self::Accepted,
            "blocked" => Self::Blocked,
            _ => Self::None,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for FriendshipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A relationship row.
///
/// Maps to the `friendships` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - user_id: BIGINT NOT NULL REFERENCES users(id) (requester)
/// - friend_id: BIGINT NOT NULL REFERENCES users(id) (addressee)
/// - status: VARCHAR(16) NOT NULL
/// - blocked_by: BIGINT NULL (set iff status = 'blocked')
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
/// - accepted_at: TIMESTAMPTZ NULL
///
/// Unique on `(LEAST(user_id, friend_id), GREATEST(user_id, friend_id))`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friendship {
    pub id: i64,
    pub user_id: i64,
    pub friend_id: i64,
    pub status: FriendshipStatus,
    pub blocked_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Friendship {
    /// New pending request from `requester` to `addressee`.
    pub fn new_request(id: i64, requester: i64, addressee: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: requester,
            friend_id: addressee,
            status: FriendshipStatus::Pending,
            blocked_by: None,
            created_at: now,
            updated_at: now,
            accepted_at: None,
        }
    }

    /// Whether `user` is one of the two parties.
    pub fn involves(&self, user: i64) -> bool {
        self.user_id == user || self.friend_id == user
    }

    /// The party that is not `user`.
    pub fn other_party(&self, user: i64) -> i64 {
        if self.user_id == user {
            self.friend_id
        } else {
            self.user_id
        }
    }

    /// Whether `user` created the row (sent the request).
    pub fn is_requester(&self, user: i64) -> bool {
        self.user_id == user
    }

    /// Whether `user` is the addressee of a pending request.
    pub fn is_addressee(&self, user: i64) -> bool {
        self.friend_id == user
    }

    pub fn is_blocked_by(&self, user: i64) -> bool {
        self.status == FriendshipStatus::Blocked && self.blocked_by == Some(user)
    }
}

/// Which side of a user's relationships to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendshipFilter {
    /// Accepted relationships on either side.
    Friends,
    /// Pending requests addressed to the user.
    Incoming,
    /// Pending requests the user sent.
    Outgoing,
    /// Blocks the user issued.
    BlockedByMe,
}

/// Repository trait for Friendship data access operations.
#[async_trait]
pub trait FriendshipRepository: Send + Sync {
    /// Find the row for the unordered pair `{a, b}`.
    async fn find_between(&self, a: i64, b: i64) -> Result<Option<Friendship>, AppError>;

    /// Insert a new row. A row for the same pair yields `AppError::Conflict`.
    async fn create(&self, friendship: &Friendship) -> Result<Friendship, AppError>;

    /// Move a pending row to accepted. Returns `None` if the row is no longer pending.
    async fn accept(&self, id: i64) -> Result<Option<Friendship>, AppError>;

    /// Create the pair's row as blocked by `blocker`, or overwrite a row that is
    /// not blocked yet. Returns `None` if the pair is already blocked.
    async fn upsert_block(&self, id: i64, blocker: i64, target: i64) -> Result<Option<Friendship>, AppError>;

    /// Delete a row only if it still has `expected` status. Returns whether a row was deleted.
    async fn delete_with_status(&self, id: i64, expected: FriendshipStatus) -> Result<bool, AppError>;

    /// Page of rows for `user_id` matching `filter`, newest first.
    async fn list_for_user(
        &self,
        user_id: i64,
        filter: FriendshipFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Friendship>, AppError>;

    /// Total rows for `user_id` matching `filter`.
    async fn count_for_user(&self, user_id: i64, filter: FriendshipFilter) -> Result<i64, AppError>;

    /// IDs of all accepted friends of `user_id`.
    async fn friend_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError>;
}
