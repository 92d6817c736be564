//! Notification entity and repository trait.
//!
//! Maps to the `notifications` table. Notifications are the persisted half
//! of the real-time layer: the hub push is best-effort, the row is not.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    FriendRequest,
    FriendAccepted,
    #[default]
    System,
}

impl NotificationKind {
    pub fn from_str(s: &str) -> Self {
        match s {
            "friend_request" => Self::FriendRequest,
            "friend_accepted" => Self::FriendAccepted,
            _ => Self::System,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FriendRequest => "friend_request",
            Self::FriendAccepted => "friend_accepted",
            Self::System => "system",
        }
    }
}

/// A notification in a user's inbox.
///
/// Maps to the `notifications` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - user_id: BIGINT NOT NULL REFERENCES users(id) (recipient)
/// - actor_id: BIGINT NULL REFERENCES users(id)
/// - kind: VARCHAR(32) NOT NULL
/// - message: TEXT NOT NULL
/// - link: TEXT NULL
/// - is_read: BOOLEAN NOT NULL DEFAULT FALSE
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub actor_id: Option<i64>,
    pub kind: NotificationKind,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Repository trait for Notification data access operations.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<Notification, AppError>;

    /// Page of a user's notifications, newest first.
    async fn list_for_user(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Notification>, AppError>;

    async fn count_for_user(&self, user_id: i64) -> Result<i64, AppError>;

    async fn count_unread(&self, user_id: i64) -> Result<i64, AppError>;

    /// Mark one notification read. Returns false if it does not belong to `user_id`.
    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Mark every unread notification of a user read. Returns the number changed.
    async fn mark_all_read(&self, user_id: i64) -> Result<u64, AppError>;

    /// Delete one notification. Returns false if it does not belong to `user_id`.
    async fn delete(&self, id: i64, user_id: i64) -> Result<bool, AppError>;
}
