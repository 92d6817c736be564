//! Notification Service
//!
//! Persists inbox notifications and pushes real-time events through the hub.
//! Pushes are fire-and-forget: nothing here fails a caller because a
//! recipient is offline or a write to the inbox failed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{
    HubEvent, HubGroup, Notification, NotificationEvent, NotificationKind, NotificationRepository,
    RoomName,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};
use crate::shared::snowflake::SnowflakeGenerator;

/// Delivery side of the real-time hub.
pub trait Broadcaster: Send + Sync {
    /// Push `event` to every connection in `group`. Returns how many connections it reached.
    fn broadcast(&self, group: &HubGroup, event: &HubEvent) -> usize;
}

/// A notification to persist and push.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: i64,
    pub actor_id: Option<i64>,
    pub kind: NotificationKind,
    pub message: String,
    pub link: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Persist a notification and push it as `ReceiveNotification` to the recipient.
    async fn notify(&self, notification: NewNotification);

    /// Push an ephemeral event to all connections of a user.
    fn push_to_user(&self, user_id: i64, event: HubEvent);

    /// Push an ephemeral event to all connections in a room.
    fn push_to_room(&self, room: &RoomName, event: HubEvent);

    async fn list(&self, user_id: i64, page: PageRequest) -> Result<Page<Notification>, NotificationError>;

    async fn unread_count(&self, user_id: i64) -> Result<i64, NotificationError>;

    async fn mark_read(&self, user_id: i64, notification_id: i64) -> Result<(), NotificationError>;

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, NotificationError>;

    async fn delete(&self, user_id: i64, notification_id: i64) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound => AppError::NotFound(err.to_string()),
            NotificationError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

pub struct NotificationServiceImpl<N>
where
    N: NotificationRepository,
{
    notification_repo: Arc<N>,
    broadcaster: Arc<dyn Broadcaster>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<N> NotificationServiceImpl<N>
where
    N: NotificationRepository,
{
    pub fn new(
        notification_repo: Arc<N>,
        broadcaster: Arc<dyn Broadcaster>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            notification_repo,
            broadcaster,
            id_generator,
        }
    }

    fn push(&self, group: HubGroup, event: HubEvent) {
        let reached = self.broadcaster.broadcast(&group, &event);
        tracing::debug!(
            group = %group,
            event = event.event_name(),
            reached,
            "Hub push"
        );
    }
}

#[async_trait]
impl<N> NotificationService for NotificationServiceImpl<N>
where
    N: NotificationRepository + 'static,
{
    async fn notify(&self, notification: NewNotification) {
        let entity = Notification {
            id: self.id_generator.generate(),
            user_id: notification.user_id,
            actor_id: notification.actor_id,
            kind: notification.kind,
            message: notification.message,
            link: notification.link,
            is_read: false,
            created_at: Utc::now(),
        };

        match self.notification_repo.create(&entity).await {
            Ok(saved) => {
                let event = HubEvent::ReceiveNotification(NotificationEvent::from(&saved));
                self.push(HubGroup::user(saved.user_id), event);
            }
            Err(e) => {
                tracing::warn!(
                    user_id = entity.user_id,
                    kind = entity.kind.as_str(),
                    error = %e,
                    "Failed to persist notification"
                );
            }
        }
    }

    fn push_to_user(&self, user_id: i64, event: HubEvent) {
        self.push(HubGroup::user(user_id), event);
    }

    fn push_to_room(&self, room: &RoomName, event: HubEvent) {
        self.push(HubGroup::room(room.clone()), event);
    }

    async fn list(&self, user_id: i64, page: PageRequest) -> Result<Page<Notification>, NotificationError> {
        let total = self
            .notification_repo
            .count_for_user(user_id)
            .await
            .map_err(|e| NotificationError::Internal(e.to_string()))?;

        if total == 0 {
            return Ok(Page::empty(page));
        }

        let items = self
            .notification_repo
            .list_for_user(user_id, page.offset(), page.limit())
            .await
            .map_err(|e| NotificationError::Internal(e.to_string()))?;

        Ok(Page::new(items, page, total as u64))
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64, NotificationError> {
        self.notification_repo
            .count_unread(user_id)
            .await
            .map_err(|e| NotificationError::Internal(e.to_string()))
    }

    async fn mark_read(&self, user_id: i64, notification_id: i64) -> Result<(), NotificationError> {
        let updated = self
            .notification_repo
            .mark_read(notification_id, user_id)
            .await
            .map_err(|e| NotificationError::Internal(e.to_string()))?;

        if updated {
            Ok(())
        } else {
            Err(NotificationError::NotFound)
        }
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, NotificationError> {
        self.notification_repo
            .mark_all_read(user_id)
            .await
            .map_err(|e| NotificationError::Internal(e.to_string()))
    }

    async fn delete(&self, user_id: i64, notification_id: i64) -> Result<(), NotificationError> {
        let deleted = self
            .notification_repo
            .delete(notification_id, user_id)
            .await
            .map_err(|e| NotificationError::Internal(e.to_string()))?;

        if deleted {
            Ok(())
        } else {
            Err(NotificationError::NotFound)
        }
    }
}
