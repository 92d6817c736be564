//! In-memory repositories and a recording broadcaster for service tests.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::notification_service::Broadcaster;
use crate::domain::{
    Friendship, FriendshipFilter, FriendshipRepository, FriendshipStatus, HubEvent, HubGroup,
    Notification, NotificationRepository, Session, SessionRepository, User, UserRepository,
};
use crate::shared::error::AppError;

#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<Vec<User>>,
    next_id: AtomicI64,
}

impl InMemoryUsers {
    /// Seed a user and return its ID.
    pub fn insert(&self, username: &str) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1000;
        self.users.lock().push(User {
            id,
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password_hash: "x".into(),
            ..Default::default()
        });
        id
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, AppError> {
        Ok(self
            .users
            .lock()
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().iter().find(|u| u.username == username).cloned())
    }

    async fn create(&self, user: &User) -> Result<User, AppError> {
        let mut users = self.users.lock();
        if users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(AppError::Conflict("duplicate user".into()));
        }
        users.push(user.clone());
        Ok(user.clone())
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        let mut users = self.users.lock();
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(user.clone())
            }
            None => Err(AppError::NotFound("User not found".into())),
        }
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        Ok(self.users.lock().iter().any(|u| u.email == email))
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AppError> {
        Ok(self.users.lock().iter().any(|u| u.username == username))
    }
}

#[derive(Default)]
pub struct InMemorySessions {
    sessions: Mutex<Vec<Session>>,
}

#[async_trait]
impl SessionRepository for InMemorySessions {
    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>, AppError> {
        Ok(self
            .sessions
            .lock()
            .iter()
            .find(|s| s.refresh_token_hash == token_hash && s.revoked_at.is_none())
            .cloned())
    }

    async fn create(&self, session: &Session) -> Result<Session, AppError> {
        self.sessions.lock().push(session.clone());
        Ok(session.clone())
    }

    async fn update_token_hash(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(s) = self.sessions.lock().iter_mut().find(|s| s.id == id) {
            s.refresh_token_hash = token_hash.to_string();
            s.expires_at = expires_at;
            s.last_used_at = Utc::now();
        }
        Ok(())
    }

    async fn revoke(&self, id: Uuid) -> Result<(), AppError> {
        if let Some(s) = self.sessions.lock().iter_mut().find(|s| s.id == id) {
            s.revoked_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// Friendship rows with the same pair uniqueness and conditional writes as the SQL store.
#[derive(Default)]
pub struct InMemoryFriendships {
    rows: Mutex<Vec<Friendship>>,
    lose_races: AtomicBool,
}

impl InMemoryFriendships {
    pub fn rows(&self) -> Vec<Friendship> {
        self.rows.lock().clone()
    }

    /// Make every conditional write behave as if another request changed the
    /// row between the service's read and its write.
    pub fn lose_races(&self) {
        self.lose_races.store(true, Ordering::SeqCst);
    }

    fn losing(&self) -> bool {
        self.lose_races.load(Ordering::SeqCst)
    }

    fn matches(f: &Friendship, user_id: i64, filter: FriendshipFilter) -> bool {
        match filter {
            FriendshipFilter::Friends => f.status == FriendshipStatus::Accepted && f.involves(user_id),
            FriendshipFilter::Incoming => f.status == FriendshipStatus::Pending && f.friend_id == user_id,
            FriendshipFilter::Outgoing => f.status == FriendshipStatus::Pending && f.user_id == user_id,
            FriendshipFilter::BlockedByMe => f.is_blocked_by(user_id),
        }
    }
}

#[async_trait]
impl FriendshipRepository for InMemoryFriendships {
    async fn find_between(&self, a: i64, b: i64) -> Result<Option<Friendship>, AppError> {
        Ok(self
            .rows
            .lock()
            .iter()
            .find(|f| f.involves(a) && f.involves(b))
            .cloned())
    }

    async fn create(&self, friendship: &Friendship) -> Result<Friendship, AppError> {
        let mut rows = self.rows.lock();
        if self.losing()
            || rows
                .iter()
                .any(|f| f.involves(friendship.user_id) && f.involves(friendship.friend_id))
        {
            return Err(AppError::Conflict("friendship exists".into()));
        }
        rows.push(friendship.clone());
        Ok(friendship.clone())
    }

    async fn accept(&self, id: i64) -> Result<Option<Friendship>, AppError> {
        if self.losing() {
            return Ok(None);
        }
        let mut rows = self.rows.lock();
        Ok(rows
            .iter_mut()
            .find(|f| f.id == id && f.status == FriendshipStatus::Pending)
            .map(|f| {
                let now = Utc::now();
                f.status = FriendshipStatus::Accepted;
                f.accepted_at = Some(now);
                f.updated_at = now;
                f.clone()
            }))
    }

    async fn upsert_block(&self, id: i64, blocker: i64, target: i64) -> Result<Option<Friendship>, AppError> {
        let mut rows = self.rows.lock();
        let now = Utc::now();
        if let Some(f) = rows.iter_mut().find(|f| f.involves(blocker) && f.involves(target)) {
            if f.status == FriendshipStatus::Blocked {
                return Ok(None);
            }
            f.status = FriendshipStatus::Blocked;
            f.blocked_by = Some(blocker);
            f.accepted_at = None;
            f.updated_at = now;
            return Ok(Some(f.clone()));
        }
        let mut f = Friendship::new_request(id, blocker, target);
        f.status = FriendshipStatus::Blocked;
        f.blocked_by = Some(blocker);
        rows.push(f.clone());
        Ok(Some(f))
    }

    async fn delete_with_status(&self, id: i64, expected: FriendshipStatus) -> Result<bool, AppError> {
        if self.losing() {
            return Ok(false);
        }
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|f| !(f.id == id && f.status == expected));
        Ok(rows.len() != before)
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        filter: FriendshipFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Friendship>, AppError> {
        let mut matching: Vec<Friendship> = self
            .rows
            .lock()
            .iter()
            .filter(|f| Self::matches(f, user_id, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_for_user(&self, user_id: i64, filter: FriendshipFilter) -> Result<i64, AppError> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|f| Self::matches(f, user_id, filter))
            .count() as i64)
    }

    async fn friend_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|f| Self::matches(f, user_id, FriendshipFilter::Friends))
            .map(|f| f.other_party(user_id))
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryNotifications {
    rows: Mutex<Vec<Notification>>,
    fail_writes: AtomicBool,
}

impl InMemoryNotifications {
    pub fn rows(&self) -> Vec<Notification> {
        self.rows.lock().clone()
    }

    /// Make every subsequent `create` fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotifications {
    async fn create(&self, notification: &Notification) -> Result<Notification, AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("storage unavailable".into()));
        }
        self.rows.lock().push(notification.clone());
        Ok(notification.clone())
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let mut rows: Vec<Notification> = self
            .rows
            .lock()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(rows.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn count_for_user(&self, user_id: i64) -> Result<i64, AppError> {
        Ok(self.rows.lock().iter().filter(|n| n.user_id == user_id).count() as i64)
    }

    async fn count_unread(&self, user_id: i64) -> Result<i64, AppError> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }

    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool, AppError> {
        let mut rows = self.rows.lock();
        match rows.iter_mut().find(|n| n.id == id && n.user_id == user_id) {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, AppError> {
        let mut changed = 0;
        for n in self.rows.lock().iter_mut() {
            if n.user_id == user_id && !n.is_read {
                n.is_read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete(&self, id: i64, user_id: i64) -> Result<bool, AppError> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|n| !(n.id == id && n.user_id == user_id));
        Ok(rows.len() != before)
    }
}

/// Records `(group key, event name)` for every broadcast.
#[derive(Default)]
pub struct RecordingBroadcaster {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingBroadcaster {
    pub fn events_for(&self, group_key: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(group, _)| group == group_key)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&self, group: &HubGroup, event: &HubEvent) -> usize {
        self.sent
            .lock()
            .push((group.key(), event.event_name().to_string()));
        1
    }
}
