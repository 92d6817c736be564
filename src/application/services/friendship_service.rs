//! Friendship Service
//!
//! Applies friendship transitions and tells the affected user about them.
//!
//! Every transition follows the same order: load the pair's row, check the
//! transition against [`FriendshipPolicy`], apply a conditional write, then
//! notify. A write that finds the row changed underneath it reports a
//! conflict. Notifications never fail a transition.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use super::notification_service::{NewNotification, NotificationService};
use crate::domain::services::{FriendshipAction, FriendshipPolicy, FriendshipViolation};
use crate::domain::{
    Friendship, FriendshipEvent, FriendshipFilter, FriendshipRepository, FriendshipStatus, HubEvent,
    NotificationKind, User, UserRepository, UserSummary,
};
use crate::infrastructure::cache::PresenceStore;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};
use crate::shared::snowflake::SnowflakeGenerator;

#[async_trait]
pub trait FriendshipService: Send + Sync {
    /// Send a friend request from `actor` to `target`.
    async fn send_request(&self, actor: i64, target: i64) -> Result<FriendshipDto, FriendshipError>;

    /// Accept the pending request `requester` sent to `actor`.
    async fn accept_request(&self, actor: i64, requester: i64) -> Result<FriendshipDto, FriendshipError>;

    /// Reject the pending request `requester` sent to `actor`. The row is deleted.
    async fn reject_request(&self, actor: i64, requester: i64) -> Result<(), FriendshipError>;

    /// Withdraw the pending request `actor` sent to `target`. The row is deleted.
    async fn cancel_request(&self, actor: i64, target: i64) -> Result<(), FriendshipError>;

    /// End an accepted friendship from either side.
    async fn remove_friend(&self, actor: i64, friend: i64) -> Result<(), FriendshipError>;

    /// Block `target`, creating or overwriting the pair's row.
    async fn block_user(&self, actor: i64, target: i64) -> Result<FriendshipDto, FriendshipError>;

    /// Lift a block `actor` issued.
    async fn unblock_user(&self, actor: i64, target: i64) -> Result<(), FriendshipError>;

    /// Relationship between `actor` and `other`, from `actor`'s side.
    async fn get_status(&self, actor: i64, other: i64) -> Result<RelationshipDto, FriendshipError>;

    async fn list_friends(&self, user_id: i64, page: PageRequest) -> Result<Page<FriendDto>, FriendshipError>;

    async fn list_incoming_requests(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> Result<Page<FriendDto>, FriendshipError>;

    async fn list_outgoing_requests(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> Result<Page<FriendDto>, FriendshipError>;

    async fn list_blocked(&self, user_id: i64, page: PageRequest) -> Result<Page<FriendDto>, FriendshipError>;

    /// IDs of every accepted friend of `user_id`.
    async fn friend_ids(&self, user_id: i64) -> Result<Vec<i64>, FriendshipError>;
}

/// A relationship row
#[derive(Debug, Clone)]
pub struct FriendshipDto {
    pub id: String,
    pub user_id: String,
    pub friend_id: String,
    pub status: FriendshipStatus,
    pub blocked_by: Option<String>,
    pub created_at: String,
    pub accepted_at: Option<String>,
}

impl From<Friendship> for FriendshipDto {
    fn from(f: Friendship) -> Self {
        Self {
            id: f.id.to_string(),
            user_id: f.user_id.to_string(),
            friend_id: f.friend_id.to_string(),
            status: f.status,
            blocked_by: f.blocked_by.map(|id| id.to_string()),
            created_at: f.created_at.to_rfc3339(),
            accepted_at: f.accepted_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// One entry of a friend, request or block listing.
#[derive(Debug, Clone)]
pub struct FriendDto {
    pub friendship_id: String,
    pub user: UserSummary,
    pub status: FriendshipStatus,
    pub since: String,
    /// Only reported for accepted friends.
    pub online: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDirection {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone)]
pub struct RelationshipDto {
    pub user_id: String,
    pub status: FriendshipStatus,
    pub direction: Option<RequestDirection>,
    pub blocked_by_me: bool,
    pub friendship_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FriendshipError {
    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Rule(#[from] FriendshipViolation),

    #[error("The relationship changed while processing the request")]
    Conflict,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<FriendshipError> for AppError {
    fn from(err: FriendshipError) -> Self {
        let message = err.to_string();
        match err {
            FriendshipError::UserNotFound => AppError::NotFound(message),
            FriendshipError::Rule(violation) => match violation {
                FriendshipViolation::SelfTarget => AppError::BadRequest(message),
                FriendshipViolation::AlreadySent
                | FriendshipViolation::IncomingPending
                | FriendshipViolation::AlreadyFriends => AppError::Conflict(message),
                FriendshipViolation::Blocked
                | FriendshipViolation::NotAddressee
                | FriendshipViolation::NotRequester
                | FriendshipViolation::BlockedByOther => AppError::Forbidden(message),
                FriendshipViolation::NoPendingRequest
                | FriendshipViolation::NotFriends
                | FriendshipViolation::NotBlocked => AppError::NotFound(message),
            },
            FriendshipError::Conflict => AppError::Conflict(message),
            FriendshipError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

fn internal(e: AppError) -> FriendshipError {
    FriendshipError::Internal(e.to_string())
}

pub struct FriendshipServiceImpl<F, U>
where
    F: FriendshipRepository,
    U: UserRepository,
{
    friendship_repo: Arc<F>,
    user_repo: Arc<U>,
    notifier: Arc<dyn NotificationService>,
    presence: Arc<dyn PresenceStore>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<F, U> FriendshipServiceImpl<F, U>
where
    F: FriendshipRepository,
    U: UserRepository,
{
    pub fn new(
        friendship_repo: Arc<F>,
        user_repo: Arc<U>,
        notifier: Arc<dyn NotificationService>,
        presence: Arc<dyn PresenceStore>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            friendship_repo,
            user_repo,
            notifier,
            presence,
            id_generator,
        }
    }

    fn ensure_not_self(actor: i64, target: i64) -> Result<(), FriendshipError> {
        if actor == target {
            return Err(FriendshipViolation::SelfTarget.into());
        }
        Ok(())
    }

    /// Load both users, failing if the target does not exist.
    async fn load_pair(&self, actor: i64, target: i64) -> Result<(User, User), FriendshipError> {
        let mut users: HashMap<i64, User> = self
            .user_repo
            .find_by_ids(&[actor, target])
            .await
            .map_err(internal)?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        match (users.remove(&actor), users.remove(&target)) {
            (Some(a), Some(t)) => Ok((a, t)),
            _ => Err(FriendshipError::UserNotFound),
        }
    }

    /// Summary of the acting user for push payloads. Lookup failures only cost the push.
    async fn actor_summary(&self, actor: i64) -> Option<UserSummary> {
        match self.user_repo.find_by_id(actor).await {
            Ok(Some(user)) => Some(UserSummary::from(&user)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(user_id = actor, error = %e, "Failed to load actor for push");
                None
            }
        }
    }

    fn push(&self, recipient: i64, friendship_id: i64, actor: UserSummary, wrap: fn(FriendshipEvent) -> HubEvent) {
        let event = wrap(FriendshipEvent {
            friendship_id: friendship_id.to_string(),
            user: actor,
        });
        self.notifier.push_to_user(recipient, event);
    }

    fn transitioned(action: FriendshipAction, actor: i64, target: i64, friendship_id: i64) {
        metrics::record_friendship_transition(action.as_str());
        tracing::info!(
            action = action.as_str(),
            actor,
            target,
            friendship_id,
            "Friendship transition"
        );
    }

    /// Shared path of the transitions that delete the row.
    async fn delete_transition(
        &self,
        actor: i64,
        target: i64,
        action: FriendshipAction,
    ) -> Result<Friendship, FriendshipError> {
        Self::ensure_not_self(actor, target)?;

        let existing = self
            .friendship_repo
            .find_between(actor, target)
            .await
            .map_err(internal)?;
        FriendshipPolicy::check(actor, target, existing.as_ref(), action)?;

        let Some(row) = existing else {
            return Err(FriendshipError::Conflict);
        };
        let expected = action.expected_status_for_delete().unwrap_or(row.status);

        let deleted = self
            .friendship_repo
            .delete_with_status(row.id, expected)
            .await
            .map_err(internal)?;
        if !deleted {
            return Err(FriendshipError::Conflict);
        }

        Self::transitioned(action, actor, target, row.id);
        Ok(row)
    }

    async fn list(
        &self,
        user_id: i64,
        filter: FriendshipFilter,
        page: PageRequest,
    ) -> Result<Page<FriendDto>, FriendshipError> {
        let total = self
            .friendship_repo
            .count_for_user(user_id, filter)
            .await
            .map_err(internal)?;
        if total == 0 {
            return Ok(Page::empty(page));
        }

        let rows = self
            .friendship_repo
            .list_for_user(user_id, filter, page.offset(), page.limit())
            .await
            .map_err(internal)?;

        let other_ids: Vec<i64> = rows.iter().map(|f| f.other_party(user_id)).collect();
        let users: HashMap<i64, User> = self
            .user_repo
            .find_by_ids(&other_ids)
            .await
            .map_err(internal)?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let online = if filter == FriendshipFilter::Friends {
            Some(self.online_among(&other_ids).await)
        } else {
            None
        };

        let items = rows
            .into_iter()
            .filter_map(|f| {
                let other = f.other_party(user_id);
                let user = users.get(&other)?;
                Some(FriendDto {
                    friendship_id: f.id.to_string(),
                    user: UserSummary::from(user),
                    status: f.status,
                    since: f.accepted_at.unwrap_or(f.updated_at).to_rfc3339(),
                    online: online.as_ref().map(|set| set.contains(&other)),
                })
            })
            .collect();

        Ok(Page::new(items, page, total as u64))
    }

    async fn online_among(&self, user_ids: &[i64]) -> HashSet<i64> {
        self.presence.online_among(user_ids).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Presence lookup failed, reporting friends offline");
            HashSet::new()
        })
    }
}

#[async_trait]
impl<F, U> FriendshipService for FriendshipServiceImpl<F, U>
where
    F: FriendshipRepository + 'static,
    U: UserRepository + 'static,
{
    async fn send_request(&self, actor: i64, target: i64) -> Result<FriendshipDto, FriendshipError> {
        Self::ensure_not_self(actor, target)?;
        let (actor_user, _) = self.load_pair(actor, target).await?;

        let existing = self
            .friendship_repo
            .find_between(actor, target)
            .await
            .map_err(internal)?;
        FriendshipPolicy::check(actor, target, existing.as_ref(), FriendshipAction::SendRequest)?;

        let request = Friendship::new_request(self.id_generator.generate(), actor, target);
        let created = self
            .friendship_repo
            .create(&request)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => FriendshipError::Conflict,
                e => internal(e),
            })?;

        Self::transitioned(FriendshipAction::SendRequest, actor, target, created.id);

        self.notifier
            .notify(NewNotification {
                user_id: target,
                actor_id: Some(actor),
                kind: NotificationKind::FriendRequest,
                message: format!("{} sent you a friend request", actor_user.display_name_or_username()),
                link: Some("/friends/requests".to_string()),
            })
            .await;
        self.push(
            target,
            created.id,
            UserSummary::from(&actor_user),
            HubEvent::FriendRequestReceived,
        );

        Ok(FriendshipDto::from(created))
    }

    async fn accept_request(&self, actor: i64, requester: i64) -> Result<FriendshipDto, FriendshipError> {
        Self::ensure_not_self(actor, requester)?;
        let (actor_user, _) = self.load_pair(actor, requester).await?;

        let existing = self
            .friendship_repo
            .find_between(actor, requester)
            .await
            .map_err(internal)?;
        FriendshipPolicy::check(actor, requester, existing.as_ref(), FriendshipAction::Accept)?;

        let Some(row) = existing else {
            return Err(FriendshipError::Conflict);
        };
        let accepted = self
            .friendship_repo
            .accept(row.id)
            .await
            .map_err(internal)?
            .ok_or(FriendshipError::Conflict)?;

        Self::transitioned(FriendshipAction::Accept, actor, requester, accepted.id);

        self.notifier
            .notify(NewNotification {
                user_id: requester,
                actor_id: Some(actor),
                kind: NotificationKind::FriendAccepted,
                message: format!("{} accepted your friend request", actor_user.display_name_or_username()),
                link: Some("/friends".to_string()),
            })
            .await;
        self.push(
            requester,
            accepted.id,
            UserSummary::from(&actor_user),
            HubEvent::FriendRequestAccepted,
        );

        Ok(FriendshipDto::from(accepted))
    }

    async fn reject_request(&self, actor: i64, requester: i64) -> Result<(), FriendshipError> {
        let row = self
            .delete_transition(actor, requester, FriendshipAction::Reject)
            .await?;

        if let Some(actor_user) = self.actor_summary(actor).await {
            self.push(requester, row.id, actor_user, HubEvent::FriendRequestRejected);
        }
        Ok(())
    }

    async fn cancel_request(&self, actor: i64, target: i64) -> Result<(), FriendshipError> {
        let row = self
            .delete_transition(actor, target, FriendshipAction::Cancel)
            .await?;

        if let Some(actor_user) = self.actor_summary(actor).await {
            self.push(target, row.id, actor_user, HubEvent::FriendRequestCancelled);
        }
        Ok(())
    }

    async fn remove_friend(&self, actor: i64, friend: i64) -> Result<(), FriendshipError> {
        let row = self
            .delete_transition(actor, friend, FriendshipAction::Unfriend)
            .await?;

        if let Some(actor_user) = self.actor_summary(actor).await {
            self.push(friend, row.id, actor_user, HubEvent::FriendRemoved);
        }
        Ok(())
    }

    async fn block_user(&self, actor: i64, target: i64) -> Result<FriendshipDto, FriendshipError> {
        Self::ensure_not_self(actor, target)?;
        self.load_pair(actor, target).await?;

        let existing = self
            .friendship_repo
            .find_between(actor, target)
            .await
            .map_err(internal)?;
        FriendshipPolicy::check(actor, target, existing.as_ref(), FriendshipAction::Block)?;

        if FriendshipPolicy::block_keeps_existing(existing.as_ref()) {
            if let Some(row) = existing {
                return Ok(FriendshipDto::from(row));
            }
        }

        let upserted = self
            .friendship_repo
            .upsert_block(self.id_generator.generate(), actor, target)
            .await
            .map_err(internal)?;

        let Some(blocked) = upserted else {
            // A concurrent block landed first and is kept.
            return self
                .friendship_repo
                .find_between(actor, target)
                .await
                .map_err(internal)?
                .map(FriendshipDto::from)
                .ok_or(FriendshipError::Conflict);
        };

        // Blocks are silent: the target is not told.
        Self::transitioned(FriendshipAction::Block, actor, target, blocked.id);
        Ok(FriendshipDto::from(blocked))
    }

    async fn unblock_user(&self, actor: i64, target: i64) -> Result<(), FriendshipError> {
        self.delete_transition(actor, target, FriendshipAction::Unblock)
            .await
            .map(|_| ())
    }

    async fn get_status(&self, actor: i64, other: i64) -> Result<RelationshipDto, FriendshipError> {
        Self::ensure_not_self(actor, other)?;
        self.load_pair(actor, other).await?;

        let existing = self
            .friendship_repo
            .find_between(actor, other)
            .await
            .map_err(internal)?;

        Ok(match existing {
            None => RelationshipDto {
                user_id: other.to_string(),
                status: FriendshipStatus::None,
                direction: None,
                blocked_by_me: false,
                friendship_id: None,
            },
            Some(f) => RelationshipDto {
                user_id: other.to_string(),
                status: f.status,
                direction: match f.status {
                    FriendshipStatus::Pending if f.is_requester(actor) => Some(RequestDirection::Outgoing),
                    FriendshipStatus::Pending => Some(RequestDirection::Incoming),
                    _ => None,
                },
                blocked_by_me: f.is_blocked_by(actor),
                friendship_id: Some(f.id.to_string()),
            },
        })
    }

    async fn list_friends(&self, user_id: i64, page: PageRequest) -> Result<Page<FriendDto>, FriendshipError> {
        self.list(user_id, FriendshipFilter::Friends, page).await
    }

    async fn list_incoming_requests(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> Result<Page<FriendDto>, FriendshipError> {
        self.list(user_id, FriendshipFilter::Incoming, page).await
    }

    async fn list_outgoing_requests(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> Result<Page<FriendDto>, FriendshipError> {
        self.list(user_id, FriendshipFilter::Outgoing, page).await
    }

    async fn list_blocked(&self, user_id: i64, page: PageRequest) -> Result<Page<FriendDto>, FriendshipError> {
        self.list(user_id, FriendshipFilter::BlockedByMe, page).await
    }

    async fn friend_ids(&self, user_id: i64) -> Result<Vec<i64>, FriendshipError> {
        self.friendship_repo.friend_ids(user_id).await.map_err(internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::notification_service::{MockNotificationService, NotificationServiceImpl};
    use crate::application::services::test_support::{
        InMemoryFriendships, InMemoryNotifications, InMemoryUsers, RecordingBroadcaster,
    };
    use crate::infrastructure::cache::LocalPresenceStore;
    use pretty_assertions::assert_eq;

    struct Fixture {
        users: Arc<InMemoryUsers>,
        friendships: Arc<InMemoryFriendships>,
        presence: Arc<LocalPresenceStore>,
        alice: i64,
        bob: i64,
        carol: i64,
    }

    impl Fixture {
        fn new() -> Self {
            let users = InMemoryUsers::default();
            let alice = users.insert("alice");
            let bob = users.insert("bob");
            let carol = users.insert("carol");
            Self {
                users: Arc::new(users),
                friendships: Arc::new(InMemoryFriendships::default()),
                presence: Arc::new(LocalPresenceStore::new()),
                alice,
                bob,
                carol,
            }
        }

        fn service(
            &self,
            notifier: impl NotificationService + 'static,
        ) -> FriendshipServiceImpl<InMemoryFriendships, InMemoryUsers> {
            FriendshipServiceImpl::new(
                self.friendships.clone(),
                self.users.clone(),
                Arc::new(notifier),
                self.presence.clone(),
                Arc::new(SnowflakeGenerator::new(1, 0)),
            )
        }
    }

    /// A notifier that accepts anything.
    fn permissive() -> MockNotificationService {
        let mut mock = MockNotificationService::new();
        mock.expect_notify().return_const(());
        mock.expect_push_to_user().return_const(());
        mock
    }

    fn status_of(fx: &Fixture, a: i64, b: i64) -> Option<FriendshipStatus> {
        fx.friendships
            .rows()
            .into_iter()
            .find(|f| f.involves(a) && f.involves(b))
            .map(|f| f.status)
    }

    #[tokio::test]
    async fn test_send_request_notifies_recipient() {
        let fx = Fixture::new();
        let bob = fx.bob;

        let mut mock = MockNotificationService::new();
        mock.expect_notify()
            .withf(move |n| n.user_id == bob && n.kind == NotificationKind::FriendRequest)
            .times(1)
            .return_const(());
        mock.expect_push_to_user()
            .withf(move |user_id, event| {
                *user_id == bob && event.event_name() == "FriendRequestReceived"
            })
            .times(1)
            .return_const(());

        let service = fx.service(mock);
        let dto = service.send_request(fx.alice, fx.bob).await.unwrap();

        assert_eq!(dto.status, FriendshipStatus::Pending);
        assert_eq!(dto.user_id, fx.alice.to_string());
        assert_eq!(status_of(&fx, fx.alice, fx.bob), Some(FriendshipStatus::Pending));
    }

    #[tokio::test]
    async fn test_send_request_failures_do_not_notify() {
        let fx = Fixture::new();
        let service = fx.service(permissive());
        service.send_request(fx.alice, fx.bob).await.unwrap();

        // Strict mock: any further notification panics.
        let strict = fx.service(MockNotificationService::new());
        assert!(matches!(
            strict.send_request(fx.alice, fx.bob).await,
            Err(FriendshipError::Rule(FriendshipViolation::AlreadySent))
        ));
        assert!(matches!(
            strict.send_request(fx.bob, fx.alice).await,
            Err(FriendshipError::Rule(FriendshipViolation::IncomingPending))
        ));
        assert!(matches!(
            strict.send_request(fx.alice, fx.alice).await,
            Err(FriendshipError::Rule(FriendshipViolation::SelfTarget))
        ));
        assert!(matches!(
            strict.send_request(fx.alice, 424242).await,
            Err(FriendshipError::UserNotFound)
        ));
        assert_eq!(fx.friendships.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_accept_request() {
        let fx = Fixture::new();
        fx.service(permissive()).send_request(fx.alice, fx.bob).await.unwrap();

        let alice = fx.alice;
        let mut mock = MockNotificationService::new();
        mock.expect_notify()
            .withf(move |n| n.user_id == alice && n.kind == NotificationKind::FriendAccepted)
            .times(1)
            .return_const(());
        mock.expect_push_to_user()
            .withf(move |user_id, event| {
                *user_id == alice && event.event_name() == "FriendRequestAccepted"
            })
            .times(1)
            .return_const(());
        let service = fx.service(mock);

        assert!(matches!(
            service.accept_request(fx.alice, fx.bob).await,
            Err(FriendshipError::Rule(FriendshipViolation::NotAddressee))
        ));

        let dto = service.accept_request(fx.bob, fx.alice).await.unwrap();
        assert_eq!(dto.status, FriendshipStatus::Accepted);
        assert!(dto.accepted_at.is_some());

        assert!(matches!(
            service.send_request(fx.alice, fx.bob).await,
            Err(FriendshipError::Rule(FriendshipViolation::AlreadyFriends))
        ));
    }

    #[tokio::test]
    async fn test_reject_deletes_and_pushes_only() {
        let fx = Fixture::new();
        fx.service(permissive()).send_request(fx.alice, fx.bob).await.unwrap();

        let alice = fx.alice;
        let mut mock = MockNotificationService::new();
        mock.expect_push_to_user()
            .withf(move |user_id, event| {
                *user_id == alice && event.event_name() == "FriendRequestRejected"
            })
            .times(1)
            .return_const(());
        let service = fx.service(mock);

        service.reject_request(fx.bob, fx.alice).await.unwrap();
        assert_eq!(status_of(&fx, fx.alice, fx.bob), None);

        // A rejected request can be sent again.
        fx.service(permissive()).send_request(fx.alice, fx.bob).await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_request() {
        let fx = Fixture::new();
        fx.service(permissive()).send_request(fx.alice, fx.bob).await.unwrap();

        let bob = fx.bob;
        let mut mock = MockNotificationService::new();
        mock.expect_push_to_user()
            .withf(move |user_id, event| {
                *user_id == bob && event.event_name() == "FriendRequestCancelled"
            })
            .times(1)
            .return_const(());
        let service = fx.service(mock);

        assert!(matches!(
            service.cancel_request(fx.bob, fx.alice).await,
            Err(FriendshipError::Rule(FriendshipViolation::NotRequester))
        ));
        service.cancel_request(fx.alice, fx.bob).await.unwrap();
        assert_eq!(status_of(&fx, fx.alice, fx.bob), None);
    }

    #[tokio::test]
    async fn test_remove_friend_from_either_side() {
        let fx = Fixture::new();
        let service = fx.service(permissive());
        service.send_request(fx.alice, fx.bob).await.unwrap();
        service.accept_request(fx.bob, fx.alice).await.unwrap();

        let alice = fx.alice;
        let mut mock = MockNotificationService::new();
        mock.expect_push_to_user()
            .withf(move |user_id, event| *user_id == alice && event.event_name() == "FriendRemoved")
            .times(1)
            .return_const(());
        fx.service(mock).remove_friend(fx.bob, fx.alice).await.unwrap();

        assert_eq!(status_of(&fx, fx.alice, fx.bob), None);
        assert!(matches!(
            service.remove_friend(fx.alice, fx.bob).await,
            Err(FriendshipError::Rule(FriendshipViolation::NotFriends))
        ));
    }

    #[tokio::test]
    async fn test_block_is_silent_and_overwrites() {
        let fx = Fixture::new();
        let service = fx.service(permissive());
        service.send_request(fx.alice, fx.bob).await.unwrap();
        service.accept_request(fx.bob, fx.alice).await.unwrap();

        let strict = fx.service(MockNotificationService::new());
        let blocked = strict.block_user(fx.bob, fx.alice).await.unwrap();
        assert_eq!(blocked.status, FriendshipStatus::Blocked);
        assert_eq!(blocked.blocked_by, Some(fx.bob.to_string()));
        assert_eq!(fx.friendships.rows().len(), 1);

        // Block with no prior relationship creates the row.
        strict.block_user(fx.alice, fx.carol).await.unwrap();
        assert_eq!(status_of(&fx, fx.alice, fx.carol), Some(FriendshipStatus::Blocked));

        assert!(matches!(
            strict.send_request(fx.alice, fx.bob).await,
            Err(FriendshipError::Rule(FriendshipViolation::Blocked))
        ));
    }

    #[tokio::test]
    async fn test_unblock_only_by_blocker() {
        let fx = Fixture::new();
        let service = fx.service(MockNotificationService::new());
        service.block_user(fx.alice, fx.bob).await.unwrap();

        assert!(matches!(
            service.unblock_user(fx.bob, fx.alice).await,
            Err(FriendshipError::Rule(FriendshipViolation::BlockedByOther))
        ));
        service.unblock_user(fx.alice, fx.bob).await.unwrap();
        assert_eq!(status_of(&fx, fx.alice, fx.bob), None);

        assert!(matches!(
            service.unblock_user(fx.alice, fx.bob).await,
            Err(FriendshipError::Rule(FriendshipViolation::NotBlocked))
        ));
    }

    #[tokio::test]
    async fn test_block_keeps_block_by_other_party() {
        let fx = Fixture::new();
        let service = fx.service(MockNotificationService::new());
        service.block_user(fx.alice, fx.bob).await.unwrap();

        let dto = service.block_user(fx.bob, fx.alice).await.unwrap();
        assert_eq!(dto.status, FriendshipStatus::Blocked);
        assert_eq!(dto.blocked_by, Some(fx.alice.to_string()));
        assert_eq!(fx.friendships.rows()[0].blocked_by, Some(fx.alice));

        // Bob cannot lift or route around alice's block.
        assert!(matches!(
            service.unblock_user(fx.bob, fx.alice).await,
            Err(FriendshipError::Rule(FriendshipViolation::BlockedByOther))
        ));
        assert!(matches!(
            service.send_request(fx.bob, fx.alice).await,
            Err(FriendshipError::Rule(FriendshipViolation::Blocked))
        ));
        assert!(service.get_status(fx.alice, fx.bob).await.unwrap().blocked_by_me);
        assert!(!service.get_status(fx.bob, fx.alice).await.unwrap().blocked_by_me);

        // Repeating one's own block is a no-op too.
        let again = service.block_user(fx.alice, fx.bob).await.unwrap();
        assert_eq!(again.id, dto.id);
        assert_eq!(fx.friendships.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_accept_losing_race_conflicts_without_notifying() {
        let fx = Fixture::new();
        fx.service(permissive()).send_request(fx.alice, fx.bob).await.unwrap();
        fx.friendships.lose_races();

        let service = fx.service(MockNotificationService::new());
        assert!(matches!(
            service.accept_request(fx.bob, fx.alice).await,
            Err(FriendshipError::Conflict)
        ));
        assert_eq!(status_of(&fx, fx.alice, fx.bob), Some(FriendshipStatus::Pending));
    }

    #[tokio::test]
    async fn test_delete_transitions_losing_race_conflict() {
        let fx = Fixture::new();
        fx.service(permissive()).send_request(fx.alice, fx.bob).await.unwrap();
        fx.friendships.lose_races();

        let service = fx.service(MockNotificationService::new());
        assert!(matches!(
            service.reject_request(fx.bob, fx.alice).await,
            Err(FriendshipError::Conflict)
        ));
        assert!(matches!(
            service.cancel_request(fx.alice, fx.bob).await,
            Err(FriendshipError::Conflict)
        ));
        assert_eq!(status_of(&fx, fx.alice, fx.bob), Some(FriendshipStatus::Pending));
    }

    #[tokio::test]
    async fn test_send_request_losing_race_conflicts_without_notifying() {
        let fx = Fixture::new();
        fx.friendships.lose_races();

        let service = fx.service(MockNotificationService::new());
        assert!(matches!(
            service.send_request(fx.alice, fx.carol).await,
            Err(FriendshipError::Conflict)
        ));
        assert!(fx.friendships.rows().is_empty());
    }

    #[tokio::test]
    async fn test_accept_with_unknown_requester_fails_before_writing() {
        let fx = Fixture::new();
        let ghost = 9_999;
        fx.friendships
            .create(&Friendship::new_request(77, ghost, fx.bob))
            .await
            .unwrap();

        let service = fx.service(MockNotificationService::new());
        assert!(matches!(
            service.accept_request(fx.bob, ghost).await,
            Err(FriendshipError::UserNotFound)
        ));
        assert_eq!(status_of(&fx, ghost, fx.bob), Some(FriendshipStatus::Pending));
    }

    #[tokio::test]
    async fn test_accept_always_writes_inbox_entry() {
        let fx = Fixture::new();
        fx.service(permissive()).send_request(fx.alice, fx.bob).await.unwrap();

        let notifications = Arc::new(InMemoryNotifications::default());
        let hub = Arc::new(RecordingBroadcaster::default());
        let notifier = NotificationServiceImpl::new(
            notifications.clone(),
            hub.clone(),
            Arc::new(SnowflakeGenerator::new(1, 1)),
        );
        fx.service(notifier).accept_request(fx.bob, fx.alice).await.unwrap();

        let inbox = notifications.rows();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].user_id, fx.alice);
        assert_eq!(inbox[0].kind, NotificationKind::FriendAccepted);
        assert_eq!(inbox[0].message, "bob accepted your friend request");
        assert!(hub
            .events_for(&format!("user_{}", fx.alice))
            .contains(&"FriendRequestAccepted".to_string()));
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_transition() {
        let fx = Fixture::new();
        let notifications = Arc::new(InMemoryNotifications::default());
        notifications.fail_writes();
        let hub = Arc::new(RecordingBroadcaster::default());
        let notifier = NotificationServiceImpl::new(
            notifications,
            hub.clone(),
            Arc::new(SnowflakeGenerator::new(1, 1)),
        );

        let service = fx.service(notifier);
        service.send_request(fx.alice, fx.bob).await.unwrap();

        let pushed = hub.events_for(&format!("user_{}", fx.bob));
        assert_eq!(pushed, vec!["FriendRequestReceived".to_string()]);
    }

    #[tokio::test]
    async fn test_get_status_directions() {
        let fx = Fixture::new();
        let service = fx.service(permissive());

        let none = service.get_status(fx.alice, fx.bob).await.unwrap();
        assert_eq!(none.status, FriendshipStatus::None);

        service.send_request(fx.alice, fx.bob).await.unwrap();
        let outgoing = service.get_status(fx.alice, fx.bob).await.unwrap();
        let incoming = service.get_status(fx.bob, fx.alice).await.unwrap();
        assert_eq!(outgoing.direction, Some(RequestDirection::Outgoing));
        assert_eq!(incoming.direction, Some(RequestDirection::Incoming));

        service.block_user(fx.bob, fx.alice).await.unwrap();
        assert!(service.get_status(fx.bob, fx.alice).await.unwrap().blocked_by_me);
        assert!(!service.get_status(fx.alice, fx.bob).await.unwrap().blocked_by_me);
    }

    #[tokio::test]
    async fn test_lists_and_online_flag() {
        let fx = Fixture::new();
        let service = fx.service(permissive());
        service.send_request(fx.alice, fx.bob).await.unwrap();
        service.accept_request(fx.bob, fx.alice).await.unwrap();
        service.send_request(fx.carol, fx.alice).await.unwrap();
        fx.presence.connect(fx.bob).await.unwrap();

        let friends = service.list_friends(fx.alice, PageRequest::default()).await.unwrap();
        assert_eq!(friends.total_count, 1);
        assert_eq!(friends.items[0].user.username, "bob");
        assert_eq!(friends.items[0].online, Some(true));

        let incoming = service
            .list_incoming_requests(fx.alice, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(incoming.items.len(), 1);
        assert_eq!(incoming.items[0].user.username, "carol");
        assert_eq!(incoming.items[0].online, None);

        let outgoing = service
            .list_outgoing_requests(fx.carol, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(outgoing.total_count, 1);

        assert!(service
            .list_blocked(fx.alice, PageRequest::default())
            .await
            .unwrap()
            .items
            .is_empty());

        assert_eq!(service.friend_ids(fx.bob).await.unwrap(), vec![fx.alice]);
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let users = InMemoryUsers::default();
        let hub_user = users.insert("hub");
        let requesters: Vec<i64> = (0..5).map(|i| users.insert(&format!("user{}", i))).collect();
        let fx = Fixture {
            users: Arc::new(users),
            friendships: Arc::new(InMemoryFriendships::default()),
            presence: Arc::new(LocalPresenceStore::new()),
            alice: hub_user,
            bob: requesters[0],
            carol: requesters[1],
        };
        let service = fx.service(permissive());
        for id in &requesters {
            service.send_request(*id, hub_user).await.unwrap();
        }

        let page = service
            .list_incoming_requests(hub_user, PageRequest::new(Some(2), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_count, 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(page.has_previous);

        let past_end = service
            .list_incoming_requests(hub_user, PageRequest::new(Some(9), Some(2)))
            .await
            .unwrap();
        assert!(past_end.items.is_empty());
    }
}
