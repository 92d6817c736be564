//! Real-time hub events.
//!
//! Every variant is a named client event. On the wire it travels as a
//! dispatch frame with `t` set to [`HubEvent::event_name`] and `d` set to the
//! payload.

use serde::{Deserialize, Serialize};

use crate::domain::entities::{Notification, User};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "d")]
pub enum HubEvent {
    ReceiveMessage(RoomMessageEvent),
    ReceiveNotification(NotificationEvent),
    FriendRequestReceived(FriendshipEvent),
    FriendRequestAccepted(FriendshipEvent),
    FriendRequestRejected(FriendshipEvent),
    FriendRequestCancelled(FriendshipEvent),
    FriendRemoved(FriendshipEvent),
    FriendOnline(PresenceEvent),
    FriendOffline(PresenceEvent),
    UserJoinedRoom(RoomMembershipEvent),
    UserLeftRoom(RoomMembershipEvent),
}

impl HubEvent {
    /// Client-facing event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            HubEvent::ReceiveMessage(_) => "ReceiveMessage",
            HubEvent::ReceiveNotification(_) => "ReceiveNotification",
            HubEvent::FriendRequestReceived(_) => "FriendRequestReceived",
            HubEvent::FriendRequestAccepted(_) => "FriendRequestAccepted",
            HubEvent::FriendRequestRejected(_) => "FriendRequestRejected",
            HubEvent::FriendRequestCancelled(_) => "FriendRequestCancelled",
            HubEvent::FriendRemoved(_) => "FriendRemoved",
            HubEvent::FriendOnline(_) => "FriendOnline",
            HubEvent::FriendOffline(_) => "FriendOffline",
            HubEvent::UserJoinedRoom(_) => "UserJoinedRoom",
            HubEvent::UserLeftRoom(_) => "UserLeftRoom",
        }
    }

    /// Event payload as JSON.
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            HubEvent::ReceiveMessage(e) => serde_json::to_value(e),
            HubEvent::ReceiveNotification(e) => serde_json::to_value(e),
            HubEvent::FriendRequestReceived(e)
            | HubEvent::FriendRequestAccepted(e)
            | HubEvent::FriendRequestRejected(e)
            | HubEvent::FriendRequestCancelled(e)
            | HubEvent::FriendRemoved(e) => serde_json::to_value(e),
            HubEvent::FriendOnline(e) | HubEvent::FriendOffline(e) => serde_json::to_value(e),
            HubEvent::UserJoinedRoom(e) | HubEvent::UserLeftRoom(e) => serde_json::to_value(e),
        }
    }
}

/// Public view of a user, embedded in events and listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

/// A friendship transition, seen from the recipient. `user` is the party who acted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendshipEvent {
    pub friendship_id: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMessageEvent {
    pub id: String,
    pub room: String,
    pub author: UserSummary,
    pub content: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMembershipEvent {
    pub room: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: String,
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    pub created_at: String,
}

impl From<&Notification> for NotificationEvent {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id.to_string(),
            kind: n.kind.as_str().to_string(),
            message: n.message.clone(),
            link: n.link.clone(),
            actor_id: n.actor_id.map(|id| id.to_string()),
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn alice() -> UserSummary {
        UserSummary {
            id: "7".into(),
            username: "alice".into(),
            display_name: None,
            avatar_url: None,
        }
    }

    #[test]
    fn test_event_name_matches_serde_tag() {
        let event = HubEvent::FriendRequestReceived(FriendshipEvent {
            friendship_id: "1".into(),
            user: alice(),
        });
        let tagged = serde_json::to_value(&event).unwrap();
        assert_eq!(tagged["t"], json!(event.event_name()));
    }

    #[test]
    fn test_payload_is_untagged_body() {
        let event = HubEvent::FriendOnline(PresenceEvent { user_id: "7".into() });
        assert_eq!(event.payload().unwrap(), json!({ "user_id": "7" }));
    }

    #[test]
    fn test_user_summary_skips_missing_optionals() {
        let value = serde_json::to_value(alice()).unwrap();
        assert_eq!(value, json!({ "id": "7", "username": "alice" }));
    }
}
