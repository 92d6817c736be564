//! Response DTOs
//!
//! Data structures for API response bodies.

use serde::Serialize;

use crate::application::services::{
    AuthTokens, FriendDto, FriendshipDto, RelationshipDto, RequestDirection, UserDto,
};
use crate::domain::{FriendshipStatus, Notification, NotificationKind, UserSummary};

/// `{success, message, data?}` envelope returned by action endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Authentication tokens response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl From<AuthTokens> for TokenResponse {
    fn from(tokens: AuthTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            token_type: tokens.token_type,
        }
    }
}

/// Registration response (includes user and tokens)
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

/// User response
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
}

impl UserResponse {
    /// Email is only shown to the account owner.
    pub fn from_dto(dto: UserDto, include_email: bool) -> Self {
        Self {
            id: dto.id,
            username: dto.username,
            email: include_email.then_some(dto.email),
            display_name: dto.display_name,
            avatar_url: dto.avatar_url,
            bio: dto.bio,
            created_at: dto.created_at,
        }
    }
}

/// A friendship row after a transition
#[derive(Debug, Serialize)]
pub struct FriendshipResponse {
    pub id: String,
    pub user_id: String,
    pub friend_id: String,
    pub status: FriendshipStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<String>,
}

impl From<FriendshipDto> for FriendshipResponse {
    fn from(dto: FriendshipDto) -> Self {
        Self {
            id: dto.id,
            user_id: dto.user_id,
            friend_id: dto.friend_id,
            status: dto.status,
            blocked_by: dto.blocked_by,
            created_at: dto.created_at,
            accepted_at: dto.accepted_at,
        }
    }
}

/// Entry of a friend, request or block listing
#[derive(Debug, Serialize)]
pub struct FriendResponse {
    pub friendship_id: String,
    pub user: UserSummary,
    pub status: FriendshipStatus,
    pub since: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
}

impl From<FriendDto> for FriendResponse {
    fn from(dto: FriendDto) -> Self {
        Self {
            friendship_id: dto.friendship_id,
            user: dto.user,
            status: dto.status,
            since: dto.since,
            online: dto.online,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RelationshipResponse {
    pub user_id: String,
    pub status: FriendshipStatus,
    /// `incoming` or `outgoing` while a request is pending
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<&'static str>,
    pub blocked_by_me: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendship_id: Option<String>,
}

impl From<RelationshipDto> for RelationshipResponse {
    fn from(dto: RelationshipDto) -> Self {
        Self {
            user_id: dto.user_id,
            status: dto.status,
            direction: dto.direction.map(|d| match d {
                RequestDirection::Incoming => "incoming",
                RequestDirection::Outgoing => "outgoing",
            }),
            blocked_by_me: dto.blocked_by_me,
            friendship_id: dto.friendship_id,
        }
    }
}

/// Inbox entry
#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: String,
    pub kind: NotificationKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id.to_string(),
            kind: n.kind,
            message: n.message,
            link: n.link,
            actor_id: n.actor_id.map(|id| id.to_string()),
            is_read: n.is_read,
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}
