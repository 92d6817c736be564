//! Friendship Handlers
//!
//! Listings return data directly; transitions answer with the
//! `{success, message, data?}` envelope.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::response::{
    ApiResponse, FriendResponse, FriendshipResponse, RelationshipResponse,
};
use crate::application::services::{
    Broadcaster, FriendshipService, FriendshipServiceImpl, NotificationServiceImpl,
};
use crate::infrastructure::repositories::{
    PgFriendshipRepository, PgNotificationRepository, PgUserRepository,
};
use crate::presentation::http::extractors::{parse_id, Pagination};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::startup::AppState;

type PgFriendshipService = FriendshipServiceImpl<PgFriendshipRepository, PgUserRepository>;

fn friendship_service(state: &AppState) -> PgFriendshipService {
    let broadcaster: Arc<dyn Broadcaster> = state.hub.clone();
    let notifier = NotificationServiceImpl::new(
        Arc::new(PgNotificationRepository::new(state.db.clone())),
        broadcaster,
        state.snowflake.clone(),
    );

    FriendshipServiceImpl::new(
        Arc::new(PgFriendshipRepository::new(state.db.clone())),
        Arc::new(PgUserRepository::new(state.db.clone())),
        Arc::new(notifier),
        state.presence.clone(),
        state.snowflake.clone(),
    )
}

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Pagination(page): Pagination,
) -> Result<Json<Page<FriendResponse>>, AppError> {
    let friends = friendship_service(&state).list_friends(auth.user_id, page).await?;
    Ok(Json(friends.map(FriendResponse::from)))
}

pub async fn list_incoming_requests(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Pagination(page): Pagination,
) -> Result<Json<Page<FriendResponse>>, AppError> {
    let requests = friendship_service(&state)
        .list_incoming_requests(auth.user_id, page)
        .await?;
    Ok(Json(requests.map(FriendResponse::from)))
}

pub async fn list_outgoing_requests(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Pagination(page): Pagination,
) -> Result<Json<Page<FriendResponse>>, AppError> {
    let requests = friendship_service(&state)
        .list_outgoing_requests(auth.user_id, page)
        .await?;
    Ok(Json(requests.map(FriendResponse::from)))
}

pub async fn list_blocked(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Pagination(page): Pagination,
) -> Result<Json<Page<FriendResponse>>, AppError> {
    let blocked = friendship_service(&state).list_blocked(auth.user_id, page).await?;
    Ok(Json(blocked.map(FriendResponse::from)))
}

/// Relationship with another user, from the caller's side
pub async fn get_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<RelationshipResponse>, AppError> {
    let other = parse_id(&user_id, "user")?;
    let status = friendship_service(&state).get_status(auth.user_id, other).await?;
    Ok(Json(RelationshipResponse::from(status)))
}

pub async fn send_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<FriendshipResponse>>), AppError> {
    let target = parse_id(&user_id, "user")?;
    let friendship = friendship_service(&state).send_request(auth.user_id, target).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Friend request sent", FriendshipResponse::from(friendship))),
    ))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<FriendshipResponse>>, AppError> {
    let requester = parse_id(&user_id, "user")?;
    let friendship = friendship_service(&state)
        .accept_request(auth.user_id, requester)
        .await?;
    Ok(Json(ApiResponse::ok(
        "Friend request accepted",
        FriendshipResponse::from(friendship),
    )))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let requester = parse_id(&user_id, "user")?;
    friendship_service(&state)
        .reject_request(auth.user_id, requester)
        .await?;
    Ok(Json(ApiResponse::message("Friend request rejected")))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let target = parse_id(&user_id, "user")?;
    friendship_service(&state).cancel_request(auth.user_id, target).await?;
    Ok(Json(ApiResponse::message("Friend request cancelled")))
}

pub async fn remove_friend(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let friend = parse_id(&user_id, "user")?;
    friendship_service(&state).remove_friend(auth.user_id, friend).await?;
    Ok(Json(ApiResponse::message("Friend removed")))
}

pub async fn block_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<FriendshipResponse>>, AppError> {
    let target = parse_id(&user_id, "user")?;
    let friendship = friendship_service(&state).block_user(auth.user_id, target).await?;
    Ok(Json(ApiResponse::ok("User blocked", FriendshipResponse::from(friendship))))
}

pub async fn unblock_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let target = parse_id(&user_id, "user")?;
    friendship_service(&state).unblock_user(auth.user_id, target).await?;
    Ok(Json(ApiResponse::message("User unblocked")))
}
