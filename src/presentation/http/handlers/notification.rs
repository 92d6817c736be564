//! Notification Inbox Handlers

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};

use crate::application::dto::response::{ApiResponse, NotificationResponse, UnreadCountResponse};
use crate::application::services::{Broadcaster, NotificationService, NotificationServiceImpl};
use crate::infrastructure::repositories::PgNotificationRepository;
use crate::presentation::http::extractors::{parse_id, Pagination};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::startup::AppState;

fn notification_service(state: &AppState) -> NotificationServiceImpl<PgNotificationRepository> {
    let broadcaster: Arc<dyn Broadcaster> = state.hub.clone();
    NotificationServiceImpl::new(
        Arc::new(PgNotificationRepository::new(state.db.clone())),
        broadcaster,
        state.snowflake.clone(),
    )
}

/// Newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Pagination(page): Pagination,
) -> Result<Json<Page<NotificationResponse>>, AppError> {
    let notifications = notification_service(&state).list(auth.user_id, page).await?;
    Ok(Json(notifications.map(NotificationResponse::from)))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread = notification_service(&state).unread_count(auth.user_id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(notification_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let id = parse_id(&notification_id, "notification")?;
    notification_service(&state).mark_read(auth.user_id, id).await?;
    Ok(Json(ApiResponse::message("Notification marked as read")))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let updated = notification_service(&state).mark_all_read(auth.user_id).await?;
    Ok(Json(ApiResponse::message(format!(
        "{} notifications marked as read",
        updated
    ))))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(notification_id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let id = parse_id(&notification_id, "notification")?;
    notification_service(&state).delete(auth.user_id, id).await?;
    Ok(Json(ApiResponse::message("Notification deleted")))
}
