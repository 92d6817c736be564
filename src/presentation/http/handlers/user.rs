//! User Handlers

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use validator::Validate;

use crate::application::dto::request::UpdateUserRequest;
use crate::application::dto::response::UserResponse;
use crate::application::services::{UpdateProfileDto, UserService, UserServiceImpl};
use crate::infrastructure::repositories::PgUserRepository;
use crate::presentation::http::extractors::parse_id;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

fn user_service(state: &AppState) -> UserServiceImpl<PgUserRepository> {
    UserServiceImpl::new(Arc::new(PgUserRepository::new(state.db.clone())))
}

/// Get current authenticated user
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>, AppError> {
    let user = user_service(&state).get_user(auth.user_id).await?;

    Ok(Json(UserResponse::from_dto(user, true)))
}

/// Update current user profile
pub async fn update_current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    body.validate().map_err(validation_error)?;

    let update = UpdateProfileDto {
        username: body.username,
        display_name: body.display_name,
        avatar_url: body.avatar_url,
        bio: body.bio,
    };

    let user = user_service(&state).update_profile(auth.user_id, update).await?;

    Ok(Json(UserResponse::from_dto(user, true)))
}

/// Get another user's public profile
pub async fn get_user(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    let user = user_service(&state).get_user(user_id).await?;

    Ok(Json(UserResponse::from_dto(user, false)))
}
