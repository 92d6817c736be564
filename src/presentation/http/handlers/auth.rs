//! Authentication Handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::application::dto::request::{LoginRequest, RefreshTokenRequest, RegisterRequest};
use crate::application::dto::response::{ApiResponse, RegisterResponse, TokenResponse, UserResponse};
use crate::application::services::{AuthService, AuthServiceImpl, UserDto};
use crate::infrastructure::repositories::{PgSessionRepository, PgUserRepository};
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

fn auth_service(state: &AppState) -> AuthServiceImpl<PgUserRepository, PgSessionRepository> {
    AuthServiceImpl::new(
        Arc::new(PgUserRepository::new(state.db.clone())),
        Arc::new(PgSessionRepository::new(state.db.clone())),
        state.snowflake.clone(),
        state.settings.jwt.clone(),
    )
}

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    body.validate().map_err(validation_error)?;

    let (user, tokens) = auth_service(&state)
        .register(&body.username, &body.email, &body.password)
        .await?;

    let response = RegisterResponse {
        user: UserResponse::from_dto(UserDto::from(user), true),
        tokens: TokenResponse::from(tokens),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Login with credentials
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    body.validate().map_err(validation_error)?;

    let tokens = auth_service(&state)
        .authenticate(&body.email, &body.password)
        .await?;

    Ok(Json(TokenResponse::from(tokens)))
}

/// Exchange a refresh token for a new token pair
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    body.validate().map_err(validation_error)?;

    let tokens = auth_service(&state).refresh_token(&body.refresh_token).await?;

    Ok(Json(TokenResponse::from(tokens)))
}

/// Logout (revoke refresh token)
pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    // Unknown or already revoked tokens still log out.
    if let Err(e) = auth_service(&state).revoke_token(&body.refresh_token).await {
        tracing::debug!(error = %e, "Logout with unusable refresh token");
    }

    Ok(Json(ApiResponse::message("Logged out")))
}
