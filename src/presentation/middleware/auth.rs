//! Authentication Middleware
//!
//! JWT validation middleware for protected routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};

use crate::application::services::auth_service::decode_access_token;
use crate::application::services::AuthError;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Authenticated user extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
}

/// Authentication middleware that validates JWT access tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Authorization(bearer) = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let user_id = decode_access_token(bearer.token(), &state.settings.jwt.secret)
        .and_then(|claims| claims.user_id())
        .map_err(|e| match e {
            AuthError::TokenExpired => AppError::Unauthorized("Token expired".into()),
            _ => AppError::Unauthorized("Invalid token".into()),
        })?;

    request.extensions_mut().insert(AuthUser { user_id });

    Ok(next.run(request).await)
}
