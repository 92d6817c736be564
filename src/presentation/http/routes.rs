//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    http::header::CONTENT_TYPE,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{auth_middleware, logging::track_metrics};
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // Real-time hub; the socket authenticates itself with an Identify frame
        .route("/hub", get(ws_handler))
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        metrics::gather_metrics(),
    )
}

/// API v1 routes
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/users", user_routes(state.clone()))
        .nest("/friends", friend_routes(state.clone()))
        .nest("/notifications", notification_routes(state))
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh_token))
        .route("/logout", post(handlers::auth::logout))
}

/// User routes (protected)
fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/@me",
            get(handlers::user::get_current_user).patch(handlers::user::update_current_user),
        )
        .route("/{user_id}", get(handlers::user::get_user))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Friendship routes (protected). `{user_id}` is always the other party.
fn friend_routes(state: AppState) -> Router<AppState> {
    use handlers::friendship as f;

    Router::new()
        .route("/", get(f::list_friends))
        .route("/requests/incoming", get(f::list_incoming_requests))
        .route("/requests/outgoing", get(f::list_outgoing_requests))
        .route("/blocked", get(f::list_blocked))
        .route("/{user_id}", delete(f::remove_friend))
        .route("/{user_id}/status", get(f::get_status))
        .route("/{user_id}/request", post(f::send_request).delete(f::cancel_request))
        .route("/{user_id}/accept", post(f::accept_request))
        .route("/{user_id}/reject", post(f::reject_request))
        .route("/{user_id}/block", post(f::block_user).delete(f::unblock_user))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Notification inbox routes (protected)
fn notification_routes(state: AppState) -> Router<AppState> {
    use handlers::notification as n;

    Router::new()
        .route("/", get(n::list_notifications))
        .route("/unread-count", get(n::unread_count))
        .route("/read-all", post(n::mark_all_read))
        .route("/{id}/read", post(n::mark_read))
        .route("/{id}", delete(n::delete_notification))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
