//! Authentication API Tests
//!
//! Input validation and token checks, which answer before storage is used.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{access_token, test_server, unique_email, unique_username, JWT_SECRET};

#[tokio::test]
async fn test_register_with_invalid_email_fails() {
    let server = test_server();

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "username": unique_username(),
            "email": "not-an-email",
            "password": "ValidPassword123!"
        }))
        .expect_failure()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 10007);
    assert_eq!(body["errors"][0]["field"], "email");
}

#[tokio::test]
async fn test_register_with_short_password_fails() {
    let server = test_server();

    let response = server
        .post("/api/v1/auth/register")
        .json(&json!({
            "username": unique_username(),
            "email": unique_email(),
            "password": "short"
        }))
        .expect_failure()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["errors"][0]["field"], "password");
}

#[tokio::test]
async fn test_login_requires_password() {
    let server = test_server();

    server
        .post("/api/v1/auth/login")
        .json(&json!({ "email": unique_email(), "password": "" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_requires_token() {
    let server = test_server();

    server
        .post("/api/v1/auth/refresh")
        .json(&json!({ "refresh_token": "" }))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_route_without_token_is_unauthorized() {
    let server = test_server();

    let response = server.get("/api/v1/users/@me").expect_failure().await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 10003);
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let server = test_server();

    server
        .get("/api/v1/users/@me")
        .authorization_bearer("not-a-jwt")
        .expect_failure()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_unauthorized() {
    let server = test_server();
    let mut jwt = crate::common::test_settings().jwt;
    jwt.secret = format!("{}-rotated", JWT_SECRET);
    let foreign = community_hub::application::services::auth_service::issue_access_token(7, &jwt)
        .expect("token");

    server
        .get("/api/v1/friends")
        .authorization_bearer(foreign)
        .expect_failure()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_token_passes_middleware() {
    let server = test_server();

    // Passes auth, then fails on the malformed path ID before any storage call.
    server
        .get("/api/v1/users/abc")
        .authorization_bearer(access_token(42))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
