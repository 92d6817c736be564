//! User API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{access_token, test_server};

#[tokio::test]
async fn test_get_user_rejects_non_numeric_id() {
    let server = test_server();

    let response = server
        .get("/api/v1/users/not-a-number")
        .authorization_bearer(access_token(1))
        .expect_failure()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "Invalid user ID");
}

#[tokio::test]
async fn test_update_profile_validates_avatar_url() {
    let server = test_server();

    let response = server
        .patch("/api/v1/users/@me")
        .authorization_bearer(access_token(1))
        .json(&json!({ "avatar_url": "not a url" }))
        .expect_failure()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["errors"][0]["field"], "avatar_url");
}
