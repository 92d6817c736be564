//! Notification API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;

use crate::common::{access_token, test_server};

#[tokio::test]
async fn test_notifications_require_auth() {
    let server = test_server();

    server
        .get("/api/v1/notifications/unread-count")
        .expect_failure()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_mark_read_rejects_bad_id() {
    let server = test_server();

    let response = server
        .post("/api/v1/notifications/xyz/read")
        .authorization_bearer(access_token(1))
        .expect_failure()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "Invalid notification ID");
}

#[tokio::test]
async fn test_delete_rejects_bad_id() {
    let server = test_server();

    server
        .delete("/api/v1/notifications/1.5")
        .authorization_bearer(access_token(1))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
