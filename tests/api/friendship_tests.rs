//! Friendship API Tests
//!
//! Routing, authentication and path validation for the friendship endpoints.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::Value;
use test_case::test_case;

use crate::common::{access_token, test_server};

#[test_case("GET", "/api/v1/friends"; "list friends")]
#[test_case("GET", "/api/v1/friends/requests/incoming"; "incoming")]
#[test_case("GET", "/api/v1/friends/requests/outgoing"; "outgoing")]
#[test_case("GET", "/api/v1/friends/blocked"; "blocked")]
#[test_case("POST", "/api/v1/friends/5/request"; "send request")]
#[test_case("POST", "/api/v1/friends/5/accept"; "accept")]
#[test_case("DELETE", "/api/v1/friends/5"; "remove")]
#[test_case("POST", "/api/v1/friends/5/block"; "block")]
#[tokio::test]
async fn test_friend_routes_require_auth(method: &str, path: &str) {
    let server = test_server();

    let request = match method {
        "GET" => server.get(path),
        "POST" => server.post(path),
        _ => server.delete(path),
    };

    request
        .expect_failure()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[test_case("POST", "/api/v1/friends/abc/request"; "send request")]
#[test_case("POST", "/api/v1/friends/abc/accept"; "accept")]
#[test_case("POST", "/api/v1/friends/abc/reject"; "reject")]
#[test_case("DELETE", "/api/v1/friends/abc/request"; "cancel")]
#[test_case("DELETE", "/api/v1/friends/abc"; "remove")]
#[test_case("POST", "/api/v1/friends/-3/block"; "block negative")]
#[test_case("DELETE", "/api/v1/friends/0/block"; "unblock zero")]
#[test_case("GET", "/api/v1/friends/abc/status"; "status")]
#[tokio::test]
async fn test_friend_routes_reject_bad_user_id(method: &str, path: &str) {
    let server = test_server();
    let token = access_token(1);

    let request = match method {
        "GET" => server.get(path),
        "POST" => server.post(path),
        _ => server.delete(path),
    };

    let response = request.authorization_bearer(token).expect_failure().await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid user ID");
}

#[tokio::test]
async fn test_list_rejects_malformed_paging() {
    let server = test_server();

    server
        .get("/api/v1/friends?page=first")
        .authorization_bearer(access_token(1))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
