mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{api_request, create_test_user, login_user, setup_test_app};

#[tokio::test]
async fn register_returns_public_user() {
    let app = setup_test_app().await.expect("setup app");

    let (status, body) = api_request(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "secret123"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@example.com");
    assert!(body["id"].is_string());
    // The password hash must never leave the server
    assert!(body.get("password").is_none());
    assert!(body.get("passwordHash").is_none());
}

#[tokio::test]
async fn register_rejects_duplicates() {
    let app = setup_test_app().await.expect("setup app");

    let payload = json!({
        "username": "alice",
        "email": "alice@example.com",
        "password": "secret123"
    });
    let (status, _) = api_request(&app, "POST", "/auth/register", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    // Same username, different email
    let (status, body) = api_request(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": "alice",
            "email": "other@example.com",
            "password": "secret123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Username already exists");

    // Same email, different username
    let (status, body) = api_request(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": "alice2",
            "email": "alice@example.com",
            "password": "secret123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Email already exists");
}

#[tokio::test]
async fn register_validates_fields() {
    let app = setup_test_app().await.expect("setup app");

    let cases = [
        json!({"username": "abc", "email": "a@example.com", "password": "secret123"}),
        json!({"username": "validname", "email": "not-an-email", "password": "secret123"}),
        json!({"username": "validname", "email": "a@example.com", "password": "short"}),
        json!({"username": "   ", "email": "a@example.com", "password": "secret123"}),
    ];

    for payload in cases {
        let (status, _) = api_request(&app, "POST", "/auth/register", None, Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn login_returns_token_and_user() {
    let app = setup_test_app().await.expect("setup app");
    create_test_user(&app.state, "alice", "secret123")
        .await
        .expect("create user");

    let (status, body) = api_request(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"username": "alice", "password": "secret123"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
    assert_eq!(body["user"]["username"], "alice");
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = setup_test_app().await.expect("setup app");
    create_test_user(&app.state, "alice", "secret123")
        .await
        .expect("create user");

    let (status, _) = api_request(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"username": "alice", "password": "wrong-pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = api_request(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"username": "nobody", "password": "secret123"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_resolves_the_bearer_token() {
    let app = setup_test_app().await.expect("setup app");
    create_test_user(&app.state, "alice", "secret123")
        .await
        .expect("create user");
    let token = login_user(&app.router, "alice", "secret123")
        .await
        .expect("login");

    let (status, body) = api_request(&app, "GET", "/auth/me", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn me_requires_a_valid_token() {
    let app = setup_test_app().await.expect("setup app");

    let (status, _) = api_request(&app, "GET", "/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = api_request(&app, "GET", "/auth/me", Some("bogus-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let app = setup_test_app().await.expect("setup app");
    create_test_user(&app.state, "alice", "secret123")
        .await
        .expect("create user");
    let token = login_user(&app.router, "alice", "secret123")
        .await
        .expect("login");

    let (status, _) = api_request(&app, "POST", "/auth/logout", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = api_request(&app, "GET", "/auth/me", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
