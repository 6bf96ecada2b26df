//! Session lifecycle over HTTP: sign-up, sign-in, refresh and sign-out.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use cartline_integration_tests::{TEST_PASSWORD, TestApp};

#[tokio::test]
async fn test_sign_up_returns_token_user_and_cookie() {
    let app = TestApp::new();

    let response = app
        .post_json(
            "/auth/sign-up",
            &json!({ "name": "Grace Hopper", "email": "Grace@Example.com", "password": TEST_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert!(response.body["accessToken"].as_str().is_some());
    assert_eq!(response.body["user"]["email"], "grace@example.com");
    assert_eq!(response.body["user"]["name"], "Grace Hopper");
    assert!(response.body["user"].get("passwordHash").is_none());
    assert!(response.body.get("refreshToken").is_none());

    let cookie = response
        .set_cookies()
        .into_iter()
        .find(|c| c.starts_with("refreshToken="))
        .unwrap();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/auth/refresh"));
    assert!(cookie.contains("Max-Age=604800"));
    // Development config: no Secure attribute
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn test_sign_up_duplicate_email_conflicts() {
    let app = TestApp::new();
    app.sign_up("dup@example.com").await;

    let response = app
        .post_json(
            "/auth/sign-up",
            &json!({ "name": "Again", "email": "DUP@example.com", "password": TEST_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["error"], "Email in use");
}

#[tokio::test]
async fn test_sign_up_validation() {
    let app = TestApp::new();

    let bad_email = app
        .post_json(
            "/auth/sign-up",
            &json!({ "name": "X", "email": "not-an-email", "password": TEST_PASSWORD }),
            None,
        )
        .await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);

    let short_password = app
        .post_json(
            "/auth/sign-up",
            &json!({ "name": "X", "email": "x@example.com", "password": "short" }),
            None,
        )
        .await;
    assert_eq!(short_password.status, StatusCode::BAD_REQUEST);

    let missing_field = app
        .post_json("/auth/sign-up", &json!({ "email": "x@example.com" }), None)
        .await;
    assert_eq!(missing_field.status, StatusCode::BAD_REQUEST);
    assert!(missing_field.body["error"].is_string());
}

#[tokio::test]
async fn test_sign_in_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.sign_up("known@example.com").await;

    let wrong_password = app
        .post_json(
            "/auth/sign-in",
            &json!({ "email": "known@example.com", "password": "wrong-password" }),
            None,
        )
        .await;
    let unknown_email = app
        .post_json(
            "/auth/sign-in",
            &json!({ "email": "nobody@example.com", "password": TEST_PASSWORD }),
            None,
        )
        .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_email.body);
}

#[tokio::test]
async fn test_refresh_issues_access_token() {
    let app = TestApp::new();
    let session = app.sign_up("refresh@example.com").await;

    let response = app.refresh(Some(&session.refresh_cookie)).await;
    assert_eq!(response.status, StatusCode::OK);

    let access_token = response.body["accessToken"].as_str().unwrap();
    let me = app.get("/auth/me", Some(access_token)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["email"], "refresh@example.com");
}

#[tokio::test]
async fn test_refresh_without_or_with_garbage_cookie() {
    let app = TestApp::new();

    assert_eq!(app.refresh(None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.refresh(Some("refreshToken=not.a.jwt")).await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_access_token_cannot_refresh() {
    let app = TestApp::new();
    let session = app.sign_up("mixup@example.com").await;

    let cookie = format!("refreshToken={}", session.access_token);
    assert_eq!(
        app.refresh(Some(&cookie)).await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_sign_in_supersedes_previous_refresh_token() {
    let app = TestApp::new();
    let first = app.sign_up("rotate@example.com").await;
    let second = app.sign_in("rotate@example.com").await;

    assert_ne!(first.refresh_cookie, second.refresh_cookie);
    assert_eq!(
        app.refresh(Some(&first.refresh_cookie)).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.refresh(Some(&second.refresh_cookie)).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_sign_out_revokes_refresh_and_clears_cookie() {
    let app = TestApp::new();
    let session = app.sign_up("bye@example.com").await;

    let response = app
        .post_json("/auth/sign-out", &json!({}), Some(&session.access_token))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let cleared = response
        .set_cookies()
        .into_iter()
        .find(|c| c.starts_with("refreshToken="))
        .unwrap();
    assert!(cleared.contains("Max-Age=0"));

    assert_eq!(
        app.refresh(Some(&session.refresh_cookie)).await.status,
        StatusCode::UNAUTHORIZED
    );

    // Signing in again starts a fresh session
    let again = app.sign_in("bye@example.com").await;
    assert_eq!(
        app.refresh(Some(&again.refresh_cookie)).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_protected_routes_require_bearer() {
    let app = TestApp::new();

    for path in ["/auth/me", "/orders", "/cart-items"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{path}");
        assert_eq!(response.body["error"], "Unauthorized");
    }

    let response = app.get("/auth/me", Some("garbage")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();

    let response = app.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.headers.get("x-request-id").is_some());
}
