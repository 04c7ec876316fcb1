//! HTTP-level tests for signup, login, logout and the session gate.

mod common;

use api_lib::config::Config;
use axum::http::{header, Method, StatusCode};
use common::{body_json, session_from, TestApp};
use serde_json::json;

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = TestApp::new();

    for uri in ["/me", "/offline", "/collection-requests", "/wallet", "/admin/me"] {
        let response = app.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    let response = app.get("/me", "session=not-a-real-session").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_issues_a_session_cookie() {
    let app = TestApp::new();
    let (cookie, user_id) = app.signup("  Ada@Example.com ").await;

    let response = app.get("/me", &cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["user_id"], user_id.to_string());
    assert_eq!(json["email"], "ada@example.com");
}

#[tokio::test]
async fn signup_rejects_duplicates_and_bad_input() {
    let app = TestApp::new();
    app.signup("ada@example.com").await;

    let duplicate = app
        .request(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({ "email": "ADA@example.com", "password": "another-one" })),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let short_password = app
        .request(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({ "email": "bob@example.com", "password": "12345" })),
        )
        .await;
    assert_eq!(short_password.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let bad_email = app
        .request(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({ "email": "bob", "password": "long-enough" })),
        )
        .await;
    assert_eq!(bad_email.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn login_checks_the_password() {
    let app = TestApp::new();
    app.signup("ada@example.com").await;

    let wrong = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let unknown = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "recycle-me" })),
        )
        .await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

    let ok = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "Ada@example.com", "password": "recycle-me" })),
        )
        .await;
    assert_eq!(ok.status(), StatusCode::OK);
    let cookie = session_from(&ok);
    assert_eq!(app.get("/me", &cookie).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("ada@example.com").await;

    let response = app.post_empty("/auth/logout", &cookie).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(app.get("/me", &cookie).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_cookie_lives_as_long_as_configured() {
    let app = TestApp::with_config(Config {
        session_ttl_days: 2,
        ..Config::for_tests()
    });
    let response = app
        .request(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({ "email": "ada@example.com", "password": "recycle-me" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(cookie.ends_with("Max-Age=172800"), "{cookie}");
}
