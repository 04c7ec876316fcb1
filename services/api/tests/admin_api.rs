//! HTTP-level tests for role resolution, the first-admin bootstrap and moderation.

mod common;

use axum::http::StatusCode;
use common::{body_json, listing_body, pickup_body, report_body, TestApp};
use ewaste_core::authz::AdminRole;
use serde_json::json;

#[tokio::test]
async fn regular_users_have_no_role() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("ada@example.com").await;

    let me = body_json(app.get("/admin/me", &cookie).await).await;
    assert_eq!(me, json!({ "is_admin": false, "role": null }));
}

#[tokio::test]
async fn the_first_admin_can_only_be_initialized_once() {
    let app = TestApp::new();
    let (ada, _) = app.signup("ada@example.com").await;
    let (bob, _) = app.signup("bob@example.com").await;

    // An unknown email does not use up the bootstrap.
    let unknown = app
        .post("/admin/initialize", &ada, json!({ "email": "nobody@example.com" }))
        .await;
    assert_eq!(body_json(unknown).await["initialized"], false);

    let first = app
        .post("/admin/initialize", &ada, json!({ "email": "Ada@Example.com" }))
        .await;
    assert_eq!(body_json(first).await["initialized"], true);

    let second = app
        .post("/admin/initialize", &bob, json!({ "email": "bob@example.com" }))
        .await;
    assert_eq!(body_json(second).await["initialized"], false);

    let me = body_json(app.get("/admin/me", &ada).await).await;
    assert_eq!(me, json!({ "is_admin": true, "role": "super_admin" }));
    let me = body_json(app.get("/admin/me", &bob).await).await;
    assert_eq!(me["is_admin"], false);
}

#[tokio::test]
async fn admin_routes_are_closed_to_lower_roles() {
    let app = TestApp::new();
    let (user, _) = app.signup("ada@example.com").await;
    let (moderator, _) = app.signup_admin("mod@example.com", AdminRole::Moderator).await;
    let (admin, _) = app.signup_admin("admin@example.com", AdminRole::Admin).await;

    assert_eq!(app.get("/admin/users", &user).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.get("/admin/users", &moderator).await.status(), StatusCode::FORBIDDEN);

    let response = app.get("/admin/users", &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn inactive_roles_grant_nothing() {
    let app = TestApp::new();
    let (cookie, user_id) = app.signup("ada@example.com").await;
    app.db.seed_admin(user_id, AdminRole::SuperAdmin, false);

    assert_eq!(body_json(app.get("/admin/me", &cookie).await).await["is_admin"], false);
    assert_eq!(app.get("/admin/users", &cookie).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn granting_follows_the_role_ranking() {
    let app = TestApp::new();
    let (admin, admin_id) = app.signup_admin("admin@example.com", AdminRole::Admin).await;
    let (_, target) = app.signup("ada@example.com").await;

    let granted = app
        .post("/admin/users", &admin, json!({ "user_id": target, "role": "moderator" }))
        .await;
    assert_eq!(granted.status(), StatusCode::CREATED);
    let granted = body_json(granted).await;
    assert_eq!(granted["role"], "moderator");
    assert_eq!(granted["created_by"], admin_id.to_string());

    let too_high = app
        .post("/admin/users", &admin, json!({ "user_id": target, "role": "admin" }))
        .await;
    assert_eq!(too_high.status(), StatusCode::FORBIDDEN);

    let unknown = app
        .post("/admin/users", &admin, json!({ "user_id": target, "role": "owner" }))
        .await;
    assert_eq!(unknown.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let (super_admin, _) = app.signup_admin("root@example.com", AdminRole::SuperAdmin).await;
    let promoted = app
        .post("/admin/users", &super_admin, json!({ "user_id": target, "role": "admin" }))
        .await;
    assert_eq!(promoted.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn admins_cannot_demote_a_super_admin() {
    let app = TestApp::new();
    let (admin, _) = app.signup_admin("admin@example.com", AdminRole::Admin).await;
    let (boss, boss_id) = app.signup_admin("boss@example.com", AdminRole::SuperAdmin).await;

    let demoted = app
        .post("/admin/users", &admin, json!({ "user_id": boss_id, "role": "moderator" }))
        .await;
    assert_eq!(demoted.status(), StatusCode::FORBIDDEN);

    let me = body_json(app.get("/admin/me", &boss).await).await;
    assert_eq!(me, json!({ "is_admin": true, "role": "super_admin" }));
}

#[tokio::test]
async fn completing_a_pickup_awards_eco_points() {
    let app = TestApp::new();
    let (ada, _) = app.signup("ada@example.com").await;
    let (moderator, _) = app.signup_admin("mod@example.com", AdminRole::Moderator).await;
    let request = body_json(app.post("/collection-requests", &ada, pickup_body()).await).await;
    let uri = format!(
        "/admin/collection-requests/{}/status",
        request["id"].as_str().unwrap()
    );

    // Steps cannot be skipped.
    let skipped = app.post(&uri, &moderator, json!({ "status": "completed" })).await;
    assert_eq!(skipped.status(), StatusCode::CONFLICT);

    for status in ["confirmed", "in_progress", "completed"] {
        let response = app.post(&uri, &moderator, json!({ "status": status })).await;
        assert_eq!(response.status(), StatusCode::OK, "{status}");
        assert_eq!(body_json(response).await["status"], status);
    }

    let wallet = body_json(app.get("/wallet", &ada).await).await;
    assert_eq!(wallet["eco_points"], 10);

    // Owners cannot cancel once the pickup has moved on.
    let cancel = app
        .post_empty(
            &format!("/collection-requests/{}/cancel", request["id"].as_str().unwrap()),
            &ada,
        )
        .await;
    assert_eq!(cancel.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn moderation_requires_a_role_and_a_known_status() {
    let app = TestApp::new();
    let (ada, _) = app.signup("ada@example.com").await;
    let (moderator, _) = app.signup_admin("mod@example.com", AdminRole::Moderator).await;
    let report = body_json(app.post("/dumping-reports", &ada, report_body()).await).await;
    let uri = format!("/admin/dumping-reports/{}/status", report["id"].as_str().unwrap());

    let by_owner = app.post(&uri, &ada, json!({ "status": "in_progress" })).await;
    assert_eq!(by_owner.status(), StatusCode::FORBIDDEN);

    let unknown = app.post(&uri, &moderator, json!({ "status": "archived" })).await;
    assert_eq!(unknown.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let moved = app.post(&uri, &moderator, json!({ "status": "in_progress" })).await;
    assert_eq!(moved.status(), StatusCode::OK);
    let resolved = app.post(&uri, &moderator, json!({ "status": "resolved" })).await;
    assert_eq!(body_json(resolved).await["status"], "resolved");

    let missing = format!("/admin/dumping-reports/{}/status", uuid::Uuid::new_v4());
    let response = app.post(&missing, &moderator, json!({ "status": "in_progress" })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analytics_counts_the_platform_for_admins_only() {
    let app = TestApp::new();
    let (ada, _) = app.signup("ada@example.com").await;
    let (moderator, _) = app.signup_admin("mod@example.com", AdminRole::Moderator).await;
    let (admin, _) = app.signup_admin("admin@example.com", AdminRole::Admin).await;
    app.post("/collection-requests", &ada, pickup_body()).await;
    app.post("/dumping-reports", &ada, report_body()).await;
    app.post("/marketplace/listings", &ada, listing_body()).await;

    assert_eq!(app.get("/admin/analytics", &moderator).await.status(), StatusCode::FORBIDDEN);

    let response = app.get("/admin/analytics", &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rows = body_json(response).await;
    let value = |metric: &str| {
        rows.as_array()
            .unwrap()
            .iter()
            .find(|r| r["metric"] == metric)
            .map(|r| r["value"].clone())
            .unwrap()
    };
    assert_eq!(value("total_users"), 3);
    assert_eq!(value("pending_collection_requests"), 1);
    assert_eq!(value("open_dumping_reports"), 1);
    assert_eq!(value("available_listings"), 1);
    assert_eq!(value("registered_items"), 0);
    assert!(rows[0]["description"].is_string());
}
