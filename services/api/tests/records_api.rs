//! HTTP-level tests for pickups, dumping reports, marketplace listings and the wallet.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{body_json, listing_body, pickup_body, report_body, TestApp};
use ewaste_core::domain::{DumpingAnalysis, Severity};
use ewaste_core::memory::{CannedAnalysis, CannedAssistant};
use ewaste_core::ports::{DumpingAnalysisService, PortResult};
use serde_json::json;
use tokio::sync::Notify;
use tower::ServiceExt;

/// Analysis that signals when it starts and then waits to be released.
#[derive(Default)]
struct HeldAnalysis {
    started: Notify,
    release: Notify,
}

#[async_trait]
impl DumpingAnalysisService for HeldAnalysis {
    async fn analyze(&self, _: &str, _: &str, _: &str) -> PortResult<DumpingAnalysis> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(DumpingAnalysis {
            severity: Severity::Low,
            recommendations: "Bag the loose parts.".to_string(),
        })
    }
}

#[tokio::test]
async fn a_new_pickup_is_pending_and_listed_newest_first() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("ada@example.com").await;

    let first = body_json(app.post("/collection-requests", &cookie, pickup_body()).await).await;
    assert_eq!(first["status"], "pending");
    assert_eq!(first["state"], "N/A");

    let mut second_body = pickup_body();
    second_body["state"] = json!("Lagos State");
    let second = body_json(app.post("/collection-requests", &cookie, second_body).await).await;

    let list = body_json(app.get("/collection-requests", &cookie).await).await;
    let ids: Vec<_> = list.as_array().unwrap().iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![second["id"].clone(), first["id"].clone()]);
}

#[tokio::test]
async fn invalid_pickups_are_rejected_with_field_messages() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("ada@example.com").await;

    let response = app
        .post(
            "/collection-requests",
            &cookie,
            json!({ "address": "12", "city": "Lagos", "postal_code": "100001" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let past = (app.clock_now() - chrono::Duration::days(1)).to_rfc3339();
    let mut body = pickup_body();
    body["scheduled_date"] = json!(past);
    let response = app.post("/collection-requests", &cookie, body).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let list = body_json(app.get("/collection-requests", &cookie).await).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cancelling_is_idempotent_and_owner_only() {
    let app = TestApp::new();
    let (ada, _) = app.signup("ada@example.com").await;
    let (bob, _) = app.signup("bob@example.com").await;
    let request = body_json(app.post("/collection-requests", &ada, pickup_body()).await).await;
    let uri = format!("/collection-requests/{}/cancel", request["id"].as_str().unwrap());

    assert_eq!(app.post_empty(&uri, &bob).await.status(), StatusCode::FORBIDDEN);

    for _ in 0..2 {
        let response = app.post_empty(&uri, &ada).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "cancelled");
    }

    let missing = format!("/collection-requests/{}/cancel", uuid::Uuid::new_v4());
    assert_eq!(app.post_empty(&missing, &ada).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reports_carry_the_analysis() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("ada@example.com").await;

    let response = app.post("/dumping-reports", &cookie, report_body()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let report = body_json(response).await;
    assert_eq!(report["status"], "pending");
    assert_eq!(report["severity"], "high");
    assert_eq!(
        report["ai_recommendations"],
        "Contact the municipal hazardous waste office."
    );

    let list = body_json(app.get("/dumping-reports", &cookie).await).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reports_are_filed_as_medium_when_analysis_fails() {
    let app = TestApp::with_services(
        Arc::new(CannedAnalysis::failing()),
        Arc::new(CannedAssistant(String::new())),
    );
    let (cookie, _) = app.signup("ada@example.com").await;

    let response = app.post("/dumping-reports", &cookie, report_body()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["severity"], "medium");
}

#[tokio::test]
async fn a_second_report_while_the_first_is_running_is_rejected() {
    let analysis = Arc::new(HeldAnalysis::default());
    let app = TestApp::with_services(
        analysis.clone(),
        Arc::new(CannedAssistant(String::new())),
    );
    let (cookie, _) = app.signup("ada@example.com").await;

    let first = Request::builder()
        .method(Method::POST)
        .uri("/dumping-reports")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(report_body().to_string()))
        .unwrap();
    let first = tokio::spawn(app.router.clone().oneshot(first));
    analysis.started.notified().await;

    let second = app.post("/dumping-reports", &cookie, report_body()).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);

    analysis.release.notify_one();
    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let reports = body_json(app.get("/dumping-reports", &cookie).await).await;
    assert_eq!(reports.as_array().unwrap().len(), 1);

    // The slot is free again once the first submission finished.
    let third = app.post("/dumping-reports", &cookie, report_body());
    analysis.release.notify_one();
    assert_eq!(third.await.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn listings_are_browsable_until_marked_sold() {
    let app = TestApp::new();
    let (ada, ada_id) = app.signup("ada@example.com").await;
    let (bob, _) = app.signup("bob@example.com").await;

    let listing = body_json(app.post("/marketplace/listings", &ada, listing_body()).await).await;
    assert_eq!(listing["is_available"], true);
    assert_eq!(listing["owner_id"], ada_id.to_string());

    let browse = body_json(app.get("/marketplace/listings", &bob).await).await;
    assert_eq!(browse.as_array().unwrap().len(), 1);
    let own = body_json(app.get("/marketplace/listings?mine=true", &bob).await).await;
    assert!(own.as_array().unwrap().is_empty());

    let uri = format!(
        "/marketplace/listings/{}/availability",
        listing["id"].as_str().unwrap()
    );
    let stranger = app.post(&uri, &bob, json!({ "is_available": false })).await;
    assert_eq!(stranger.status(), StatusCode::FORBIDDEN);

    let sold = app.post(&uri, &ada, json!({ "is_available": false })).await;
    assert_eq!(sold.status(), StatusCode::OK);
    assert_eq!(body_json(sold).await["is_available"], false);

    let browse = body_json(app.get("/marketplace/listings", &bob).await).await;
    assert!(browse.as_array().unwrap().is_empty());
    let own = body_json(app.get("/marketplace/listings?mine=true", &ada).await).await;
    assert_eq!(own.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn free_listings_must_not_carry_a_price() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("ada@example.com").await;
    let mut body = listing_body();
    body["price"] = json!(20.0);

    let response = app.post("/marketplace/listings", &cookie, body).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn a_new_wallet_is_empty() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("ada@example.com").await;

    let wallet = body_json(app.get("/wallet", &cookie).await).await;
    assert_eq!(wallet, json!({ "eco_points": 0 }));
}

fn item_body(condition: &str) -> serde_json::Value {
    json!({
        "name": "ThinkPad T430",
        "category": "Laptop",
        "brand": "Lenovo",
        "model": "T430",
        "condition": condition
    })
}

#[tokio::test]
async fn working_items_are_registered_with_a_free_listing() {
    let app = TestApp::new();
    let (ada, _) = app.signup("ada@example.com").await;
    let (bob, _) = app.signup("bob@example.com").await;

    let response = app.post("/items", &ada, item_body("Working")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let registered = body_json(response).await;
    assert_eq!(registered["item"]["status"], "registered");
    assert_eq!(registered["listing"]["title"], "ThinkPad T430");
    assert_eq!(registered["listing"]["description"], "Lenovo T430 Laptop");
    assert_eq!(registered["listing"]["is_free"], true);
    assert_eq!(registered["listing"]["location"], "Not specified");

    let browse = body_json(app.get("/marketplace/listings", &bob).await).await;
    assert_eq!(browse.as_array().unwrap().len(), 1);

    let broken = body_json(app.post("/items", &ada, item_body("Not Working")).await).await;
    assert!(broken["listing"].is_null());

    let items = body_json(app.get("/items", &ada).await).await;
    let conditions: Vec<_> = items.as_array().unwrap().iter().map(|i| i["condition"].clone()).collect();
    assert_eq!(conditions, vec![json!("Not Working"), json!("Working")]);
    assert!(body_json(app.get("/items", &bob).await).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn a_failed_listing_still_registers_the_item() {
    let app = TestApp::new();
    let (ada, _) = app.signup("ada@example.com").await;
    app.db.set_listings_failing(true);

    let response = app.post("/items", &ada, item_body("Damaged")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(body_json(response).await["listing"].is_null());
    assert_eq!(body_json(app.get("/items", &ada).await).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn item_registration_is_validated_and_closed_offline() {
    let app = TestApp::new();
    let (ada, _) = app.signup("ada@example.com").await;

    let mut bad = item_body("Working");
    bad["category"] = json!("Fridge");
    let response = app.post("/items", &ada, bad).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    app.post_empty("/offline/start", &ada).await;
    let response = app.post("/items", &ada, item_body("Working")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.get("/items", &ada).await.status(), StatusCode::OK);
}
