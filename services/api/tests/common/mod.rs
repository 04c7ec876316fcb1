#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use api_lib::config::Config;
use api_lib::web::{router, AppState};
use ewaste_core::authz::AdminRole;
use chrono::Utc;
use ewaste_core::clock::ManualClock;
use ewaste_core::domain::Severity;
use ewaste_core::feed::BroadcastFeed;
use ewaste_core::memory::{CannedAnalysis, CannedAssistant, InMemoryDatabase};
use ewaste_core::ports::{AssistantService, DumpingAnalysisService};

/// The router plus handles on its state, in-memory store and clock.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: Arc<InMemoryDatabase>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_services(
            Arc::new(CannedAnalysis::returning(
                Severity::High,
                "Contact the municipal hazardous waste office.",
            )),
            Arc::new(CannedAssistant("Take it to a certified recycler.".to_string())),
        )
    }

    pub fn with_services(
        analysis: Arc<dyn DumpingAnalysisService>,
        assistant: Arc<dyn AssistantService>,
    ) -> Self {
        Self::build(Config::for_tests(), analysis, assistant)
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(
            config,
            Arc::new(CannedAnalysis::returning(Severity::Medium, "Report it to the council.")),
            Arc::new(CannedAssistant("Take it to a certified recycler.".to_string())),
        )
    }

    fn build(
        config: Config,
        analysis: Arc<dyn DumpingAnalysisService>,
        assistant: Arc<dyn AssistantService>,
    ) -> Self {
        let db = Arc::new(InMemoryDatabase::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let state = Arc::new(AppState::new(
            Arc::new(config),
            db.clone(),
            Arc::new(BroadcastFeed::new()),
            clock.clone(),
            analysis,
            assistant,
        ));
        Self {
            router: router(state.clone()),
            state,
            db,
            clock,
        }
    }

    pub fn clock_now(&self) -> chrono::DateTime<Utc> {
        use ewaste_core::ports::Clock;
        self.clock.now()
    }

    /// Sends one request through a clone of the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: &str) -> Response {
        self.request(Method::GET, uri, Some(cookie), None).await
    }

    pub async fn post(&self, uri: &str, cookie: &str, body: serde_json::Value) -> Response {
        self.request(Method::POST, uri, Some(cookie), Some(body)).await
    }

    pub async fn post_empty(&self, uri: &str, cookie: &str) -> Response {
        self.request(Method::POST, uri, Some(cookie), None).await
    }

    /// Signs up `email` and returns the `Cookie` header value and the new user id.
    pub async fn signup(&self, email: &str) -> (String, Uuid) {
        let response = self
            .request(
                Method::POST,
                "/auth/signup",
                None,
                Some(serde_json::json!({ "email": email, "password": "recycle-me" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = session_from(&response);
        let json = body_json(response).await;
        let user_id = json["user_id"].as_str().unwrap().parse().unwrap();
        (cookie, user_id)
    }

    /// Signs up `email` and gives it `role` directly in the store.
    pub async fn signup_admin(&self, email: &str, role: AdminRole) -> (String, Uuid) {
        let (cookie, user_id) = self.signup(email).await;
        self.db.seed_admin(user_id, role, true);
        (cookie, user_id)
    }
}

/// The `session=...` pair out of a `Set-Cookie` header.
pub fn session_from(response: &Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .unwrap()
        .to_string()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn pickup_body() -> serde_json::Value {
    serde_json::json!({
        "address": "12 Greenway Avenue",
        "city": "Lagos",
        "postal_code": "100001",
        "notes": "Two old monitors"
    })
}

pub fn report_body() -> serde_json::Value {
    serde_json::json!({
        "description": "Broken televisions dumped by the canal",
        "location": "Canal Road bridge",
        "waste_type": "televisions"
    })
}

pub fn listing_body() -> serde_json::Value {
    serde_json::json!({
        "title": "Working laptop",
        "description": "Five year old laptop, battery holds two hours",
        "device_type": "laptop",
        "condition": "good",
        "price": 0.0,
        "is_free": true,
        "location": "Ikeja"
    })
}
