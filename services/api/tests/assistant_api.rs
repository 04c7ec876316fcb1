//! HTTP-level tests for the assistant chat.

mod common;

use std::sync::{Arc, Mutex};

use api_lib::adapters::fallback::guide_for;
use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use common::{body_json, TestApp};
use ewaste_core::domain::ChatMessage;
use ewaste_core::memory::CannedAnalysis;
use ewaste_core::ports::{AssistantService, PortError, PortResult};
use serde_json::json;

struct DownAssistant;

/// Remembers the history it was given on each call.
#[derive(Default)]
struct RecordingAssistant {
    histories: Mutex<Vec<Vec<ChatMessage>>>,
}

#[async_trait]
impl AssistantService for RecordingAssistant {
    async fn reply(&self, history: &[ChatMessage], message: &str) -> PortResult<String> {
        self.histories.lock().unwrap().push(history.to_vec());
        Ok(format!("About {message}"))
    }
}

#[async_trait]
impl AssistantService for DownAssistant {
    async fn reply(&self, _: &[ChatMessage], _: &str) -> PortResult<String> {
        Err(PortError::Unexpected("model unavailable".to_string()))
    }
}

#[tokio::test]
async fn the_assistant_answers_with_history() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("ada@example.com").await;

    let response = app
        .post(
            "/assistant/chat",
            &cookie,
            json!({
                "message": "And the charger?",
                "history": [
                    { "role": "user", "content": "How do I recycle my phone?" },
                    { "role": "assistant", "content": "Wipe it first." }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["response"], "Take it to a certified recycler.");
    assert_eq!(json["fallback"], false);
    assert!(json["conversation_id"].is_string());
}

#[tokio::test]
async fn the_assistant_works_offline() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("ada@example.com").await;
    app.post_empty("/offline/start", &cookie).await;

    let response = app
        .post("/assistant/chat", &cookie, json!({ "message": "Where can I recycle?" }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn a_failed_model_call_falls_back_to_the_guides() {
    let app = TestApp::with_services(
        Arc::new(CannedAnalysis::failing()),
        Arc::new(DownAssistant),
    );
    let (cookie, _) = app.signup("ada@example.com").await;

    let response = app
        .post("/assistant/chat", &cookie, json!({ "message": "My old laptop battery" }))
        .await;
    let json = body_json(response).await;
    assert_eq!(json["fallback"], true);
    assert_eq!(json["response"], guide_for("My old laptop battery"));
}

#[tokio::test]
async fn empty_messages_are_rejected() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("ada@example.com").await;

    let response = app.post("/assistant/chat", &cookie, json!({ "message": "   " })).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn conversations_are_saved_and_continued() {
    let assistant = Arc::new(RecordingAssistant::default());
    let app = TestApp::with_services(Arc::new(CannedAnalysis::failing()), assistant.clone());
    let (cookie, _) = app.signup("ada@example.com").await;

    let first = body_json(
        app.post("/assistant/chat", &cookie, json!({ "message": "Old phone batteries" }))
            .await,
    )
    .await;
    let id = first["conversation_id"].as_str().unwrap().to_string();

    let second = body_json(
        app.post(
            "/assistant/chat",
            &cookie,
            json!({ "message": "And chargers?", "conversation_id": id }),
        )
        .await,
    )
    .await;
    assert_eq!(second["conversation_id"], id);

    // The second call replays the stored first exchange.
    let histories = assistant.histories.lock().unwrap().clone();
    assert!(histories[0].is_empty());
    assert_eq!(
        histories[1].iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
        vec!["Old phone batteries", "About Old phone batteries"]
    );

    let list = body_json(app.get("/assistant/conversations", &cookie).await).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["title"], "Old phone batteries");

    let messages = body_json(
        app.get(&format!("/assistant/conversations/{id}/messages"), &cookie)
            .await,
    )
    .await;
    let roles: Vec<_> = messages.as_array().unwrap().iter().map(|m| m["role"].clone()).collect();
    assert_eq!(roles, vec!["user", "assistant", "user", "assistant"]);
}

#[tokio::test]
async fn conversations_are_private_and_deletable() {
    let app = TestApp::new();
    let (ada, _) = app.signup("ada@example.com").await;
    let (bob, _) = app.signup("bob@example.com").await;
    let chat = body_json(app.post("/assistant/chat", &ada, json!({ "message": "Printers" })).await).await;
    let id = chat["conversation_id"].as_str().unwrap().to_string();
    let uri = format!("/assistant/conversations/{id}");

    let peek = app.get(&format!("{uri}/messages"), &bob).await;
    assert_eq!(peek.status(), StatusCode::FORBIDDEN);
    let hijack = app
        .post("/assistant/chat", &bob, json!({ "message": "Mine now", "conversation_id": id }))
        .await;
    assert_eq!(hijack.status(), StatusCode::FORBIDDEN);
    let removed = app.request(Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(removed.status(), StatusCode::FORBIDDEN);

    let removed = app.request(Method::DELETE, &uri, Some(&ada), None).await;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);
    let list = body_json(app.get("/assistant/conversations", &ada).await).await;
    assert!(list.as_array().unwrap().is_empty());
    let gone = app.get(&format!("{uri}/messages"), &ada).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}
