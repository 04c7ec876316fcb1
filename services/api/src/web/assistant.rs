//! services/api/src/web/assistant.rs
//!
//! The e-waste assistant chat and its saved conversations. Usable in offline mode.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use ewaste_core::domain::{AuthContext, ChatMessage, ChatRole, Conversation, StoredChatMessage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::adapters::fallback::guide_for;
use crate::web::{
    rest::{record_failure, ApiFailure},
    state::AppState,
};

#[derive(Deserialize, ToSchema)]
pub struct ChatTurn {
    /// `user` or `assistant`
    #[schema(value_type = String)]
    pub role: ChatRole,
    pub content: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
    /// Continue a saved conversation; its stored turns become the history.
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
    /// Earlier turns for a new conversation, oldest first.
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Serialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
    /// Set when the model call failed and the answer came from the built-in guides.
    pub fallback: bool,
    /// The conversation this exchange was saved to.
    pub conversation_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationResponse {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            title: c.title,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ChatMessageResponse {
    pub id: Uuid,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<StoredChatMessage> for ChatMessageResponse {
    fn from(m: StoredChatMessage) -> Self {
        Self {
            id: m.id,
            role: m.role.as_str().to_string(),
            content: m.content,
            created_at: m.created_at,
        }
    }
}

/// POST /assistant/chat - Ask the assistant
#[utoipa::path(
    post,
    path = "/assistant/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "The assistant's answer", body = ChatResponse),
        (status = 403, description = "The conversation belongs to someone else"),
        (status = 404, description = "No such conversation"),
        (status = 422, description = "Empty message")
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiFailure> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, "Message is empty".to_string()));
    }

    let (conversation, stored) = state
        .chat
        .open(auth.user_id, req.conversation_id, message)
        .await
        .map_err(|e| record_failure("Opening the conversation", e))?;
    let history: Vec<ChatMessage> = match req.conversation_id {
        Some(_) => stored,
        None => req
            .history
            .into_iter()
            .map(|turn| ChatMessage {
                role: turn.role,
                content: turn.content,
            })
            .collect(),
    };
    state.chat.append(&conversation, ChatRole::User, message).await;

    let (response, fallback) = match state.assistant.reply(&history, message).await {
        Ok(response) => (response, false),
        Err(e) => {
            warn!("Assistant unavailable for {}, answering from guides: {:?}", auth.user_id, e);
            (guide_for(message).to_string(), true)
        }
    };
    state
        .chat
        .append(&conversation, ChatRole::Assistant, &response)
        .await;

    Ok(Json(ChatResponse {
        response,
        fallback,
        conversation_id: conversation.id,
    }))
}

//=========================================================================================
// Saved Conversations
//=========================================================================================

/// GET /assistant/conversations - The caller's conversations, most recently active first
#[utoipa::path(
    get,
    path = "/assistant/conversations",
    responses((status = 200, description = "Saved conversations", body = [ConversationResponse]))
)]
pub async fn list_conversations_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ConversationResponse>>, ApiFailure> {
    let conversations = state
        .chat
        .list(auth.user_id)
        .await
        .map_err(|e| record_failure("Loading conversations", e))?;
    Ok(Json(conversations.into_iter().map(Into::into).collect()))
}

/// GET /assistant/conversations/{id}/messages - Every turn of one conversation, oldest first
#[utoipa::path(
    get,
    path = "/assistant/conversations/{id}/messages",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "The conversation's turns", body = [ChatMessageResponse]),
        (status = 403, description = "The conversation belongs to someone else"),
        (status = 404, description = "No such conversation")
    )
)]
pub async fn conversation_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessageResponse>>, ApiFailure> {
    let messages = state
        .chat
        .messages(auth.user_id, id)
        .await
        .map_err(|e| record_failure("Loading the conversation", e))?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

/// DELETE /assistant/conversations/{id} - Delete a conversation and its turns
#[utoipa::path(
    delete,
    path = "/assistant/conversations/{id}",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "The conversation belongs to someone else"),
        (status = 404, description = "No such conversation")
    )
)]
pub async fn delete_conversation_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    state
        .chat
        .delete(auth.user_id, id)
        .await
        .map_err(|e| record_failure("Deleting the conversation", e))?;
    Ok(StatusCode::NO_CONTENT)
}
