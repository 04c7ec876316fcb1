//! services/api/src/adapters/assistant_llm.rs
//!
//! This module contains the adapter for the e-waste assistant chat.
//! It implements the `AssistantService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use ewaste_core::{
    domain::{ChatMessage, ChatRole},
    ports::{AssistantService, PortError, PortResult},
};

const SYSTEM_PROMPT: &str = "You are an E-Waste Assistant. You help people dispose of and recycle electronics safely: which items count as e-waste, how to prepare devices (data wiping, removing batteries), where to take them, and why proper handling matters for the environment. Keep answers short and practical, use numbered steps where they help, and say so when a question is outside e-waste topics.";

/// Earlier turns beyond this are dropped before the request is built.
const MAX_HISTORY: usize = 20;

#[derive(Clone)]
pub struct OpenAiAssistantAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiAssistantAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

fn to_request_message(message: &ChatMessage) -> PortResult<ChatCompletionRequestMessage> {
    let built = match message.role {
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.as_str())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
        ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content.as_str())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    };
    Ok(built)
}

#[async_trait]
impl AssistantService for OpenAiAssistantAdapter {
    async fn reply(&self, history: &[ChatMessage], message: &str) -> PortResult<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];
        let skip = history.len().saturating_sub(MAX_HISTORY);
        for earlier in &history[skip..] {
            messages.push(to_request_message(earlier)?);
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(message)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Assistant LLM response contained no text content.".to_string())
            })
    }
}
