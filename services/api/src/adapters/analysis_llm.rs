//! services/api/src/adapters/analysis_llm.rs
//!
//! This module contains the adapter for the dumping-site analysis LLM.
//! It implements the `DumpingAnalysisService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use ewaste_core::{
    domain::{DumpingAnalysis, Severity},
    ports::{DumpingAnalysisService, PortError, PortResult},
};
use serde::Deserialize;
use tracing::warn;

const SYSTEM_PROMPT: &str = "You are an environmental expert specializing in e-waste management and hazardous material assessment. Always respond in valid JSON format.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `DumpingAnalysisService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiAnalysisAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiAnalysisAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

fn analysis_prompt(description: &str, waste_type: &str, location: &str) -> String {
    format!(
        "You are an environmental expert analyzing illegal e-waste dumping sites.\n\n\
         Site Information:\n\
         - Location: {}\n\
         - Waste Type: {}\n\
         - Description: {}\n\n\
         Please analyze this dumping site and provide:\n\
         1. A severity level (low, medium, high, or critical)\n\
         2. Detailed recommendations for handling and cleanup\n\n\
         Return your response in this exact JSON format:\n\
         {{\n  \"severity\": \"low|medium|high|critical\",\n  \"recommendations\": \"detailed recommendations text\"\n}}",
        location, waste_type, description
    )
}

#[derive(Deserialize)]
struct RawAnalysis {
    severity: String,
    recommendations: String,
}

/// Reads the model's answer. Output that is not the requested JSON is kept
/// as the recommendation text with `medium` severity.
pub fn parse_analysis(content: &str) -> DumpingAnalysis {
    let trimmed = content.trim();
    // Models like to wrap JSON in a ```json fence.
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    match serde_json::from_str::<RawAnalysis>(body) {
        Ok(raw) => DumpingAnalysis {
            severity: Severity::parse(&raw.severity).unwrap_or(Severity::Medium),
            recommendations: raw.recommendations,
        },
        Err(e) => {
            warn!("Analysis response was not valid JSON: {}", e);
            DumpingAnalysis {
                severity: Severity::Medium,
                recommendations: trimmed.to_string(),
            }
        }
    }
}

//=========================================================================================
// `DumpingAnalysisService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DumpingAnalysisService for OpenAiAnalysisAdapter {
    async fn analyze(
        &self,
        description: &str,
        waste_type: &str,
        location: &str,
    ) -> PortResult<DumpingAnalysis> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(analysis_prompt(description, waste_type, location))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.7)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Analysis LLM response contained no text content.".to_string())
            })?;

        Ok(parse_analysis(&content))
    }
}
