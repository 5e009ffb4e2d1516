//! Fireworks chat-completions client shared by the translator and annotator.
//!
//! One prompt in, one completion out, best effort: a single request with no
//! retries. Failures are returned to the caller, which logs and skips the
//! affected pipeline stage.

use crate::config::LanguageModelSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;
use zeroize::Zeroize;

/// Client for single-shot chat-completion requests
pub(crate) struct LlmClient {
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

/// Request body for the chat-completions API
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    max_tokens: u32,
    top_p: f32,
    top_k: u32,
    presence_penalty: f32,
    frequency_penalty: f32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

/// Message in the request
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response from the chat-completions API
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

/// Choice in the response
#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

/// Response message content
#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl LlmClient {
    /// Create a new client from settings and an API key
    pub(crate) fn new(settings: &LanguageModelSettings, api_key: String) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(LlmError::Network)?;

        Ok(Self {
            api_key,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            client,
        })
    }

    /// Issue a single completion request and return the first choice's text
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    pub(crate) async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request_body = ChatCompletionRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            top_p: 1.0,
            top_k: 40,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(LlmError::Network)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ServerError { status, message });
        }

        let chat_response: ChatCompletionResponse = response.json().await.map_err(|e| {
            LlmError::InvalidResponse(format!("Failed to parse completion response: {}", e))
        })?;

        Self::extract_text(&chat_response)
    }

    /// Extract text from the response structure
    fn extract_text(response: &ChatCompletionResponse) -> Result<String, LlmError> {
        response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .filter(|text| !text.is_empty())
            .ok_or(LlmError::EmptyResult)
    }
}

impl Drop for LlmClient {
    fn drop(&mut self) {
        // Clear API key from memory
        self.api_key.zeroize();
    }
}

/// Extract the first triple-backtick block from a completion.
/// The prompts ask the model to put its answer inside triple backticks so
/// surrounding commentary can be stripped.
pub(crate) fn extract_backtick_block(text: &str) -> Option<String> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let end = rest.find("```")?;
    let block = rest[..end].trim();
    if block.is_empty() {
        None
    } else {
        Some(block.to_string())
    }
}

/// Errors from the language-model service
#[derive(Debug, thiserror::Error)]
pub(crate) enum LlmError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Service returned no usable result")]
    EmptyResult,
}
