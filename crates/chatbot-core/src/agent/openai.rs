//! OpenAI Chat Completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LanguageModel;
use crate::domain::error::AgentError;
use crate::domain::snapshot::{ModelSnapshot, SNAPSHOT_SCHEMA_VERSION};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Chat model reached over the OpenAI HTTP API.
///
/// Sampling temperature is fixed at 0 so answers are as repeatable as the
/// provider allows.
#[derive(Clone)]
pub struct OpenAiChatModel {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    request_timeout: Option<Duration>,
}

impl std::fmt::Debug for OpenAiChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatModel")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl OpenAiChatModel {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            request_timeout: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    fn build_request(&self, prompt: &str, stop: &[&str]) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stop: stop.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, prompt: &str, stop: &[&str]) -> Result<String, AgentError> {
        let body = self.build_request(prompt, stop);
        debug!(model = %self.model, prompt_chars = prompt.len(), "calling chat completions");

        let mut request = self
            .client
            .post(BASE_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|err| AgentError::Model(format!("OpenAI API request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read OpenAI error body".to_string());
            return Err(map_http_error(status, &body_text));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| AgentError::Model(format!("Failed to parse OpenAI response: {err}")))?;

        extract_text_response(parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            provider: "openai".to_string(),
            model_name: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            request_timeout_secs: self.request_timeout.map(|t| t.as_secs()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text_response(response: ChatCompletionResponse) -> Result<String, AgentError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AgentError::Model("OpenAI API returned no content in the response".into()))
}

fn map_http_error(status: StatusCode, body: &str) -> AgentError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or_else(|_| body.to_string());
    AgentError::Model(format!("OpenAI API returned {}: {message}", status.as_u16()))
}
