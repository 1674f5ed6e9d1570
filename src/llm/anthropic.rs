//! Anthropic Claude provider implementation

use super::sse::{decode_text_stream, SseStep};
use super::types::{LlmRequest, TextStream};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic service implementation
pub struct AnthropicService {
    client: Client,
    api_key: String,
    api_name: String,
    model_id: String,
}

impl AnthropicService {
    pub fn new(api_key: String, model_id: &str, api_name: &str) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            api_name: api_name.to_string(),
            model_id: model_id.to_string(),
        })
    }

    fn translate_request(&self, request: &LlmRequest) -> AnthropicRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| AnthropicMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect();

        AnthropicRequest {
            model: self.api_name.clone(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: (!request.system.is_empty()).then(|| request.system.clone()),
            messages,
            stream: true,
        }
    }
}

/// Parse one Messages API stream event
pub(crate) fn parse_event(data: &str) -> Result<SseStep, LlmError> {
    let event: AnthropicEvent = serde_json::from_str(data)
        .map_err(|e| LlmError::unknown(format!("Failed to parse event: {e} - data: {data}")))?;

    match event {
        AnthropicEvent::ContentBlockDelta {
            delta: AnthropicDelta::TextDelta { text },
        } => Ok(SseStep::Text(text)),
        AnthropicEvent::MessageStop => Ok(SseStep::Done),
        AnthropicEvent::Error { error } => {
            if error.r#type == "overloaded_error" || error.r#type == "api_error" {
                Err(LlmError::server_error(error.message))
            } else {
                Err(LlmError::unknown(error.message))
            }
        }
        AnthropicEvent::ContentBlockDelta {
            delta: AnthropicDelta::Other,
        }
        | AnthropicEvent::Other => Ok(SseStep::Skip),
    }
}

#[async_trait]
impl LlmService for AnthropicService {
    async fn stream(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        let anthropic_request = self.translate_request(request);

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&anthropic_request)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;
            return Err(LlmError::from_status(status, &body));
        }

        let bytes = response
            .bytes_stream()
            .map_err(|e| LlmError::network(format!("Stream interrupted: {e}")));
        Ok(decode_text_stream(Box::pin(bytes), parse_event))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicEvent {
    ContentBlockDelta {
        delta: AnthropicDelta,
    },
    MessageStop,
    Error {
        error: AnthropicErrorBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    r#type: String,
    message: String,
}
