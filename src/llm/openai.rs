//! `OpenAI` and `OpenAI`-compatible provider implementation
//!
//! Google, xAI, Groq and Perplexity all expose the chat completions wire
//! format, so one client covers them with a different base URL.

use super::sse::{decode_text_stream, SseStep};
use super::types::{LlmRequest, TextStream};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-compatible service implementation
pub struct OpenAIService {
    client: Client,
    api_key: String,
    api_name: String,
    base_url: String,
    model_id: String,
}

impl OpenAIService {
    pub fn new(
        api_key: String,
        model_id: &str,
        api_name: &str,
        base_url: &str,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            api_name: api_name.to_string(),
            base_url: base_url.to_string(),
            model_id: model_id.to_string(),
        })
    }

    fn translate_request(&self, request: &LlmRequest) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: request.system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| OpenAIMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }));

        OpenAIRequest {
            model: self.api_name.clone(),
            messages,
            max_tokens: request.max_tokens,
            stream: true,
        }
    }
}

/// Parse one chat-completions chunk
pub(crate) fn parse_chunk(data: &str) -> Result<SseStep, LlmError> {
    if data == "[DONE]" {
        return Ok(SseStep::Done);
    }

    let chunk: OpenAIChunk = serde_json::from_str(data)
        .map_err(|e| LlmError::unknown(format!("Failed to parse chunk: {e} - data: {data}")))?;

    if let Some(error) = chunk.error {
        return Err(LlmError::server_error(error.message));
    }

    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.and_then(|d| d.content))
        .collect();

    if text.is_empty() {
        Ok(SseStep::Skip)
    } else {
        Ok(SseStep::Text(text))
    }
}

#[async_trait]
impl LlmService for OpenAIService {
    async fn stream(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        let openai_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&openai_request)
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
        Ok(decode_text_stream(Box::pin(bytes), parse_chunk))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChunk {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    error: Option<OpenAIError>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    #[serde(default)]
    delta: Option<OpenAIDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAIDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmMessage;

    #[test]
    fn test_parse_text_delta() {
        let step =
            parse_chunk(r#"{"choices":[{"index":0,"delta":{"content":"Hi"},"finish_reason":null}]}"#)
                .unwrap();
        assert_eq!(step, SseStep::Text("Hi".to_string()));
    }

    #[test]
    fn test_parse_role_only_delta_is_skipped() {
        let step = parse_chunk(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(step, SseStep::Skip);
        let step = parse_chunk(r#"{"choices":[],"usage":{"prompt_tokens":3}}"#).unwrap();
        assert_eq!(step, SseStep::Skip);
    }

    #[test]
    fn test_parse_done_and_errors() {
        assert_eq!(parse_chunk("[DONE]").unwrap(), SseStep::Done);
        assert!(parse_chunk(r#"{"error":{"message":"overloaded"}}"#).is_err());
        assert!(parse_chunk("not json").is_err());
    }

    #[test]
    fn test_system_prompt_goes_first() {
        let service = OpenAIService::new(
            "key".to_string(),
            "chat-model",
            "gpt-4o",
            "http://localhost/v1/chat/completions",
        )
        .unwrap();
        let request = LlmRequest {
            system: "be nice".to_string(),
            messages: vec![LlmMessage::user("hello"), LlmMessage::assistant("hi")],
            max_tokens: None,
        };

        let body = serde_json::to_value(service.translate_request(&request)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["messages"][2]["role"], "assistant");
        assert!(body.get("max_tokens").is_none());
    }
}
