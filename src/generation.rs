//! Generation delegate: the model-backed fallback for turns the recall
//! engine cannot answer from stored facts.

use crate::llm::{LlmError, LlmMessage, LlmRequest, ModelRegistry, TextStream};
use async_trait::async_trait;
use std::sync::Arc;

/// Everything a delegate needs to produce a reply
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// System directive with the owner's facts embedded
    pub system: String,
    /// Stored history followed by the incoming messages
    pub messages: Vec<LlmMessage>,
    /// Requested model id; `None` means the registry default
    pub model: Option<String>,
    /// Reply length cap; `None` leaves it to the provider
    pub max_tokens: Option<u32>,
}

/// Produces a streamed reply for a turn
#[async_trait]
pub trait GenerationDelegate: Send + Sync {
    /// Open the reply stream. An `Err` means nothing was generated.
    async fn generate(&self, request: GenerationRequest) -> Result<TextStream, LlmError>;
}

#[async_trait]
impl<T: GenerationDelegate + ?Sized> GenerationDelegate for Arc<T> {
    async fn generate(&self, request: GenerationRequest) -> Result<TextStream, LlmError> {
        (**self).generate(request).await
    }
}

/// Delegate backed by the configured model registry
pub struct RegistryDelegate {
    registry: Arc<ModelRegistry>,
}

impl RegistryDelegate {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl GenerationDelegate for RegistryDelegate {
    async fn generate(&self, request: GenerationRequest) -> Result<TextStream, LlmError> {
        let llm = self.registry.resolve(request.model.as_deref()).ok_or_else(|| {
            LlmError::no_model("No LLM available: set a provider API key")
        })?;

        tracing::debug!(
            model = %llm.model_id(),
            messages = request.messages.len(),
            "Delegating turn to model"
        );

        llm.stream(&LlmRequest {
            system: request.system,
            messages: request.messages,
            max_tokens: request.max_tokens,
        })
        .await
    }
}
