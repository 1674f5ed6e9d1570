//! Model registry for managing available LLM providers

use super::models::DEFAULT_MODEL_ID;
use super::{all_models, LlmService, LoggingService, ModelDef, Provider};
use std::collections::HashMap;
use std::sync::Arc;

/// API keys and defaults for the LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub xai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub pplx_api_key: Option<String>,
    /// Default model ID
    pub default_model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            openai_api_key: var(Provider::OpenAI.api_key_env_var()),
            gemini_api_key: var(Provider::Google.api_key_env_var()),
            anthropic_api_key: var(Provider::Anthropic.api_key_env_var()),
            xai_api_key: var(Provider::Xai.api_key_env_var()),
            groq_api_key: var(Provider::Groq.api_key_env_var()),
            pplx_api_key: var(Provider::Perplexity.api_key_env_var()),
            default_model: var("DEFAULT_MODEL"),
        }
    }

    fn api_key(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Google => self.gemini_api_key.as_deref(),
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
            Provider::Xai => self.xai_api_key.as_deref(),
            Provider::Groq => self.groq_api_key.as_deref(),
            Provider::Perplexity => self.pplx_api_key.as_deref(),
        }
    }
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_model: String,
}

impl ModelRegistry {
    pub fn new(config: &LlmConfig) -> Self {
        let mut services: HashMap<String, Arc<dyn LlmService>> = HashMap::new();

        for model_def in all_models() {
            if let Some(service) = Self::try_create_model(model_def, config) {
                services.insert(model_def.id.to_string(), service);
            }
        }

        let default_model = config
            .default_model
            .clone()
            .filter(|id| services.contains_key(id))
            .or_else(|| {
                if services.contains_key(DEFAULT_MODEL_ID) {
                    Some(DEFAULT_MODEL_ID.to_string())
                } else {
                    // First available model in selector order
                    all_models()
                        .iter()
                        .find(|m| services.contains_key(m.id))
                        .map(|m| m.id.to_string())
                }
            })
            .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());

        Self {
            services,
            default_model,
        }
    }

    /// Build a registry from prepared services
    #[allow(dead_code)] // Used in tests
    pub fn from_services(
        services: HashMap<String, Arc<dyn LlmService>>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            services,
            default_model: default_model.into(),
        }
    }

    fn try_create_model(model_def: &ModelDef, config: &LlmConfig) -> Option<Arc<dyn LlmService>> {
        let api_key = config.api_key(model_def.provider)?;

        match model_def.create_service(api_key) {
            Ok(service) => Some(Arc::new(LoggingService::new(service))),
            Err(e) => {
                tracing::warn!(model = model_def.id, error = %e, "Skipping model");
                None
            }
        }
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// Get the default model
    pub fn default(&self) -> Option<Arc<dyn LlmService>> {
        self.get(&self.default_model)
    }

    /// Look up the requested model, falling back to the default for
    /// unknown or missing ids
    pub fn resolve(&self, model_id: Option<&str>) -> Option<Arc<dyn LlmService>> {
        match model_id.and_then(|id| self.get(id)) {
            Some(service) => Some(service),
            None => {
                if let Some(id) = model_id {
                    tracing::debug!(
                        requested = id,
                        default = %self.default_model,
                        "Unknown model, using default"
                    );
                }
                self.default()
            }
        }
    }

    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    /// List all available model IDs
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<_> = self.services.keys().cloned().collect();
        models.sort();
        models
    }

    /// Metadata for every registered model, in selector order
    pub fn available_model_info(&self) -> Vec<crate::api::ModelInfo> {
        all_models()
            .iter()
            .filter(|def| self.services.contains_key(def.id))
            .map(|def| crate::api::ModelInfo {
                id: def.id.to_string(),
                provider: def.provider.display_name().to_string(),
                description: def.description.to_string(),
                context_window: def.context_window,
            })
            .collect()
    }

    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }
}
