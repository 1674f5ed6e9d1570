//! Model definitions for every supported provider
//!
//! The ids are the ones the model selector shows. Each id maps to a vendor
//! API name, so several ids may share one upstream model.

use super::{AnthropicService, LlmError, LlmService, OpenAIService};
use std::sync::Arc;

/// LLM provider enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAI,
    Google,
    Anthropic,
    Xai,
    Groq,
    Perplexity,
}

impl Provider {
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::OpenAI => "OpenAI",
            Provider::Google => "Google",
            Provider::Anthropic => "Anthropic",
            Provider::Xai => "xAI",
            Provider::Groq => "Groq",
            Provider::Perplexity => "Perplexity",
        }
    }

    /// Environment variable holding this provider's API key
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Google => "GEMINI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Xai => "XAI_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
            Provider::Perplexity => "PPLX_API_KEY",
        }
    }

    /// Chat completions endpoint for OpenAI-compatible providers
    fn base_url(self) -> Option<&'static str> {
        match self {
            Provider::OpenAI => Some("https://api.openai.com/v1/chat/completions"),
            Provider::Google => {
                Some("https://generativelanguage.googleapis.com/v1beta/openai/chat/completions")
            }
            Provider::Xai => Some("https://api.x.ai/v1/chat/completions"),
            Provider::Groq => Some("https://api.groq.com/openai/v1/chat/completions"),
            Provider::Perplexity => Some("https://api.perplexity.ai/chat/completions"),
            Provider::Anthropic => None,
        }
    }
}

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// User-facing model ID (e.g., "chat-model")
    pub id: &'static str,
    pub provider: Provider,
    /// Name sent to the vendor API
    pub api_name: &'static str,
    pub description: &'static str,
    /// Context window size in tokens
    pub context_window: usize,
}

impl ModelDef {
    /// Build the streaming service for this model
    pub fn create_service(&self, api_key: &str) -> Result<Arc<dyn LlmService>, LlmError> {
        if api_key.is_empty() {
            return Err(LlmError::auth(format!(
                "{} requires {}",
                self.id,
                self.provider.api_key_env_var()
            )));
        }

        match self.provider.base_url() {
            Some(base_url) => Ok(Arc::new(OpenAIService::new(
                api_key.to_string(),
                self.id,
                self.api_name,
                base_url,
            )?)),
            None => Ok(Arc::new(AnthropicService::new(
                api_key.to_string(),
                self.id,
                self.api_name,
            )?)),
        }
    }
}

/// Model id used when a request names none
pub const DEFAULT_MODEL_ID: &str = "chat-model";

/// Get all available model definitions
pub fn all_models() -> &'static [ModelDef] {
    &[
        // OpenAI
        ModelDef {
            id: "chat-model",
            provider: Provider::OpenAI,
            api_name: "gpt-4o",
            description: "GPT-4o (fast, multimodal default)",
            context_window: 128_000,
        },
        ModelDef {
            id: "gpt-4o",
            provider: Provider::OpenAI,
            api_name: "gpt-4o",
            description: "GPT-4o",
            context_window: 128_000,
        },
        ModelDef {
            id: "gpt-4o-mini",
            provider: Provider::OpenAI,
            api_name: "gpt-4o-mini",
            description: "GPT-4o mini (cheap, fast)",
            context_window: 128_000,
        },
        ModelDef {
            id: "gpt-4.1",
            provider: Provider::OpenAI,
            api_name: "gpt-4.1",
            description: "GPT-4.1 (1M-token context)",
            context_window: 1_000_000,
        },
        ModelDef {
            id: "gpt-o3",
            provider: Provider::OpenAI,
            api_name: "o3",
            description: "o3 (reasoning)",
            context_window: 200_000,
        },
        ModelDef {
            id: "gpt-o4-mini",
            provider: Provider::OpenAI,
            api_name: "o4-mini",
            description: "o4-mini (smallest o-series)",
            context_window: 200_000,
        },
        // Google, through its OpenAI-compatible endpoint
        ModelDef {
            id: "gemini-1.5-flash",
            provider: Provider::Google,
            api_name: "gemini-1.5-flash",
            description: "Gemini 1.5 Flash",
            context_window: 1_000_000,
        },
        ModelDef {
            id: "gemini-2.5-pro",
            provider: Provider::Google,
            api_name: "gemini-2.5-pro",
            description: "Gemini 2.5 Pro (next-gen multimodal)",
            context_window: 1_000_000,
        },
        // xAI
        ModelDef {
            id: "grok-3",
            provider: Provider::Xai,
            api_name: "grok-3",
            description: "Grok-3",
            context_window: 131_072,
        },
        // Anthropic
        ModelDef {
            id: "claude-4-opus",
            provider: Provider::Anthropic,
            api_name: "claude-opus-4-20250514",
            description: "Claude 4 Opus (largest Claude 4)",
            context_window: 200_000,
        },
        ModelDef {
            id: "claude-4-sonnet",
            provider: Provider::Anthropic,
            api_name: "claude-sonnet-4-20250514",
            description: "Claude 4 Sonnet (mid-tier Claude 4)",
            context_window: 200_000,
        },
        // Perplexity
        ModelDef {
            id: "pplx-sonar",
            provider: Provider::Perplexity,
            api_name: "sonar-pro",
            description: "Perplexity Sonar Pro (web-grounded)",
            context_window: 200_000,
        },
        // Meta, hosted by Groq
        ModelDef {
            id: "llama4-scout",
            provider: Provider::Groq,
            api_name: "meta-llama/llama-4-scout-17b-16e-instruct",
            description: "Llama-4 Scout (open weights)",
            context_window: 131_072,
        },
        ModelDef {
            id: "llama4-maverick",
            provider: Provider::Groq,
            api_name: "meta-llama/llama-4-maverick-17b-128e-instruct",
            description: "Llama-4 Maverick (flagship Meta model)",
            context_window: 131_072,
        },
    ]
}
