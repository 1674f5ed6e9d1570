//! One-shot drafting for support replies and knowledge-base answers
//!
//! Unlike chat turns these touch no stored state: the prompt is fixed, the
//! model's stream is collected in full and handed back as a single draft.

use crate::generation::{GenerationDelegate, GenerationRequest};
use crate::llm::{LlmError, LlmMessage};
use futures::TryStreamExt;
use std::sync::Arc;
use thiserror::Error;

const SUPPORT_REPLY_PROMPT: &str = "You are a concise, friendly customer-support agent. \
Reply in Markdown. Never reveal internal data.";

const KNOWLEDGE_ANSWER_PROMPT: &str =
    "You are an expert knowledge-base assistant. Reply concisely and helpfully.";

/// Token cap for support reply drafts
pub const REPLY_MAX_TOKENS: u32 = 400;
/// Token cap for knowledge-base answers
pub const ANSWER_MAX_TOKENS: u32 = 300;

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),
}

pub struct DraftService {
    delegate: Arc<dyn GenerationDelegate>,
}

impl DraftService {
    pub fn new(delegate: Arc<dyn GenerationDelegate>) -> Self {
        Self { delegate }
    }

    /// Draft a reply to a support request.
    pub async fn draft_reply(
        &self,
        subject: &str,
        description: Option<&str>,
        model: Option<String>,
    ) -> Result<String, DraftError> {
        let subject = required(subject, "subject")?;
        let body = description.unwrap_or_default().trim();
        let prompt = format!("Subject: {subject}\n\n{body}");

        self.collect(
            "support_reply",
            SUPPORT_REPLY_PROMPT,
            prompt,
            model,
            REPLY_MAX_TOKENS,
        )
        .await
    }

    /// Draft an answer to a knowledge-base question, optionally steered by
    /// extra instructions.
    pub async fn answer_question(
        &self,
        question: &str,
        instructions: Option<&str>,
        model: Option<String>,
    ) -> Result<String, DraftError> {
        let question = required(question, "question")?;
        let mut prompt = format!("Question: {question}");
        if let Some(extra) = instructions.map(str::trim).filter(|i| !i.is_empty()) {
            prompt.push_str("\n\nAdditional instructions: ");
            prompt.push_str(extra);
        }

        self.collect(
            "knowledge_answer",
            KNOWLEDGE_ANSWER_PROMPT,
            prompt,
            model,
            ANSWER_MAX_TOKENS,
        )
        .await
    }

    async fn collect(
        &self,
        kind: &'static str,
        system: &str,
        prompt: String,
        model: Option<String>,
        max_tokens: u32,
    ) -> Result<String, DraftError> {
        let stream = self
            .delegate
            .generate(GenerationRequest {
                system: system.to_string(),
                messages: vec![LlmMessage::user(prompt)],
                model,
                max_tokens: Some(max_tokens),
            })
            .await?;

        let draft: String = stream.try_collect().await.inspect_err(|e| {
            tracing::warn!(kind, error = %e, "Draft generation failed mid-stream");
        })?;
        tracing::info!(kind, chars = draft.len(), "Draft generated");
        Ok(draft)
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, DraftError> {
    let value = value.trim();
    if value.is_empty() {
        Err(DraftError::MissingField(field))
    } else {
        Ok(value)
    }
}
