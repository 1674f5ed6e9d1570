//! Utterance classification
//!
//! Pattern matchers that pull fact slots out of free text. Matching works on
//! lower-cased input and tolerates a missing sentence terminator. The
//! patterns carry no vocabulary of their own: whatever follows "my" or
//! "your" becomes the key.

use regex::Regex;
use std::sync::LazyLock;

/// Auxiliary and modal verbs that may sit between a key and the `?`.
pub const AUXILIARY_WORDS: &[&str] = &[
    "is", "are", "was", "were", "do", "does", "did", "should", "could", "might", "may",
];

static RECALL_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    let aux = AUXILIARY_WORDS.join("|");
    Regex::new(&format!(r"\bmy\s+([^?.!]+?)(?:\s+(?:{aux}))?\s*[?.!]"))
        .expect("recall pattern is valid")
});

static FOLLOW_UP_ASK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\byour\s+([^?.!]+?)\s*\?\s*$").expect("follow-up pattern is valid")
});

static EXPLICIT_TEACH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bmy\s+([^?.!]+?)\s+is\s+([^?.!]+)").expect("teach pattern is valid")
});

/// Key and value pulled out of a "my X is Y" statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeachSlots {
    pub key: String,
    pub value: String,
}

/// Strategy for recognising memory intents in an utterance.
///
/// The resolver only depends on this trait, so the regex implementation
/// can be swapped for something smarter without touching branch logic.
pub trait UtteranceClassifier: Send + Sync {
    /// "...my <key> ...?" asked by the user
    fn match_recall_question(&self, text: &str) -> Option<String>;

    /// "...your <key>?" asked by the assistant on its previous turn
    fn match_follow_up_key(&self, prior_assistant_text: &str) -> Option<String>;

    /// "my <key> is <value>"
    fn match_teach(&self, text: &str) -> Option<TeachSlots>;
}

/// Regex-backed classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternClassifier;

impl UtteranceClassifier for PatternClassifier {
    fn match_recall_question(&self, text: &str) -> Option<String> {
        let mut lowered = text.trim().to_lowercase();
        if !lowered.ends_with(['?', '.', '!']) {
            lowered.push('?');
        }

        let caps = RECALL_QUESTION.captures(&lowered)?;
        normalize_key(caps.get(1)?.as_str())
    }

    fn match_follow_up_key(&self, prior_assistant_text: &str) -> Option<String> {
        let lowered = prior_assistant_text.to_lowercase();
        let caps = FOLLOW_UP_ASK.captures(&lowered)?;
        normalize_key(caps.get(1)?.as_str())
    }

    fn match_teach(&self, text: &str) -> Option<TeachSlots> {
        let caps = EXPLICIT_TEACH.captures(text.trim())?;
        let key = normalize_key(caps.get(1)?.as_str())?;
        let value = trim_value(caps.get(2)?.as_str());
        if value.is_empty() {
            return None;
        }
        Some(TeachSlots {
            key,
            value: value.to_string(),
        })
    }
}

fn normalize_key(raw: &str) -> Option<String> {
    let key = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

fn trim_value(raw: &str) -> &str {
    raw.trim()
        .trim_end_matches(|c: char| matches!(c, '?' | '.' | '!' | ',' | ';' | ':') || c.is_whitespace())
}
