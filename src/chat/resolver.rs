//! Pure turn resolution
//!
//! Given what is already known (facts, recent history) and the new user
//! message, pick exactly one response branch. No I/O happens here; the chat
//! service applies the branch's effects afterwards.
//!
//! Branches are tried in a fixed order:
//! 1. follow-up teach (assistant just asked "your X?")
//! 2. explicit teach ("my X is Y")
//! 3. recall ("what's my X?" with a known fact)
//! 4. delegate to the model

use super::classifier::UtteranceClassifier;
use crate::db::{Fact, Role, Turn};
use serde::Serialize;

/// Everything the resolver looks at for one turn
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    /// The new user utterance, already trimmed
    pub user_message: &'a str,
    /// History window, oldest first
    pub history: &'a [Turn],
    /// Snapshot of the owner's facts
    pub facts: &'a [Fact],
}

impl TurnContext<'_> {
    fn last_assistant_turn(&self) -> Option<&Turn> {
        self.history.iter().rev().find(|t| t.role == Role::Assistant)
    }

    fn fact(&self, key: &str) -> Option<&Fact> {
        self.facts.iter().find(|f| f.key == key)
    }
}

/// Outcome of resolving one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Branch {
    FollowUpTeach { key: String, value: String },
    ExplicitTeach { key: String, value: String },
    Recall { key: String, value: String },
    Delegate,
}

/// Branch discriminant for logging and API metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchKind {
    FollowUpTeach,
    ExplicitTeach,
    Recall,
    Delegate,
}

impl BranchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BranchKind::FollowUpTeach => "follow_up_teach",
            BranchKind::ExplicitTeach => "explicit_teach",
            BranchKind::Recall => "recall",
            BranchKind::Delegate => "delegate",
        }
    }
}

impl Branch {
    pub fn kind(&self) -> BranchKind {
        match self {
            Branch::FollowUpTeach { .. } => BranchKind::FollowUpTeach,
            Branch::ExplicitTeach { .. } => BranchKind::ExplicitTeach,
            Branch::Recall { .. } => BranchKind::Recall,
            Branch::Delegate => BranchKind::Delegate,
        }
    }

    /// Templated reply for short-circuit branches; `None` when delegating.
    pub fn reply(&self) -> Option<String> {
        match self {
            Branch::FollowUpTeach { key, value } => {
                Some(format!("Got it! I'll remember that your {key} is {value}."))
            }
            Branch::ExplicitTeach { key, value } => {
                Some(format!("Okay, I'll remember that your {key} is {value}."))
            }
            Branch::Recall { key, value } => Some(format!("Your {key} is {value}!")),
            Branch::Delegate => None,
        }
    }

    /// The fact this branch writes, if any. Recall only reads.
    pub fn fact_to_store(&self) -> Option<(&str, &str)> {
        match self {
            Branch::FollowUpTeach { key, value } | Branch::ExplicitTeach { key, value } => {
                Some((key.as_str(), value.as_str()))
            }
            Branch::Recall { .. } | Branch::Delegate => None,
        }
    }
}

/// Pick the branch for this turn.
pub fn resolve(ctx: &TurnContext<'_>, classifier: &dyn UtteranceClassifier) -> Branch {
    // 1. The assistant asked for something and the user answered it
    if !ctx.user_message.ends_with('?') {
        let asked = ctx
            .last_assistant_turn()
            .and_then(|turn| classifier.match_follow_up_key(&turn.content));
        if let Some(key) = asked {
            return Branch::FollowUpTeach {
                key,
                value: ctx.user_message.to_string(),
            };
        }
    }

    // 2. Explicit statement beats a question pattern that happens to match
    if let Some(slots) = classifier.match_teach(ctx.user_message) {
        return Branch::ExplicitTeach {
            key: slots.key,
            value: slots.value,
        };
    }

    // 3. Only answer from memory when the fact is actually known
    if let Some(key) = classifier.match_recall_question(ctx.user_message) {
        if let Some(fact) = ctx.fact(&key) {
            return Branch::Recall {
                key,
                value: fact.value.clone(),
            };
        }
    }

    Branch::Delegate
}
