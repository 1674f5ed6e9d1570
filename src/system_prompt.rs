//! System directive construction for delegated turns
//!
//! Embeds everything the assistant has learned about the owner so the model
//! can answer "my X" questions the templated recall path could not.

use crate::db::Fact;
use std::fmt::Write;

/// Base directive establishing the assistant's role
const BASE_PROMPT: &str = "You are Dark Alpha Capital's helpful assistant.";

/// Guidance appended after the fact block
const RECALL_GUIDANCE: &str = r#"When a user asks about "my X...", check facts first.
If a fact exists, answer from it directly.
Otherwise continue normally."#;

/// Marker used when nothing has been learned yet
const NO_FACTS: &str = "USER FACTS: (none yet)";

/// Build the system directive for an owner's facts.
///
/// Facts are rendered as an unordered bulleted block; callers must not rely
/// on any particular order.
pub fn build_system_directive(facts: &[Fact]) -> String {
    let mut prompt = String::from(BASE_PROMPT);
    prompt.push('\n');
    prompt.push_str(&render_fact_block(facts));
    prompt.push_str("\n\n");
    prompt.push_str(RECALL_GUIDANCE);
    prompt
}

fn render_fact_block(facts: &[Fact]) -> String {
    if facts.is_empty() {
        return NO_FACTS.to_string();
    }

    let mut block = String::from("USER FACTS:");
    for fact in facts {
        let _ = write!(block, "\n- {}: {}", fact.key, fact.value);
    }
    block
}
