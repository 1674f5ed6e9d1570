//! Property-based tests for classification and the history window

use super::classifier::{PatternClassifier, UtteranceClassifier, AUXILIARY_WORDS};
use super::resolver::{resolve, Branch, TurnContext};
use crate::db::{Database, NewTurn};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_word() -> impl Strategy<Value = String> {
    "[a-z]{3,8}".prop_filter("not a verb the patterns key on", |w| {
        !AUXILIARY_WORDS.contains(&w.as_str()) && w != "my" && w != "your"
    })
}

fn arb_key() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_word(), 1..=3).prop_map(|words| words.join(" "))
}

fn arb_value() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-zA-Z0-9]{1,10}", 1..=3).prop_map(|words| words.join(" "))
}

fn arb_aux() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        prop::sample::select(AUXILIARY_WORDS).prop_map(|w| format!(" {w}")),
    ]
}

fn arb_terminator() -> impl Strategy<Value = &'static str> {
    prop::sample::select(&["", ".", "!", "?"][..])
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_classifier_never_panics(text in any::<String>()) {
        let c = PatternClassifier;
        let _ = c.match_recall_question(&text);
        let _ = c.match_follow_up_key(&text);
        let _ = c.match_teach(&text);
    }

    #[test]
    fn prop_teach_extracts_slots(key in arb_key(), value in arb_value(), end in arb_terminator()) {
        let text = format!("my {key} is {value}{end}");
        let slots = PatternClassifier.match_teach(&text).unwrap();
        prop_assert_eq!(slots.key, key);
        prop_assert_eq!(slots.value, value);
    }

    #[test]
    fn prop_teach_key_is_lowercased(key in arb_key(), value in arb_value()) {
        let text = format!("My {} is {value}", key.to_uppercase());
        let slots = PatternClassifier.match_teach(&text).unwrap();
        prop_assert_eq!(slots.key, key);
    }

    #[test]
    fn prop_recall_extracts_key(key in arb_key(), aux in arb_aux(), end in arb_terminator()) {
        let text = format!("What's my {key}{aux}{end}");
        prop_assert_eq!(PatternClassifier.match_recall_question(&text), Some(key));
    }

    #[test]
    fn prop_follow_up_extracts_key(key in arb_key()) {
        let text = format!("Great. What's your {key}?");
        prop_assert_eq!(PatternClassifier.match_follow_up_key(&text), Some(key));
    }

    #[test]
    fn prop_statement_is_never_a_follow_up_ask(key in arb_key()) {
        let text = format!("I like your {key}.");
        prop_assert_eq!(PatternClassifier.match_follow_up_key(&text), None);
    }

    #[test]
    fn prop_recall_without_fact_delegates(key in arb_key()) {
        let text = format!("what's my {key}?");
        let ctx = TurnContext { user_message: &text, history: &[], facts: &[] };
        prop_assert_eq!(resolve(&ctx, &PatternClassifier), Branch::Delegate);
    }

    #[test]
    fn prop_history_window_is_bounded_and_ordered(
        total in 0usize..30,
        limit in 1usize..25,
    ) {
        let db = Database::open_in_memory().unwrap();
        for i in 0..total {
            db.append_turns(&[NewTurn::user("c1", "owner", format!("turn {i}"))]).unwrap();
        }
        // Another owner's turns never leak in
        db.append_turns(&[NewTurn::user("c2", "other", "noise")]).unwrap();

        let window = db.recent_turns("owner", limit).unwrap();
        prop_assert_eq!(window.len(), total.min(limit));

        for pair in window.windows(2) {
            prop_assert!(pair[0].created_at <= pair[1].created_at);
            prop_assert!(pair[0].id < pair[1].id);
        }

        let expected: Vec<String> = (total.saturating_sub(limit)..total)
            .map(|i| format!("turn {i}"))
            .collect();
        let got: Vec<String> = window.into_iter().map(|t| t.content).collect();
        prop_assert_eq!(got, expected);
    }
}
