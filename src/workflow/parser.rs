//! Intent parser — pulls directives out of free text. No LLM.
//!
//! Recognized directives:
//! - line-oriented `key: value` for `to` / `recipient`, `tone`, `subject`
//! - an inline `tone: <value>` anywhere in a line
//!
//! Directives are removed; whatever narrative remains becomes `body_intent`.
//! When a directive repeats, the last one wins.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::workflow::agent::{Agent, StepOutcome, StepOutput};
use crate::workflow::state::{
    AgentName, DraftRequest, DraftState, ParsedIntent, StateUpdate, Tone,
};

static LINE_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(to|recipient|tone|subject)\s*:\s*(.*?)\s*$").expect("valid regex")
});

static INLINE_TONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btone\s*:\s*([a-z][a-z-]*)").expect("valid regex"));

static RUNS_OF_BLANKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

/// Parse raw user text into structured intent. Never fails.
pub fn parse_intent(raw: &str) -> ParsedIntent {
    let mut intent = ParsedIntent::default();
    let mut narrative: Vec<String> = Vec::new();

    for line in raw.lines() {
        let mut line = line.to_string();

        // Inline tone first, so `to: Alice tone: formal` yields both.
        if let Some(caps) = INLINE_TONE.captures(&line)
            && !LINE_DIRECTIVE
                .captures(&line)
                .is_some_and(|d| d[1].eq_ignore_ascii_case("subject"))
        {
            let value = caps[1].to_string();
            intent.tone_hint = value.parse::<Tone>().ok().or(intent.tone_hint);
            line = INLINE_TONE.replace_all(&line, "").into_owned();
        }

        if let Some(caps) = LINE_DIRECTIVE.captures(&line) {
            let key = caps[1].to_lowercase();
            let value = clean_value(&caps[2]);
            match key.as_str() {
                "to" | "recipient" if !value.is_empty() => intent.recipient = Some(value),
                "tone" => {
                    if let Ok(tone) = value.parse::<Tone>() {
                        intent.tone_hint = Some(tone);
                    }
                }
                "subject" if !value.is_empty() => intent.subject_hint = Some(value),
                _ => {}
            }
            continue;
        }

        let line = RUNS_OF_BLANKS.replace_all(line.trim(), " ").into_owned();
        if !line.is_empty() {
            narrative.push(line);
        }
    }

    intent.body_intent = if narrative.is_empty() {
        raw.trim().to_string()
    } else {
        narrative.join("\n")
    };

    debug!(
        recipient = intent.recipient.as_deref().unwrap_or("-"),
        tone_hint = ?intent.tone_hint,
        "Parsed intent"
    );
    intent
}

/// Trim whitespace and trailing sentence punctuation from a directive value.
fn clean_value(value: &str) -> String {
    value
        .trim()
        .trim_end_matches(['.', ',', ';'])
        .trim()
        .to_string()
}

/// Agent wrapper around [`parse_intent`].
pub struct IntentParser;

#[async_trait]
impl Agent for IntentParser {
    fn name(&self) -> AgentName {
        AgentName::IntentParser
    }

    async fn run(&self, state: &DraftState, _request: &DraftRequest) -> StepOutcome<StepOutput> {
        StepOutcome::Ok(StepOutput::local(StateUpdate::Intent(parse_intent(
            &state.raw_input,
        ))))
    }
}
