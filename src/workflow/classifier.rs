//! Maps the request onto the closed category set.
//!
//! The model is asked for a single label. Whatever comes back is coerced;
//! anything unrecognizable (or a failed call) becomes `other`.

use async_trait::async_trait;
use tracing::warn;

use crate::workflow::agent::{Agent, ModelCaller, StepOutcome, StepOutput};
use crate::workflow::state::{AgentName, Category, DraftRequest, DraftState, StateUpdate};

pub struct IntentClassifier {
    model: ModelCaller,
}

impl IntentClassifier {
    pub fn new(model: ModelCaller) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Agent for IntentClassifier {
    fn name(&self) -> AgentName {
        AgentName::IntentClassifier
    }

    async fn run(&self, state: &DraftState, _request: &DraftRequest) -> StepOutcome<StepOutput> {
        let user = build_classifier_user_prompt(state);
        let response = match self
            .model
            .call(self.name(), build_classifier_system_prompt(), user)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Classification call failed, defaulting to other");
                return StepOutcome::degraded(
                    StepOutput::local(StateUpdate::Category(Category::Other)),
                    e.to_string(),
                );
            }
        };

        let output = StepOutput {
            update: StateUpdate::Category(Category::Other),
            usage: response.usage(),
        };
        match coerce_category(&response.content) {
            Some(category) => StepOutcome::Ok(StepOutput {
                update: StateUpdate::Category(category),
                ..output
            }),
            None => StepOutcome::degraded(
                output,
                format!("unrecognized category reply: {}", response.content.trim()),
            ),
        }
    }
}

fn build_classifier_system_prompt() -> String {
    let labels: Vec<String> = Category::ALL.iter().map(|c| c.to_string()).collect();
    format!(
        "You classify requests to write an email by their communicative goal.\n\
         Reply with exactly one label from this list and nothing else:\n{}",
        labels.join(", ")
    )
}

fn build_classifier_user_prompt(state: &DraftState) -> String {
    let intent = state.parsed_intent.as_ref();
    let body = intent
        .map(|i| i.body_intent.as_str())
        .filter(|b| !b.is_empty())
        .unwrap_or(state.raw_input.as_str());

    let mut prompt = format!("Request:\n{body}");
    if let Some(recipient) = intent.and_then(|i| i.recipient.as_deref()) {
        prompt.push_str(&format!("\n\nRecipient: {recipient}"));
    }
    prompt
}

/// Compact forms (lowercase, alphanumerics only) accepted for each category.
fn category_for_word(word: &str) -> Option<Category> {
    match word {
        "followup" => Some(Category::FollowUp),
        "thankyou" | "thanks" => Some(Category::ThankYou),
        "request" => Some(Category::Request),
        "introduction" | "intro" => Some(Category::Introduction),
        "other" => Some(Category::Other),
        _ => None,
    }
}

/// Coerce a free-form reply onto a category.
///
/// The whole reply is tried first (so `Follow-Up.` or `THANK_YOU` match),
/// then each word and adjacent word pair in order; the earliest mention wins.
pub fn coerce_category(reply: &str) -> Option<Category> {
    let lowered = reply.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if let Some(category) = category_for_word(&words.concat()) {
        return Some(category);
    }

    for (i, word) in words.iter().enumerate() {
        if let Some(next) = words.get(i + 1)
            && let Some(category) = category_for_word(&format!("{word}{next}"))
        {
            return Some(category);
        }
        if let Some(category) = category_for_word(word) {
            return Some(category);
        }
    }
    None
}
