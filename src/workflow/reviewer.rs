//! Reviews the personalized draft and lists concrete fixes.
//!
//! An unparseable reply or failed call yields `accept` with no feedback,
//! marked degraded.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::llm::extract::extract_json_object;
use crate::profile::SenderProfile;
use crate::workflow::agent::{Agent, ModelCaller, StepOutcome, StepOutput};
use crate::workflow::state::{
    AgentName, Category, DraftRequest, DraftState, Review, StateUpdate, Verdict,
};
use crate::workflow::tone::DEFAULT_TONE;

pub struct Reviewer {
    model: ModelCaller,
    max_feedback_items: usize,
}

impl Reviewer {
    pub fn new(model: ModelCaller, max_feedback_items: usize) -> Self {
        Self {
            model,
            max_feedback_items,
        }
    }
}

#[async_trait]
impl Agent for Reviewer {
    fn name(&self) -> AgentName {
        AgentName::Reviewer
    }

    async fn run(&self, state: &DraftState, request: &DraftRequest) -> StepOutcome<StepOutput> {
        let system = build_reviewer_system_prompt(self.max_feedback_items);
        let user = build_reviewer_user_prompt(state, &request.profile);
        let response = match self
            .model
            .call(self.name(), system, user)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Review call failed, accepting draft");
                return StepOutcome::degraded(
                    StepOutput::local(StateUpdate::Review(Review::accept())),
                    e.to_string(),
                );
            }
        };

        match parse_review(&response.content, self.max_feedback_items) {
            Ok(review) => StepOutcome::Ok(StepOutput {
                update: StateUpdate::Review(review),
                usage: response.usage(),
            }),
            Err(reason) => {
                warn!(reason = %reason, "Unparseable review, accepting draft");
                StepOutcome::degraded(
                    StepOutput {
                        update: StateUpdate::Review(Review::accept()),
                        usage: response.usage(),
                    },
                    reason,
                )
            }
        }
    }
}

fn build_reviewer_system_prompt(max_items: usize) -> String {
    format!(
        r#"You review email drafts before they are sent.

Check that the draft matches the requested tone and purpose, is clear and
concise, and has a fitting subject line.

The sign-off comes from the sender's stored signature, not from the writer.
Never ask for a closing line or signature. A remaining sender placeholder
such as [Your Name] is only a problem when the sender's details are known.

Respond with ONLY a JSON object (no markdown, no explanation):
{{"verdict": "accept" | "revise", "feedback": ["concrete fix", ...]}}

Rules:
- "accept" when the draft is ready to send; feedback may be empty
- "revise" only for real problems, with at most {max_items} concrete, actionable items
- Do not rewrite the email yourself"#
    )
}

fn build_reviewer_user_prompt(state: &DraftState, profile: &SenderProfile) -> String {
    let draft = state.final_draft().cloned().unwrap_or_default();
    let tone = state.resolved_tone.unwrap_or(DEFAULT_TONE);
    let category = state.category.unwrap_or(Category::Other);
    let intent = state
        .parsed_intent
        .as_ref()
        .map(|i| i.body_intent.as_str())
        .unwrap_or(state.raw_input.as_str());

    let sender = if profile.name.trim().is_empty() {
        "unknown (leave sender placeholders alone)"
    } else {
        "known (flag any leftover placeholder)"
    };

    format!(
        "Requested tone: {tone}\nPurpose: {}\nWhat the sender asked for: {intent}\n\
         Sender details: {sender}\n\nDraft:\n{}",
        category.label(),
        draft.to_plain_text()
    )
}

fn parse_verdict(raw: &str) -> Option<Verdict> {
    match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
        "accept" | "accepted" | "approve" | "approved" | "ok" => Some(Verdict::Accept),
        "revise" | "revision" | "needs_revision" | "reject" | "rejected" => Some(Verdict::Revise),
        _ => None,
    }
}

/// Parse the reviewer's JSON reply, tolerating markdown fences, surrounding
/// prose, and a bare string in place of the feedback list.
pub fn parse_review(reply: &str, max_items: usize) -> Result<Review, String> {
    let json = extract_json_object(reply).ok_or_else(|| "no JSON object in review".to_string())?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| format!("review JSON parse error: {e}"))?;

    let raw_verdict = value
        .get("verdict")
        .and_then(Value::as_str)
        .ok_or_else(|| "review has no verdict".to_string())?;
    let verdict =
        parse_verdict(raw_verdict).ok_or_else(|| format!("unknown verdict: {raw_verdict}"))?;

    let mut feedback: Vec<String> = match value.get("feedback") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(item)) if !item.trim().is_empty() => vec![item.trim().to_string()],
        _ => Vec::new(),
    };
    feedback.truncate(max_items);

    Ok(Review { verdict, feedback })
}
