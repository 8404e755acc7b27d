//! Fills sender placeholders and appends the signature.
//!
//! Pure and idempotent: running it on its own output changes nothing.

use async_trait::async_trait;

use crate::profile::SenderProfile;
use crate::workflow::agent::{Agent, StepOutcome, StepOutput};
use crate::workflow::state::{AgentName, DraftRequest, DraftState, EmailDraft, StateUpdate};

const NAME_PLACEHOLDERS: &[&str] = &[
    "[Your Name]",
    "[Name]",
    "{{name}}",
    "{name}",
    "<Your Name>",
    "[Sender Name]",
];

const COMPANY_PLACEHOLDERS: &[&str] = &["[Your Company]", "[Company]", "{{company}}", "{company}"];

fn fill(text: &str, placeholders: &[&str], value: &str) -> String {
    placeholders
        .iter()
        .fold(text.to_string(), |acc, placeholder| acc.replace(placeholder, value))
}

fn fill_sender(text: &str, profile: &SenderProfile) -> String {
    let mut out = text.to_string();
    let name = profile.name.trim();
    if !name.is_empty() {
        out = fill(&out, NAME_PLACEHOLDERS, name);
    }
    let company = profile.company.trim();
    if !company.is_empty() {
        out = fill(&out, COMPANY_PLACEHOLDERS, company);
    }
    out
}

/// Apply the profile to a draft.
pub fn personalize(draft: &EmailDraft, profile: &SenderProfile) -> EmailDraft {
    let subject = fill_sender(&draft.subject, profile);
    let mut body = fill_sender(&draft.body, profile);

    // Filled before the duplicate check.
    if let Some(signature) = profile.signature_block().map(|s| fill_sender(&s, profile))
        && !body.trim_end().ends_with(&signature)
    {
        let trimmed = body.trim_end();
        body = if trimmed.is_empty() {
            signature
        } else {
            format!("{trimmed}\n\n{signature}")
        };
    }

    EmailDraft { subject, body }
}

pub struct Personalizer;

#[async_trait]
impl Agent for Personalizer {
    fn name(&self) -> AgentName {
        AgentName::Personalizer
    }

    async fn run(&self, state: &DraftState, request: &DraftRequest) -> StepOutcome<StepOutput> {
        // Always derived from the latest draft, never from an earlier personalization.
        let draft = state.draft.clone().unwrap_or_default();
        StepOutcome::Ok(StepOutput::local(StateUpdate::Personalized(personalize(
            &draft,
            &request.profile,
        ))))
    }
}
