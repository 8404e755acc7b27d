//! Draft writer — produces (or rewrites) the subject and body.
//!
//! On revision passes the prompt carries every reviewer feedback item plus
//! the draft being revised. The output always replaces `draft` wholesale.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::llm::extract::{extract_json_object, strip_code_fence};
use crate::profile::SenderProfile;
use crate::workflow::agent::{Agent, ModelCaller, StepOutcome, StepOutput};
use crate::workflow::state::{
    AgentName, Category, DraftRequest, DraftState, EmailDraft, ParsedIntent, StateUpdate, Tone,
};
use crate::workflow::tone::DEFAULT_TONE;

pub struct DraftWriter {
    model: ModelCaller,
    style_examples: usize,
}

impl DraftWriter {
    pub fn new(model: ModelCaller, style_examples: usize) -> Self {
        Self {
            model,
            style_examples,
        }
    }
}

#[async_trait]
impl Agent for DraftWriter {
    fn name(&self) -> AgentName {
        AgentName::DraftWriter
    }

    async fn run(&self, state: &DraftState, request: &DraftRequest) -> StepOutcome<StepOutput> {
        let user = build_writer_user_prompt(state, &request.profile, self.style_examples);
        let fallback_subject = fallback_subject(state);

        match self
            .model
            .call(self.name(), build_writer_system_prompt(), user)
            .await
        {
            Ok(response) => StepOutcome::Ok(StepOutput {
                update: StateUpdate::Draft(parse_draft_reply(&response.content, &fallback_subject)),
                usage: response.usage(),
            }),
            Err(e) => {
                let draft = match &state.draft {
                    Some(previous) => {
                        warn!(error = %e, "Draft call failed, keeping previous draft");
                        previous.clone()
                    }
                    None => {
                        warn!(error = %e, "Draft call failed, building draft from intent");
                        fallback_draft(state)
                    }
                };
                StepOutcome::degraded(StepOutput::local(StateUpdate::Draft(draft)), e.to_string())
            }
        }
    }
}

fn build_writer_system_prompt() -> String {
    "You write emails on behalf of the sender.\n\n\
     Rules:\n\
     - Answer with the subject line, a blank line, then the body:\n\
       Subject: <subject>\n\n<body>\n\
     - Write only the email. No commentary, no markdown.\n\
     - Do not invent facts, dates, or commitments that are not in the request.\n\
     - End with the last sentence of the body. No closing line and no signature:\n\
       the sender's signature is added afterwards.\n\
     - If the body has to name the sender, write [Your Name]."
        .to_string()
}

fn build_writer_user_prompt(state: &DraftState, profile: &SenderProfile, examples: usize) -> String {
    let default_intent = ParsedIntent::default();
    let intent = state.parsed_intent.as_ref().unwrap_or(&default_intent);
    let category = state.category.unwrap_or(Category::Other);
    let tone = state.resolved_tone.unwrap_or(DEFAULT_TONE);

    let body_intent = if intent.body_intent.is_empty() {
        state.raw_input.as_str()
    } else {
        intent.body_intent.as_str()
    };

    let mut prompt = format!(
        "Write a {} email.\n\nWhat it should say:\n{body_intent}\n\n{}",
        category.label().to_lowercase(),
        tone_line(tone)
    );

    if let Some(ref recipient) = intent.recipient {
        prompt.push_str(&format!("\nRecipient: {recipient}"));
    }
    if let Some(ref subject) = intent.subject_hint {
        prompt.push_str(&format!("\nSubject should be about: {subject}"));
    }

    let sender = profile.to_prompt_section();
    if !sender.is_empty() {
        prompt.push_str(&format!("\n\n## Sender\n{sender}"));
    }

    let recent = profile.recent_examples(examples);
    if !recent.is_empty() {
        prompt.push_str("\n\n## Emails the sender wrote before (match their style, not their content)");
        for example in recent {
            prompt.push_str(&format!(
                "\n---\nSubject: {}\n\n{}",
                example.subject.trim(),
                example.body.trim()
            ));
        }
        prompt.push_str("\n---");
    }

    if let Some(review) = state.review.as_ref().filter(|r| !r.feedback.is_empty()) {
        prompt.push_str("\n\n## Reviewer feedback\nRevise the previous draft and address every item:");
        for (i, item) in review.feedback.iter().enumerate() {
            prompt.push_str(&format!("\n{}. {item}", i + 1));
        }
        if let Some(previous) = state.final_draft() {
            prompt.push_str(&format!("\n\n## Previous draft\n{}", previous.to_plain_text()));
        }
    }

    prompt
}

fn tone_line(tone: Tone) -> String {
    format!("Tone: {tone} ({})", tone.guidance())
}

fn fallback_subject(state: &DraftState) -> String {
    state
        .parsed_intent
        .as_ref()
        .and_then(|i| i.subject_hint.clone())
        .unwrap_or_else(|| state.category.unwrap_or(Category::Other).placeholder_subject())
}

/// Draft assembled from the parsed intent alone, used when the model is unavailable.
pub fn fallback_draft(state: &DraftState) -> EmailDraft {
    let intent = state.parsed_intent.as_ref();
    let body_intent = intent
        .map(|i| i.body_intent.trim())
        .filter(|b| !b.is_empty())
        .unwrap_or(state.raw_input.trim());
    let body = match intent.and_then(|i| i.recipient.as_deref()) {
        Some(recipient) => format!("Hi {recipient},\n\n{body_intent}"),
        None => body_intent.to_string(),
    };
    EmailDraft::new(fallback_subject(state), body)
}

#[derive(Debug, Deserialize)]
struct JsonDraft {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
}

/// Parse a writer reply: `Subject: ...` + blank line + body, or a JSON
/// `{subject, body}` object. A missing subject becomes `fallback_subject`;
/// an empty body becomes the whole reply.
pub fn parse_draft_reply(reply: &str, fallback_subject: &str) -> EmailDraft {
    let text = strip_code_fence(reply);

    let (subject, body) = match extract_json_object(text)
        .filter(|_| text.starts_with('{'))
        .and_then(|json| serde_json::from_str::<JsonDraft>(json).ok())
    {
        Some(draft) => (draft.subject.trim().to_string(), draft.body.trim().to_string()),
        None => split_subject_line(text),
    };

    let subject = if subject.is_empty() {
        fallback_subject.to_string()
    } else {
        subject
    };
    let body = if body.is_empty() {
        text.to_string()
    } else {
        body
    };
    EmailDraft { subject, body }
}

fn split_subject_line(text: &str) -> (String, String) {
    let trimmed = text.trim_start();
    let (first, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
    let first = first.trim();
    const PREFIX: &str = "subject:";
    match first.get(..PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(PREFIX) => (
            first[PREFIX.len()..].trim().to_string(),
            rest.trim().to_string(),
        ),
        _ => (String::new(), text.trim().to_string()),
    }
}
