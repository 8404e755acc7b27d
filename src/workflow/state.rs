//! Draft-generation state threaded through the agent pipeline.
//!
//! Agents never mutate a `DraftState`. Each one reads the current state and
//! returns a `StateUpdate`; the orchestrator folds that update in with
//! [`DraftState::apply`] and appends the matching [`TraceEntry`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::TokenUsage;
use crate::profile::SenderProfile;

// ── Tone ────────────────────────────────────────────────────────────

/// Register the final email is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Formal,
    Casual,
    Assertive,
}

impl Tone {
    /// Short writing guidance for prompts.
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::Formal => "polite and professional; complete sentences, no slang",
            Self::Casual => "warm and relaxed, like writing to a colleague you know well",
            Self::Assertive => "direct and confident; clear asks and explicit next steps",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Formal => write!(f, "formal"),
            Self::Casual => write!(f, "casual"),
            Self::Assertive => write!(f, "assertive"),
        }
    }
}

impl FromStr for Tone {
    type Err = String;

    /// Accepts the canonical names plus a few common synonyms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "formal" | "professional" | "polite" => Ok(Self::Formal),
            "casual" | "friendly" | "informal" | "relaxed" => Ok(Self::Casual),
            "assertive" | "direct" | "firm" => Ok(Self::Assertive),
            other => Err(format!("Unknown tone: {other}")),
        }
    }
}

// ── Category ────────────────────────────────────────────────────────

/// Communicative goal of the email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    FollowUp,
    ThankYou,
    Request,
    Introduction,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Self::FollowUp,
        Self::ThankYou,
        Self::Request,
        Self::Introduction,
        Self::Other,
    ];

    /// Human-readable label, used in prompts and placeholder subjects.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FollowUp => "Follow-up",
            Self::ThankYou => "Thank you",
            Self::Request => "Request",
            Self::Introduction => "Introduction",
            Self::Other => "Other",
        }
    }

    /// Placeholder subject used when the writer cannot produce one.
    pub fn placeholder_subject(&self) -> String {
        format!("Re: {}", self.label())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FollowUp => "follow_up",
            Self::ThankYou => "thank_you",
            Self::Request => "request",
            Self::Introduction => "introduction",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

// ── Agent outputs ───────────────────────────────────────────────────

/// Structured signals extracted from the raw input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedIntent {
    pub recipient: Option<String>,
    pub tone_hint: Option<Tone>,
    pub subject_hint: Option<String>,
    pub body_intent: String,
}

/// A subject/body pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

impl EmailDraft {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Plain-text export: `Subject: ...`, a blank line, then the body.
    pub fn to_plain_text(&self) -> String {
        format!("Subject: {}\n\n{}", self.subject, self.body)
    }
}

/// The reviewer's judgment on a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accept,
    Revise,
}

/// Verdict plus concrete feedback items (possibly empty).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub verdict: Verdict,
    pub feedback: Vec<String>,
}

impl Review {
    /// The safe default: accept, nothing to fix.
    pub fn accept() -> Self {
        Self {
            verdict: Verdict::Accept,
            feedback: Vec::new(),
        }
    }
}

/// Router decision after each review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Finalize,
    Revise,
}

// ── Trace ───────────────────────────────────────────────────────────

/// Identity of a pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentName {
    IntentParser,
    IntentClassifier,
    ToneResolver,
    DraftWriter,
    Personalizer,
    Reviewer,
    Router,
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::IntentParser => "intent_parser",
            Self::IntentClassifier => "intent_classifier",
            Self::ToneResolver => "tone_resolver",
            Self::DraftWriter => "draft_writer",
            Self::Personalizer => "personalizer",
            Self::Reviewer => "reviewer",
            Self::Router => "router",
        };
        write!(f, "{s}")
    }
}

/// One agent invocation in the execution trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub agent: AgentName,
    /// Revision pass the call happened in (0 for the first pass and the prefix).
    pub iteration: u32,
    /// Snapshot of what the agent produced.
    pub output: serde_json::Value,
    /// Why the output is a fallback, if it is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub usage: TokenUsage,
    pub recorded_at: DateTime<Utc>,
}

impl TraceEntry {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

// ── State ───────────────────────────────────────────────────────────

/// A delta produced by exactly one agent.
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    Intent(ParsedIntent),
    Category(Category),
    Tone(Tone),
    Draft(EmailDraft),
    Personalized(EmailDraft),
    Review(Review),
    Route(Route),
}

impl StateUpdate {
    /// JSON snapshot of the carried value, for the trace.
    pub fn snapshot(&self) -> serde_json::Value {
        let value = match self {
            Self::Intent(v) => serde_json::to_value(v),
            Self::Category(v) => serde_json::to_value(v),
            Self::Tone(v) => serde_json::to_value(v),
            Self::Draft(v) | Self::Personalized(v) => serde_json::to_value(v),
            Self::Review(v) => serde_json::to_value(v),
            Self::Route(v) => serde_json::to_value(v),
        };
        value.unwrap_or_default()
    }
}

/// Everything the caller supplies for one workflow invocation.
#[derive(Debug, Clone, Default)]
pub struct DraftRequest {
    /// Free text (or a transcript) describing the email to write.
    pub raw_input: String,
    /// Explicit tone chosen by the caller; beats every other source.
    pub tone_override: Option<Tone>,
    /// Sender profile loaded from the profile store.
    pub profile: SenderProfile,
}

impl DraftRequest {
    pub fn new(raw_input: impl Into<String>) -> Self {
        Self {
            raw_input: raw_input.into(),
            ..Default::default()
        }
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone_override = Some(tone);
        self
    }

    pub fn with_profile(mut self, profile: SenderProfile) -> Self {
        self.profile = profile;
        self
    }
}

/// The record threaded through one workflow invocation.
#[derive(Debug, Clone, Serialize)]
pub struct DraftState {
    pub run_id: Uuid,
    pub raw_input: String,
    pub parsed_intent: Option<ParsedIntent>,
    pub category: Option<Category>,
    pub resolved_tone: Option<Tone>,
    pub draft: Option<EmailDraft>,
    pub personalized_draft: Option<EmailDraft>,
    pub review: Option<Review>,
    pub route: Option<Route>,
    pub iteration: u32,
    pub flow: Vec<TraceEntry>,
}

impl DraftState {
    pub fn new(raw_input: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            raw_input: raw_input.into(),
            parsed_intent: None,
            category: None,
            resolved_tone: None,
            draft: None,
            personalized_draft: None,
            review: None,
            route: None,
            iteration: 0,
            flow: Vec::new(),
        }
    }

    /// Fold one agent's update into the state.
    ///
    /// A new draft invalidates the personalized copy so it can never be
    /// stale relative to `draft`.
    pub fn apply(mut self, update: StateUpdate) -> Self {
        match update {
            StateUpdate::Intent(intent) => self.parsed_intent = Some(intent),
            StateUpdate::Category(category) => self.category = Some(category),
            StateUpdate::Tone(tone) => self.resolved_tone = Some(tone),
            StateUpdate::Draft(draft) => {
                self.draft = Some(draft);
                self.personalized_draft = None;
            }
            StateUpdate::Personalized(draft) => self.personalized_draft = Some(draft),
            StateUpdate::Review(review) => self.review = Some(review),
            StateUpdate::Route(route) => self.route = Some(route),
        }
        self
    }

    /// Append a trace entry.
    pub fn record(mut self, entry: TraceEntry) -> Self {
        self.flow.push(entry);
        self
    }

    /// Move to the next revision pass.
    pub fn next_iteration(mut self) -> Self {
        self.iteration += 1;
        self
    }

    pub fn is_finalized(&self) -> bool {
        self.route == Some(Route::Finalize)
    }

    /// The draft to hand back to the user.
    pub fn final_draft(&self) -> Option<&EmailDraft> {
        self.personalized_draft.as_ref().or(self.draft.as_ref())
    }

    /// Number of revision passes that actually ran.
    pub fn revision_count(&self) -> u32 {
        self.iteration
    }

    /// Trace entries whose output is a fallback.
    pub fn degraded_steps(&self) -> impl Iterator<Item = &TraceEntry> {
        self.flow.iter().filter(|e| e.is_degraded())
    }
}
