//! Final tone selection. Pure, no LLM.

use async_trait::async_trait;

use crate::workflow::agent::{Agent, StepOutcome, StepOutput};
use crate::workflow::state::{AgentName, DraftRequest, DraftState, StateUpdate, Tone};

/// Tone used when nobody expressed a preference.
pub const DEFAULT_TONE: Tone = Tone::Formal;

/// Resolution order: explicit override, parsed hint, profile default, `formal`.
pub fn resolve_tone(
    tone_override: Option<Tone>,
    tone_hint: Option<Tone>,
    profile_default: Option<Tone>,
) -> Tone {
    tone_override
        .or(tone_hint)
        .or(profile_default)
        .unwrap_or(DEFAULT_TONE)
}

pub struct ToneResolver;

#[async_trait]
impl Agent for ToneResolver {
    fn name(&self) -> AgentName {
        AgentName::ToneResolver
    }

    async fn run(&self, state: &DraftState, request: &DraftRequest) -> StepOutcome<StepOutput> {
        let hint = state.parsed_intent.as_ref().and_then(|i| i.tone_hint);
        let tone = resolve_tone(request.tone_override, hint, request.profile.preferred_tone);
        StepOutcome::Ok(StepOutput::local(StateUpdate::Tone(tone)))
    }
}
