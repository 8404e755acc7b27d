//! Multi-agent email drafting workflow.
//!
//! Turns a free-text request into a finished email:
//! - `parser` pulls directives (`to:`, `tone:`, `subject:`) out of the text
//! - `classifier` asks the model for the email's purpose
//! - `tone` picks the register
//! - `writer`, `personalizer`, `reviewer`, `router` draft and refine in a
//!   bounded loop
//!
//! The `Orchestrator` owns the agent order. Agents only read the state and
//! return updates; see [`state`] for the data model.

pub mod agent;
pub mod classifier;
pub mod observer;
pub mod orchestrator;
pub mod parser;
pub mod personalizer;
pub mod reviewer;
pub mod router;
pub mod state;
pub mod tone;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{Agent, StepOutcome, StepOutput};
pub use observer::{NoopObserver, StepObserver};
pub use orchestrator::Orchestrator;
pub use personalizer::personalize;
pub use state::{
    AgentName, Category, DraftRequest, DraftState, EmailDraft, ParsedIntent, Review, Route, Tone,
    TraceEntry, Verdict,
};
pub use tone::resolve_tone;
