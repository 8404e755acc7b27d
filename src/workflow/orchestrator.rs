//! Orchestrator — runs the agent pipeline for one draft request.
//!
//! Flow:
//! 1. Prefix, once: intent parser → classifier → tone resolver
//! 2. Cycle: writer → personalizer → reviewer → router
//! 3. Repeat the cycle until the router says finalize
//!
//! Every agent call appends one `TraceEntry`, so a run with `n` revisions
//! has `3 + 4 × (1 + n)` entries. The router caps `n` at `max_iterations`.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::WorkflowConfig;
use crate::error::ConfigError;
use crate::llm::LlmProvider;
use crate::profile::ProfileStore;
use crate::workflow::agent::{Agent, ModelCaller};
use crate::workflow::classifier::IntentClassifier;
use crate::workflow::observer::{NoopObserver, StepObserver, notify};
use crate::workflow::parser::IntentParser;
use crate::workflow::personalizer::Personalizer;
use crate::workflow::reviewer::Reviewer;
use crate::workflow::router::Router;
use crate::workflow::state::{DraftRequest, DraftState, Tone, TraceEntry};
use crate::workflow::tone::ToneResolver;
use crate::workflow::writer::DraftWriter;

/// Runs the drafting pipeline. Shareable across concurrent runs.
pub struct Orchestrator {
    prefix: Vec<Box<dyn Agent>>,
    cycle: Vec<Box<dyn Agent>>,
    config: WorkflowConfig,
}

impl Orchestrator {
    /// Validate the configuration and build the agent lists.
    pub fn new(llm: Arc<dyn LlmProvider>, config: WorkflowConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let retry = config.retry_policy();

        let prefix: Vec<Box<dyn Agent>> = vec![
            Box::new(IntentParser),
            Box::new(IntentClassifier::new(ModelCaller::new(
                Arc::clone(&llm),
                config.classifier,
                retry,
            ))),
            Box::new(ToneResolver),
        ];
        let cycle: Vec<Box<dyn Agent>> = vec![
            Box::new(DraftWriter::new(
                ModelCaller::new(Arc::clone(&llm), config.writer, retry),
                config.style_examples,
            )),
            Box::new(Personalizer),
            Box::new(Reviewer::new(
                ModelCaller::new(llm, config.reviewer, retry),
                config.max_feedback_items,
            )),
            Box::new(Router::new(config.max_iterations)),
        ];

        Ok(Self {
            prefix,
            cycle,
            config,
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Run the full pipeline. Never fails: agent failures degrade to fallbacks
    /// recorded in the trace, and observer failures are only logged.
    pub async fn run(
        &self,
        request: &DraftRequest,
        observer: Option<&dyn StepObserver>,
    ) -> DraftState {
        let observer = observer.unwrap_or(&NoopObserver);
        let state = DraftState::new(request.raw_input.clone());
        let span = info_span!("draft", run_id = %state.run_id);

        async move {
            info!(
                chars = request.raw_input.len(),
                tone_override = ?request.tone_override,
                max_iterations = self.config.max_iterations,
                "Starting draft run"
            );
            let started = Instant::now();

            let mut state = state;
            for agent in &self.prefix {
                state = self.step(agent.as_ref(), state, request, observer).await;
            }

            loop {
                for agent in &self.cycle {
                    state = self.step(agent.as_ref(), state, request, observer).await;
                }
                if state.is_finalized() {
                    break;
                }
                state = state.next_iteration();
                info!(iteration = state.iteration, "Revising draft");
            }

            info!(
                revisions = state.revision_count(),
                steps = state.flow.len(),
                degraded = state.degraded_steps().count(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Draft run complete"
            );
            state
        }
        .instrument(span)
        .await
    }

    /// Load the sender's profile from `store` and run.
    ///
    /// A store failure falls back to the empty profile.
    pub async fn run_for_user(
        &self,
        store: &dyn ProfileStore,
        user_id: &str,
        raw_input: impl Into<String>,
        tone_override: Option<Tone>,
        observer: Option<&dyn StepObserver>,
    ) -> DraftState {
        let profile = match store.get(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Profile load failed, using empty profile");
                Default::default()
            }
        };
        let mut request = DraftRequest::new(raw_input).with_profile(profile);
        request.tone_override = tone_override;
        self.run(&request, observer).await
    }

    /// Run one agent, fold its update in, record the trace entry, notify.
    async fn step(
        &self,
        agent: &dyn Agent,
        state: DraftState,
        request: &DraftRequest,
        observer: &dyn StepObserver,
    ) -> DraftState {
        let name = agent.name();
        let started = Instant::now();
        let (output, cause) = agent.run(&state, request).await.into_parts();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match cause {
            Some(ref cause) => warn!(
                agent = %name,
                iteration = state.iteration,
                cause = %cause,
                "Agent degraded, using fallback output"
            ),
            None => debug!(agent = %name, iteration = state.iteration, elapsed_ms, "Agent finished"),
        }

        let entry = TraceEntry {
            agent: name,
            iteration: state.iteration,
            output: output.update.snapshot(),
            degraded: cause,
            elapsed_ms,
            usage: output.usage,
            recorded_at: Utc::now(),
        };
        let state = state.apply(output.update).record(entry);

        if let Some(entry) = state.flow.last() {
            notify(observer, entry, &state);
        }
        state
    }
}
