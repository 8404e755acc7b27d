//! Read-only hook invoked after every agent call.
//!
//! Observers see each trace entry and the state it produced. They cannot
//! change either, and whatever they do (fail or panic) never reaches the
//! workflow.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::warn;

use crate::workflow::state::{DraftState, TraceEntry};

/// Hook called synchronously after each agent invocation.
pub trait StepObserver: Send + Sync {
    fn on_step(&self, entry: &TraceEntry, state: &DraftState) -> anyhow::Result<()>;
}

impl<F> StepObserver for F
where
    F: Fn(&TraceEntry, &DraftState) -> anyhow::Result<()> + Send + Sync,
{
    fn on_step(&self, entry: &TraceEntry, state: &DraftState) -> anyhow::Result<()> {
        self(entry, state)
    }
}

/// Observer that does nothing.
pub struct NoopObserver;

impl StepObserver for NoopObserver {
    #[inline(always)]
    fn on_step(&self, _entry: &TraceEntry, _state: &DraftState) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Invoke the observer, logging and swallowing errors and panics.
pub(crate) fn notify(observer: &dyn StepObserver, entry: &TraceEntry, state: &DraftState) {
    match catch_unwind(AssertUnwindSafe(|| observer.on_step(entry, state))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(agent = %entry.agent, error = %e, "Step observer failed");
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(agent = %entry.agent, panic = %message, "Step observer panicked");
        }
    }
}
