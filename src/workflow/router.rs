//! Decides between finalizing and another revision pass.

use async_trait::async_trait;
use tracing::debug;

use crate::workflow::agent::{Agent, StepOutcome, StepOutput};
use crate::workflow::state::{
    AgentName, DraftRequest, DraftState, Review, Route, StateUpdate, Verdict,
};

/// Finalize on accept, or once `iteration` has reached the cap.
pub fn decide_route(review: Option<&Review>, iteration: u32, max_iterations: u32) -> Route {
    let accepted = review.is_none_or(|r| r.verdict == Verdict::Accept);
    if accepted || iteration >= max_iterations {
        Route::Finalize
    } else {
        Route::Revise
    }
}

pub struct Router {
    max_iterations: u32,
}

impl Router {
    pub fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }
}

#[async_trait]
impl Agent for Router {
    fn name(&self) -> AgentName {
        AgentName::Router
    }

    async fn run(&self, state: &DraftState, _request: &DraftRequest) -> StepOutcome<StepOutput> {
        let route = decide_route(state.review.as_ref(), state.iteration, self.max_iterations);
        debug!(
            iteration = state.iteration,
            max_iterations = self.max_iterations,
            route = ?route,
            "Routed"
        );
        StepOutcome::Ok(StepOutput::local(StateUpdate::Route(route)))
    }
}
