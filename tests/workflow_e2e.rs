//! End-to-end tests for the drafting workflow.
//!
//! A stub model answers each agent by looking at the system prompt, so the
//! full orchestrator runs without any network access.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use mailwright::config::WorkflowConfig;
use mailwright::error::LlmError;
use mailwright::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use mailwright::profile::{JsonProfileStore, ProfileStore, SenderProfile, record_sent};
use mailwright::workflow::{
    AgentName, Category, DraftRequest, DraftState, Orchestrator, Route, Tone, TraceEntry,
    Verdict, personalize,
};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Stub model: one reply for the classifier, numbered drafts for the writer,
/// a queue of verdict replies for the reviewer (accept once exhausted).
struct StubLlm {
    category: Result<String, ()>,
    reviews: Mutex<VecDeque<String>>,
    drafts: AtomicU32,
    writer_delay: Option<Duration>,
}

impl StubLlm {
    fn new(category: &str, reviews: &[&str]) -> Self {
        Self {
            category: Ok(category.to_string()),
            reviews: Mutex::new(reviews.iter().map(|r| r.to_string()).collect()),
            drafts: AtomicU32::new(0),
            writer_delay: None,
        }
    }

    fn reply(content: String) -> CompletionResponse {
        CompletionResponse {
            content,
            input_tokens: 40,
            output_tokens: 20,
            finish_reason: FinishReason::Stop,
            response_id: None,
        }
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let system = request.system_prompt().unwrap_or_default();

        if system.contains("You classify") {
            return match &self.category {
                Ok(label) => Ok(Self::reply(label.clone())),
                Err(()) => Err(LlmError::AuthFailed {
                    provider: "stub".into(),
                }),
            };
        }

        if system.contains("You review") {
            let next = self.reviews.lock().unwrap().pop_front();
            return Ok(Self::reply(
                next.unwrap_or_else(|| r#"{"verdict": "accept", "feedback": []}"#.to_string()),
            ));
        }

        if let Some(delay) = self.writer_delay {
            tokio::time::sleep(delay).await;
        }
        let n = self.drafts.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Self::reply(format!(
            "Subject: Draft {n}\n\nHi Alice,\n\nThis is version {n} of the follow-up."
        )))
    }
}

const REVISE: &str = r#"{"verdict": "revise", "feedback": ["Mention the deadline"]}"#;

fn config() -> WorkflowConfig {
    WorkflowConfig {
        model_retries: 0,
        ..WorkflowConfig::default()
    }
}

fn profile() -> SenderProfile {
    SenderProfile {
        name: "Manasa".into(),
        company: "Stealth Startup".into(),
        signature: "Best,\nManasa".into(),
        ..Default::default()
    }
}

fn orchestrator(llm: StubLlm, config: WorkflowConfig) -> Orchestrator {
    Orchestrator::new(Arc::new(llm), config).unwrap()
}

fn agents(state: &DraftState) -> Vec<AgentName> {
    state.flow.iter().map(|e| e.agent).collect()
}

fn count(state: &DraftState, agent: AgentName) -> usize {
    state.flow.iter().filter(|e| e.agent == agent).count()
}

// ── Scenarios ────────────────────────────────────────────────────────

#[tokio::test]
async fn follow_up_scenario_accepts_first_pass() {
    timeout(TEST_TIMEOUT, async {
        let orchestrator = orchestrator(StubLlm::new("follow_up", &[]), config());
        let request = DraftRequest::new("to: Alice\nFollow-up on proposal... tone: formal")
            .with_profile(profile());
        let state = orchestrator.run(&request, None).await;

        assert_eq!(state.flow.len(), 7);
        assert_eq!(
            agents(&state),
            vec![
                AgentName::IntentParser,
                AgentName::IntentClassifier,
                AgentName::ToneResolver,
                AgentName::DraftWriter,
                AgentName::Personalizer,
                AgentName::Reviewer,
                AgentName::Router,
            ]
        );

        let intent = state.parsed_intent.as_ref().unwrap();
        assert_eq!(intent.recipient.as_deref(), Some("Alice"));
        assert_eq!(state.category, Some(Category::FollowUp));
        assert_eq!(state.resolved_tone, Some(Tone::Formal));
        assert_eq!(state.review.as_ref().unwrap().verdict, Verdict::Accept);
        assert_eq!(state.route, Some(Route::Finalize));
        assert_eq!(state.revision_count(), 0);

        let final_draft = state.final_draft().unwrap();
        assert_eq!(final_draft.subject, "Draft 1");
        assert!(final_draft.body.ends_with("of the follow-up.\n\nBest,\nManasa"));
        assert_eq!(final_draft.body.matches("Manasa").count(), 1);
        assert!(!final_draft.body.contains("[Your Name]"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn revise_revise_accept_stops_at_two_revisions() {
    let orchestrator = orchestrator(StubLlm::new("follow_up", &[REVISE, REVISE]), config());
    let state = orchestrator.run(&DraftRequest::new("Follow up"), None).await;

    assert_eq!(state.revision_count(), 2);
    assert_eq!(state.flow.len(), 3 + 4 * 3);
    assert_eq!(count(&state, AgentName::DraftWriter), 3);
    assert_eq!(state.final_draft().unwrap().subject, "Draft 3");
    assert!(state.is_finalized());
}

#[tokio::test]
async fn endless_revise_is_capped() {
    let orchestrator = orchestrator(
        StubLlm::new("request", &[REVISE, REVISE, REVISE, REVISE, REVISE]),
        config(),
    );
    let state = orchestrator.run(&DraftRequest::new("Ask for budget"), None).await;

    assert_eq!(state.revision_count(), 2);
    assert_eq!(state.flow.len(), 15);
    // The last review still asked for changes; the cap finalized anyway.
    assert_eq!(state.review.as_ref().unwrap().verdict, Verdict::Revise);
    assert_eq!(state.route, Some(Route::Finalize));
}

#[tokio::test]
async fn zero_cap_never_revises() {
    let config = WorkflowConfig {
        max_iterations: 0,
        ..config()
    };
    let orchestrator = orchestrator(StubLlm::new("request", &[REVISE]), config);
    let state = orchestrator.run(&DraftRequest::new("Ask"), None).await;
    assert_eq!(state.flow.len(), 7);
    assert_eq!(state.revision_count(), 0);
}

#[tokio::test]
async fn trace_length_matches_revisions() {
    for revisions in 0..=3u32 {
        let reviews: Vec<&str> = (0..revisions).map(|_| REVISE).collect();
        let config = WorkflowConfig {
            max_iterations: 3,
            ..config()
        };
        let orchestrator = orchestrator(StubLlm::new("other", &reviews), config);
        let state = orchestrator.run(&DraftRequest::new("Hello"), None).await;
        assert_eq!(state.revision_count(), revisions);
        assert_eq!(state.flow.len() as u32, 3 + 4 * (1 + revisions));
    }
}

#[tokio::test]
async fn personalized_draft_tracks_latest_draft() {
    let orchestrator = orchestrator(StubLlm::new("follow_up", &[REVISE]), config());
    let request = DraftRequest::new("Follow up").with_profile(profile());
    let state = orchestrator.run(&request, None).await;

    let draft = state.draft.as_ref().unwrap();
    let personalized = state.personalized_draft.as_ref().unwrap();
    assert_eq!(draft.subject, "Draft 2");
    assert_eq!(personalized, &personalize(draft, &request.profile));
    assert_eq!(personalize(personalized, &request.profile), *personalized);
}

// ── Degradation ─────────────────────────────────────────────────────

#[tokio::test]
async fn unparseable_review_terminates_as_accept() {
    let orchestrator = orchestrator(
        StubLlm::new("thank_you", &["Honestly this looks great, ship it"]),
        config(),
    );
    let state = orchestrator.run(&DraftRequest::new("Thank Bob"), None).await;

    assert_eq!(state.flow.len(), 7);
    let review_entry = state
        .flow
        .iter()
        .find(|e| e.agent == AgentName::Reviewer)
        .unwrap();
    assert!(review_entry.is_degraded());
    assert_eq!(state.review.as_ref().unwrap().verdict, Verdict::Accept);
    assert!(state.is_finalized());
}

#[tokio::test]
async fn classifier_failure_degrades_to_other() {
    let llm = StubLlm {
        category: Err(()),
        ..StubLlm::new("", &[])
    };
    let orchestrator = orchestrator(llm, config());
    let state = orchestrator.run(&DraftRequest::new("Say hi to Dana"), None).await;

    assert_eq!(state.category, Some(Category::Other));
    let degraded: Vec<AgentName> = state.degraded_steps().map(|e| e.agent).collect();
    assert_eq!(degraded, vec![AgentName::IntentClassifier]);
    assert!(state.final_draft().is_some());
}

#[tokio::test]
async fn slow_writer_times_out_to_fallback_draft() {
    let llm = StubLlm {
        writer_delay: Some(Duration::from_millis(500)),
        ..StubLlm::new("follow_up", &[])
    };
    let config = WorkflowConfig {
        model_timeout: Duration::from_millis(50),
        ..config()
    };
    let orchestrator = orchestrator(llm, config);
    let state = orchestrator
        .run(&DraftRequest::new("to: Alice\nCheck on the proposal"), None)
        .await;

    let writer_entry = state
        .flow
        .iter()
        .find(|e| e.agent == AgentName::DraftWriter)
        .unwrap();
    assert!(writer_entry.degraded.as_deref().unwrap().contains("timed out"));
    let draft = state.draft.as_ref().unwrap();
    assert_eq!(draft.subject, "Re: Follow-up");
    assert_eq!(draft.body, "Hi Alice,\n\nCheck on the proposal");
}

// ── Tone ────────────────────────────────────────────────────────────

#[tokio::test]
async fn explicit_tone_beats_hint_and_profile() {
    let orchestrator = orchestrator(StubLlm::new("request", &[]), config());
    let request = DraftRequest::new("Ask for the report tone: casual")
        .with_profile(SenderProfile {
            preferred_tone: Some(Tone::Formal),
            ..Default::default()
        })
        .with_tone(Tone::Assertive);
    let state = orchestrator.run(&request, None).await;
    assert_eq!(state.resolved_tone, Some(Tone::Assertive));
}

#[tokio::test]
async fn profile_tone_used_without_hint() {
    let orchestrator = orchestrator(StubLlm::new("request", &[]), config());
    let request = DraftRequest::new("Ask for the report").with_profile(SenderProfile {
        preferred_tone: Some(Tone::Casual),
        ..Default::default()
    });
    let state = orchestrator.run(&request, None).await;
    assert_eq!(state.resolved_tone, Some(Tone::Casual));
}

// ── Observer ────────────────────────────────────────────────────────

#[tokio::test]
async fn observer_sees_every_step() {
    let seen = Mutex::new(Vec::new());
    let observer = |entry: &TraceEntry, state: &DraftState| -> anyhow::Result<()> {
        assert_eq!(state.flow.last().map(|e| e.agent), Some(entry.agent));
        seen.lock().unwrap().push(entry.agent);
        Ok(())
    };

    let orchestrator = orchestrator(StubLlm::new("follow_up", &[REVISE]), config());
    let state = orchestrator
        .run(&DraftRequest::new("Follow up"), Some(&observer))
        .await;

    assert_eq!(*seen.lock().unwrap(), agents(&state));
}

#[tokio::test]
async fn failing_and_panicking_observers_do_not_change_the_run() {
    let calls = AtomicU32::new(0);
    let observer = |entry: &TraceEntry, _: &DraftState| -> anyhow::Result<()> {
        calls.fetch_add(1, Ordering::SeqCst);
        match entry.agent {
            AgentName::Personalizer => panic!("observer bug"),
            AgentName::Reviewer => anyhow::bail!("metrics sink down"),
            _ => Ok(()),
        }
    };

    let orchestrator = orchestrator(StubLlm::new("follow_up", &[REVISE]), config());
    let state = orchestrator
        .run(&DraftRequest::new("Follow up"), Some(&observer))
        .await;

    assert_eq!(state.flow.len(), 11);
    assert_eq!(calls.load(Ordering::SeqCst), 11);
    assert_eq!(state.degraded_steps().count(), 0);
    assert!(state.is_finalized());
}

// ── Concurrency, profiles, trace ────────────────────────────────────

#[tokio::test]
async fn shared_orchestrator_runs_concurrently() {
    let orchestrator = Arc::new(orchestrator(StubLlm::new("request", &[]), config()));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .run(&DraftRequest::new(format!("Request number {i}")), None)
                    .await
            })
        })
        .collect();

    let mut run_ids = Vec::new();
    for handle in handles {
        let state = handle.await.unwrap();
        assert_eq!(state.flow.len(), 7);
        run_ids.push(state.run_id);
    }
    run_ids.sort();
    run_ids.dedup();
    assert_eq!(run_ids.len(), 4);
}

#[tokio::test]
async fn saved_history_feeds_the_next_run() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = JsonProfileStore::new(dir.path().join("profiles.json"));
    store.put("default", &profile()).await.unwrap();

    let orchestrator = orchestrator(StubLlm::new("follow_up", &[]), config());
    let state = orchestrator
        .run_for_user(&store, "default", "Follow up with Alice", None, None)
        .await;
    record_sent(&store, "default", state.final_draft().unwrap())
        .await
        .unwrap();

    let saved = store.get("default").await.unwrap();
    assert_eq!(saved.sent_examples.len(), 1);
    assert_eq!(saved.sent_examples[0].subject, "Draft 1");
    assert_eq!(saved.name, "Manasa");
}

#[tokio::test]
async fn trace_serializes_to_json() {
    let orchestrator = orchestrator(StubLlm::new("follow_up", &[REVISE]), config());
    let state = orchestrator.run(&DraftRequest::new("Follow up"), None).await;

    let json = serde_json::to_value(&state).unwrap();
    let flow = json["flow"].as_array().unwrap();
    assert_eq!(flow.len(), 11);
    assert_eq!(flow[0]["agent"], "intent_parser");
    assert_eq!(flow[5]["output"]["verdict"], "revise");
    assert_eq!(flow[6]["output"], "revise");
    assert_eq!(flow[10]["output"], "finalize");
    assert_eq!(flow[10]["iteration"], 1);
    assert_eq!(flow[3]["usage"]["input_tokens"], 40);
}
