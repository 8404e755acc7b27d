use std::io::Read;
use std::path::PathBuf;

use mailwright::config::WorkflowConfig;
use mailwright::llm::{LlmConfig, create_provider};
use mailwright::profile::{ProfileConfig, record_sent};
use mailwright::transcribe::{OpenAiTranscriber, transcribe_file};
use mailwright::workflow::{DraftState, Orchestrator, Tone, TraceEntry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let llm_config = LlmConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export OPENAI_API_KEY=sk-...  (or MAILWRIGHT_LLM_BACKEND=anthropic + ANTHROPIC_API_KEY)");
        std::process::exit(1);
    });
    let workflow_config = WorkflowConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let profile_config = ProfileConfig::from_env();

    let tone_override = match std::env::var("MAILWRIGHT_TONE") {
        Ok(raw) if !raw.trim().is_empty() => Some(raw.parse::<Tone>().unwrap_or_else(|e| {
            eprintln!("Error: MAILWRIGHT_TONE: {e} (expected formal, casual or assertive)");
            std::process::exit(1);
        })),
        _ => None,
    };

    eprintln!("✉️  Mailwright v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", llm_config.model);
    eprintln!("   Profiles: {} (user: {})", profile_config.path.display(), profile_config.user_id);
    if profile_config.github.is_some() {
        eprintln!("   GitHub mirror: enabled");
    }

    let raw_input = read_input().await?;
    if raw_input.trim().is_empty() {
        eprintln!("Error: nothing to draft");
        eprintln!("  mailwright \"to: Alice  Follow up on the proposal. tone: formal\"");
        std::process::exit(1);
    }

    let llm = create_provider(&llm_config)?;
    let orchestrator = Orchestrator::new(llm, workflow_config)?;
    let store = profile_config.open();

    let progress = |entry: &TraceEntry, _state: &DraftState| -> anyhow::Result<()> {
        match entry.degraded {
            Some(ref cause) => eprintln!("   ⚠ {} (fallback: {cause})", entry.agent),
            None => eprintln!("   ✓ {} ({} ms)", entry.agent, entry.elapsed_ms),
        }
        Ok(())
    };

    let state = orchestrator
        .run_for_user(
            &store,
            &profile_config.user_id,
            raw_input,
            tone_override,
            Some(&progress),
        )
        .await;

    let Some(draft) = state.final_draft() else {
        anyhow::bail!("workflow finished without a draft");
    };
    println!("{}", draft.to_plain_text());

    eprintln!(
        "\n   Revisions: {}  Steps: {}",
        state.revision_count(),
        state.flow.len()
    );

    if env_flag("MAILWRIGHT_SAVE_HISTORY") {
        match record_sent(&store, &profile_config.user_id, draft).await {
            Ok(()) => eprintln!("   Saved to profile history"),
            Err(e) => eprintln!("   Warning: could not save to history: {e}"),
        }
    }

    Ok(())
}

/// Request text: command-line arguments, else a transcribed audio file, else stdin.
async fn read_input() -> anyhow::Result<String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        return Ok(args.join(" "));
    }

    if let Ok(audio) = std::env::var("MAILWRIGHT_AUDIO") {
        let transcriber = OpenAiTranscriber::from_env()?;
        let text = transcribe_file(&transcriber, &PathBuf::from(audio)).await?;
        eprintln!("   Transcript: {text}");
        return Ok(text);
    }

    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
