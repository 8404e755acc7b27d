//! Integration tests for the HTTP clients (transcription, GitHub mirror).
//!
//! Each test spins up an Axum stub on a random port and points the client
//! at it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use mailwright::error::TranscriptionError;
use mailwright::profile::{GithubMirror, JsonProfileStore, ProfileStore, SenderProfile};
use mailwright::transcribe::{OpenAiTranscriber, Transcriber};

/// Start an Axum server on a random port, return its base URL.
async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

// ── Transcription ────────────────────────────────────────────────────

#[derive(Default)]
struct TranscribeStub {
    auth: Mutex<Option<String>>,
    body: Mutex<Vec<u8>>,
}

async fn transcribe_handler(
    State(stub): State<Arc<TranscribeStub>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    *stub.auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    *stub.body.lock().unwrap() = body.to_vec();
    axum::Json(json!({ "text": "  to: Alice, follow up on the proposal  " }))
}

#[tokio::test]
async fn transcriber_posts_multipart_and_reads_text() {
    let stub = Arc::new(TranscribeStub::default());
    let app = Router::new()
        .route("/v1/audio/transcriptions", post(transcribe_handler))
        .with_state(Arc::clone(&stub));
    let base = serve(app).await;

    let transcriber = OpenAiTranscriber::new(SecretString::from("sk-test".to_string()))
        .with_base_url(format!("{base}/v1"));
    let text = transcriber
        .transcribe(b"RIFF fake wav".to_vec(), "memo.wav")
        .await
        .unwrap();

    assert_eq!(text, "to: Alice, follow up on the proposal");
    assert_eq!(stub.auth.lock().unwrap().as_deref(), Some("Bearer sk-test"));
    let body = String::from_utf8_lossy(&stub.body.lock().unwrap()).to_string();
    assert!(body.contains("gpt-4o-transcribe"));
    assert!(body.contains("filename=\"memo.wav\""));
    assert!(body.contains("RIFF fake wav"));
}

#[tokio::test]
async fn transcriber_surfaces_service_errors() {
    let app = Router::new().route(
        "/audio/transcriptions",
        post(|| async { (StatusCode::BAD_REQUEST, "unsupported format") }),
    );
    let base = serve(app).await;

    let transcriber =
        OpenAiTranscriber::new(SecretString::from("sk-test".to_string())).with_base_url(base);
    let err = transcriber
        .transcribe(vec![1, 2, 3], "memo.ogg")
        .await
        .unwrap_err();

    match err {
        TranscriptionError::Service { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "unsupported format");
        }
        other => panic!("Expected Service error, got {:?}", other),
    }
}

// ── GitHub mirror ───────────────────────────────────────────────────

#[derive(Default)]
struct GithubStub {
    existing_sha: Mutex<Option<String>>,
    puts: Mutex<Vec<Value>>,
    fail_puts: bool,
}

async fn get_contents(State(stub): State<Arc<GithubStub>>) -> impl IntoResponse {
    match stub.existing_sha.lock().unwrap().clone() {
        Some(sha) => (StatusCode::OK, axum::Json(json!({ "sha": sha }))),
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(json!({ "message": "Not Found" })),
        ),
    }
}

async fn put_contents(
    State(stub): State<Arc<GithubStub>>,
    axum::Json(body): axum::Json<Value>,
) -> impl IntoResponse {
    if stub.fail_puts {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({ "message": "boom" })),
        );
    }
    stub.puts.lock().unwrap().push(body);
    *stub.existing_sha.lock().unwrap() = Some("sha-2".to_string());
    (StatusCode::OK, axum::Json(json!({ "content": {} })))
}

async fn github_stub(stub: Arc<GithubStub>) -> String {
    let app = Router::new()
        .route(
            "/repos/{owner}/{repo}/contents/{*path}",
            get(get_contents).put(put_contents),
        )
        .with_state(stub);
    serve(app).await
}

fn mirror(base: &str) -> GithubMirror {
    GithubMirror::new(
        SecretString::from("ghp-test".to_string()),
        "me/profiles",
        "data/user_profiles.json",
    )
    .with_api_base(base)
}

fn decode(put: &Value) -> Value {
    let encoded = put["content"].as_str().unwrap();
    let raw = BASE64_STANDARD.decode(encoded).unwrap();
    serde_json::from_slice(&raw).unwrap()
}

#[tokio::test]
async fn mirror_creates_then_updates_file() {
    let stub = Arc::new(GithubStub::default());
    let base = github_stub(Arc::clone(&stub)).await;
    let dir = tempfile::TempDir::new().unwrap();
    let store = JsonProfileStore::new(dir.path().join("profiles.json")).with_mirror(mirror(&base));

    let profile = SenderProfile {
        name: "Manasa".into(),
        ..Default::default()
    };
    store.put("default", &profile).await.unwrap();
    store.put("second", &profile).await.unwrap();

    let puts = stub.puts.lock().unwrap();
    assert_eq!(puts.len(), 2);

    assert!(puts[0].get("sha").is_none());
    assert!(puts[0]["message"].as_str().unwrap().starts_with("Create"));
    assert_eq!(decode(&puts[0])["default"]["name"], "Manasa");

    assert_eq!(puts[1]["sha"], "sha-2");
    assert!(puts[1]["message"].as_str().unwrap().starts_with("Update"));
    assert!(decode(&puts[1]).get("second").is_some());
}

#[tokio::test]
async fn mirror_failure_does_not_fail_local_save() {
    let stub = Arc::new(GithubStub {
        fail_puts: true,
        ..Default::default()
    });
    let base = github_stub(Arc::clone(&stub)).await;
    let dir = tempfile::TempDir::new().unwrap();
    let store = JsonProfileStore::new(dir.path().join("profiles.json")).with_mirror(mirror(&base));

    let profile = SenderProfile {
        name: "Bo".into(),
        ..Default::default()
    };
    store.put("default", &profile).await.unwrap();

    assert_eq!(store.get("default").await.unwrap().name, "Bo");
    assert!(stub.puts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn mirror_push_reports_errors_directly() {
    let stub = Arc::new(GithubStub {
        fail_puts: true,
        ..Default::default()
    });
    let base = github_stub(stub).await;
    assert!(mirror(&base).push("{}").await.is_err());
}
