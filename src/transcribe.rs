//! Speech-to-text for voice input.
//!
//! The transcript becomes the workflow's `raw_input`; nothing downstream
//! knows the text came from audio.

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::info;

use crate::error::TranscriptionError;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TRANSCRIBE_MODEL: &str = "gpt-4o-transcribe";

/// Turns recorded audio into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str)
    -> Result<String, TranscriptionError>;
}

/// Read an audio file from disk and transcribe it.
pub async fn transcribe_file(
    transcriber: &dyn Transcriber,
    path: &Path,
) -> Result<String, TranscriptionError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("audio.wav")
        .to_string();
    let audio = tokio::fs::read(path).await?;
    transcriber.transcribe(audio, &file_name).await
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// OpenAI `/audio/transcriptions` client.
pub struct OpenAiTranscriber {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiTranscriber {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: DEFAULT_TRANSCRIBE_MODEL.to_string(),
            base_url: OPENAI_API_BASE.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build from `OPENAI_API_KEY` and optional `MAILWRIGHT_TRANSCRIBE_MODEL`.
    pub fn from_env() -> Result<Self, crate::error::ConfigError> {
        let key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| crate::error::ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;
        let mut transcriber = Self::new(SecretString::from(key));
        if let Ok(model) = std::env::var("MAILWRIGHT_TRANSCRIBE_MODEL") {
            transcriber = transcriber.with_model(model);
        }
        Ok(transcriber)
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        file_name: &str,
    ) -> Result<String, TranscriptionError> {
        if audio.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }
        let size = audio.len();

        let part = Part::bytes(audio).file_name(file_name.to_string());
        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        let resp = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TranscriptionError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TranscriptionResponse = resp
            .json()
            .await
            .map_err(|e| TranscriptionError::RequestFailed(e.to_string()))?;
        let text = parsed.text.trim().to_string();

        info!(
            model = %self.model,
            bytes = size,
            chars = text.len(),
            "Transcribed audio"
        );
        Ok(text)
    }
}
