//! GitHub contents-API mirror for the profile file.
//!
//! Every local save is pushed as a commit to `owner/repo` at a fixed path so
//! profiles survive ephemeral hosts. Mirror failures never fail a save.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::ProfileError;

const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    sha: String,
}

/// Pushes the serialized profile file to a GitHub repository.
pub struct GithubMirror {
    client: reqwest::Client,
    token: SecretString,
    repo: String,
    path: String,
    api_base: String,
}

impl GithubMirror {
    pub fn new(token: SecretString, repo: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            repo: repo.into(),
            path: path.into(),
            api_base: GITHUB_API.to_string(),
        }
    }

    /// Point at a different API host (GitHub Enterprise, local stubs).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.api_base,
            self.repo,
            self.path.trim_start_matches('/')
        )
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.contents_url())
            .bearer_auth(self.token.expose_secret())
            .header(reqwest::header::USER_AGENT, "mailwright")
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    /// Current blob sha of the mirrored file, or `None` if it doesn't exist yet.
    async fn current_sha(&self) -> Result<Option<String>, ProfileError> {
        let resp = self
            .request(reqwest::Method::GET)
            .send()
            .await
            .map_err(|e| ProfileError::Mirror(e.to_string()))?;

        match resp.status() {
            s if s.is_success() => {
                let entry: ContentsEntry = resp
                    .json()
                    .await
                    .map_err(|e| ProfileError::Mirror(e.to_string()))?;
                Ok(Some(entry.sha))
            }
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(ProfileError::Mirror(format!(
                    "GET {} returned {status}: {body}",
                    self.path
                )))
            }
        }
    }

    /// Create or update the mirrored file with `content`.
    pub async fn push(&self, content: &str) -> Result<(), ProfileError> {
        let sha = self.current_sha().await?;
        let message = match sha {
            Some(_) => format!("Update {}", self.path),
            None => format!("Create {}", self.path),
        };

        let mut body = json!({
            "message": message,
            "content": BASE64_STANDARD.encode(content),
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }

        let resp = self
            .request(reqwest::Method::PUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProfileError::Mirror(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ProfileError::Mirror(format!(
                "PUT {} returned {status}: {err}",
                self.path
            )));
        }

        debug!(repo = %self.repo, path = %self.path, "Mirrored profiles to GitHub");
        Ok(())
    }
}
