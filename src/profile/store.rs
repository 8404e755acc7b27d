//! Keyed load/save of sender profiles.
//!
//! The workflow engine never touches this directly: callers load a profile,
//! hand it to the orchestrator inside a `DraftRequest`, and optionally record
//! the finished draft back into the profile history.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::ProfileError;
use crate::profile::github::GithubMirror;
use crate::profile::model::{SenderProfile, SentExample};
use crate::workflow::state::EmailDraft;

/// Default user id (single-user deployments).
pub const DEFAULT_USER: &str = "default";

/// Keyed profile storage.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load a profile; a missing one is the empty profile.
    async fn get(&self, user_id: &str) -> Result<SenderProfile, ProfileError>;

    /// Insert or replace a profile.
    async fn put(&self, user_id: &str, profile: &SenderProfile) -> Result<(), ProfileError>;

    /// Read-modify-write a profile and return the stored result.
    ///
    /// The default is a plain `get` then `put` and is not atomic; both
    /// stores here override it to hold their write lock throughout.
    async fn update(&self, user_id: &str, edit: ProfileEdit) -> Result<SenderProfile, ProfileError> {
        let mut profile = self.get(user_id).await?;
        edit(&mut profile);
        self.put(user_id, &profile).await?;
        Ok(profile)
    }
}

/// In-place change applied by [`ProfileStore::update`].
pub type ProfileEdit = Box<dyn FnOnce(&mut SenderProfile) + Send>;

/// Append a finished draft to the user's sent history.
pub async fn record_sent(
    store: &dyn ProfileStore,
    user_id: &str,
    draft: &EmailDraft,
) -> Result<(), ProfileError> {
    let example = SentExample::from(draft.clone());
    let profile = store
        .update(user_id, Box::new(move |p: &mut SenderProfile| p.sent_examples.push(example)))
        .await?;
    info!(
        user_id = user_id,
        history = profile.sent_examples.len(),
        "Saved draft to profile history"
    );
    Ok(())
}

// ── In-memory store ─────────────────────────────────────────────────

/// Process-local store, for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, SenderProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, user_id: &str) -> Result<SenderProfile, ProfileError> {
        Ok(self
            .profiles
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put(&self, user_id: &str, profile: &SenderProfile) -> Result<(), ProfileError> {
        self.profiles
            .write()
            .await
            .insert(user_id.to_string(), profile.clone());
        Ok(())
    }

    async fn update(&self, user_id: &str, edit: ProfileEdit) -> Result<SenderProfile, ProfileError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles.entry(user_id.to_string()).or_default();
        edit(profile);
        Ok(profile.clone())
    }
}

// ── JSON file store ─────────────────────────────────────────────────

/// All profiles in one pretty-printed JSON object, `user_id -> profile`.
///
/// Writes go to a temp file that is renamed over the original, so readers
/// never see a half-written file. Optionally mirrors every save to GitHub.
pub struct JsonProfileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    mirror: Option<GithubMirror>,
}

impl JsonProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            mirror: None,
        }
    }

    pub fn with_mirror(mut self, mirror: GithubMirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_all(&self) -> Result<BTreeMap<String, SenderProfile>, ProfileError> {
        if !fs::try_exists(&self.path).await? {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path).await?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| ProfileError::Corrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    async fn save_all(&self, profiles: &BTreeMap<String, SenderProfile>) -> Result<String, ProfileError> {
        let content = serde_json::to_string_pretty(profiles)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &content).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(content)
    }

    /// Save under the write lock, then push to the mirror if one is set.
    async fn commit(&self, profiles: &BTreeMap<String, SenderProfile>) -> Result<(), ProfileError> {
        let content = self.save_all(profiles).await?;
        if let Some(ref mirror) = self.mirror {
            // The local save already succeeded; a mirror failure is only logged.
            if let Err(e) = mirror.push(&content).await {
                warn!(error = %e, "Profile mirror sync failed");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for JsonProfileStore {
    async fn get(&self, user_id: &str) -> Result<SenderProfile, ProfileError> {
        let profiles = self.load_all().await?;
        debug!(user_id = user_id, found = profiles.contains_key(user_id), "Loaded profile");
        Ok(profiles.get(user_id).cloned().unwrap_or_default())
    }

    async fn put(&self, user_id: &str, profile: &SenderProfile) -> Result<(), ProfileError> {
        let _guard = self.write_lock.lock().await;
        let mut profiles = self.load_all().await?;
        profiles.insert(user_id.to_string(), profile.clone());
        self.commit(&profiles).await
    }

    async fn update(&self, user_id: &str, edit: ProfileEdit) -> Result<SenderProfile, ProfileError> {
        let _guard = self.write_lock.lock().await;
        let mut profiles = self.load_all().await?;
        let profile = profiles.entry(user_id.to_string()).or_default();
        edit(profile);
        let updated = profile.clone();
        self.commit(&profiles).await?;
        Ok(updated)
    }
}

// ── Configuration ───────────────────────────────────────────────────

/// Where profiles live.
#[derive(Debug, Clone)]
pub struct ProfileConfig {
    pub path: PathBuf,
    pub user_id: String,
    /// `(token, owner/repo, path in repo)` when mirroring is enabled.
    pub github: Option<(secrecy::SecretString, String, String)>,
}

impl ProfileConfig {
    pub fn from_env() -> Self {
        let path = std::env::var("MAILWRIGHT_PROFILE_PATH")
            .unwrap_or_else(|_| "./data/user_profiles.json".to_string());
        let user_id =
            std::env::var("MAILWRIGHT_USER").unwrap_or_else(|_| DEFAULT_USER.to_string());

        let github = match (
            std::env::var("MAILWRIGHT_GITHUB_TOKEN"),
            std::env::var("MAILWRIGHT_GITHUB_REPO"),
        ) {
            (Ok(token), Ok(repo)) if !token.is_empty() && !repo.is_empty() => {
                let repo_path = std::env::var("MAILWRIGHT_GITHUB_PATH")
                    .unwrap_or_else(|_| "data/user_profiles.json".to_string());
                Some((secrecy::SecretString::from(token), repo, repo_path))
            }
            _ => None,
        };

        Self {
            path: PathBuf::from(path),
            user_id,
            github,
        }
    }

    /// Build the JSON store described by this config.
    pub fn open(&self) -> JsonProfileStore {
        let store = JsonProfileStore::new(&self.path);
        match &self.github {
            Some((token, repo, repo_path)) => {
                store.with_mirror(GithubMirror::new(token.clone(), repo, repo_path))
            }
            None => store,
        }
    }
}
