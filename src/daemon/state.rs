use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Current state version
const STATE_VERSION: &str = "1.0";

/// Record of the daemon's activity in one repository
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DaemonState {
    /// State version
    pub version: String,

    /// Identifier of the daemon run that last wrote this state
    pub run_id: String,

    pub repo_root: PathBuf,
    pub remote: String,
    pub branch: String,

    /// When the current run started
    pub started_at: DateTime<Utc>,

    /// End of the credential window of the current run
    pub cached_until: Option<DateTime<Utc>>,

    /// Last poll cycle
    pub last_checked: Option<DateTime<Utc>>,

    /// Last checkpoint commit created
    pub last_commit: Option<String>,

    /// Last checkpoint commit that reached the remote
    pub last_pushed: Option<String>,

    /// Commit whose push has not succeeded yet
    pub pending_push: Option<String>,
}

impl DaemonState {
    /// Fresh state for a new daemon run
    pub fn new(repo_root: &Path, remote: &str, branch: &str) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            run_id: Uuid::new_v4().to_string(),
            repo_root: repo_root.to_path_buf(),
            remote: remote.to_string(),
            branch: branch.to_string(),
            started_at: Utc::now(),
            cached_until: None,
            last_checked: None,
            last_commit: None,
            last_pushed: None,
            pending_push: None,
        }
    }

    /// Start a new run, keeping commit bookkeeping from a previous one
    pub fn continue_from(previous: Option<DaemonState>, repo_root: &Path, remote: &str, branch: &str) -> Self {
        let mut state = Self::new(repo_root, remote, branch);
        if let Some(previous) = previous {
            if previous.remote == remote && previous.branch == branch {
                state.last_commit = previous.last_commit;
                state.last_pushed = previous.last_pushed;
                state.pending_push = previous.pending_push;
            }
        }
        state
    }

    pub fn update_session(&mut self, cached_until: DateTime<Utc>) {
        self.cached_until = Some(cached_until);
    }

    /// Record the engine's bookkeeping after a poll cycle
    pub fn update_checked(&mut self, last_commit: Option<&str>, last_pushed: Option<&str>, pending_push: Option<&str>) {
        self.last_checked = Some(Utc::now());
        if let Some(commit) = last_commit {
            self.last_commit = Some(commit.to_string());
        }
        if let Some(pushed) = last_pushed {
            self.last_pushed = Some(pushed.to_string());
        }
        self.pending_push = pending_push.map(str::to_string);
    }
}

/// Where a repository's [`DaemonState`] lives on disk
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    #[cfg(test)]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Per-user store for the repository at `repo_root`
    pub fn for_repo(repo_root: &Path) -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "anti-eneo")
            .context("Could not determine a data directory for state files")?;

        let mut path = dirs.data_local_dir().to_path_buf();
        path.push("state");
        path.push(format!("{}.json", repo_key(repo_root)));

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load state, treating a missing file or unknown version as no state
    pub fn load(&self) -> Result<Option<DaemonState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;

        let state: DaemonState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))?;

        if state.version != STATE_VERSION {
            tracing::warn!(
                "State file version mismatch (expected {}, got {}). Treating as new state.",
                STATE_VERSION,
                state.version
            );
            return Ok(None);
        }

        Ok(Some(state))
    }

    pub fn save(&self, state: &DaemonState) -> Result<()> {
        let content = serde_json::to_string_pretty(state).context("Failed to serialize state")?;

        crate::platform::common::atomic_write(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))
    }
}

/// Stable file name for a repository path
fn repo_key(repo_root: &Path) -> String {
    let canonical = repo_root
        .canonicalize()
        .unwrap_or_else(|_| repo_root.to_path_buf());

    let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}
