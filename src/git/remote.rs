use std::sync::Arc;

use super::CommandRunner;
use crate::error::CheckpointError;

/// A logical remote name and the URL it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBinding {
    pub name: String,
    pub url: String,
}

/// Looks up remote URLs from `git remote -v`
pub struct RemoteResolver {
    runner: Arc<dyn CommandRunner>,
}

impl RemoteResolver {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Resolve `name` to its configured URL
    pub async fn resolve(&self, name: &str) -> Result<RemoteBinding, CheckpointError> {
        let output = self.runner.run_checked(&["remote", "-v"]).await?;

        let url = find_remote_url(&output.text(), name)
            .ok_or_else(|| CheckpointError::RemoteNotConfigured(name.to_string()))?;

        tracing::debug!("Remote {} resolves to {}", name, url);

        Ok(RemoteBinding {
            name: name.to_string(),
            url,
        })
    }
}

/// First URL bound to `name` in a `git remote -v` listing
///
/// Lines look like `origin\thttps://host/repo.git (fetch)`; the name must
/// match the first token exactly.
pub fn find_remote_url(listing: &str, name: &str) -> Option<String> {
    listing.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        if fields.next()? != name {
            return None;
        }
        fields.next().map(str::to_string)
    })
}
