use std::sync::Arc;

use super::CommandRunner;
use crate::error::CheckpointError;

/// Bootstraps the checkpoint branch
pub struct BranchManager {
    runner: Arc<dyn CommandRunner>,
}

impl BranchManager {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Make sure `branch` exists locally, creating it at HEAD if needed
    ///
    /// Returns `true` when the branch was created by this call. The working
    /// tree is left on whatever branch it was on.
    pub async fn ensure(&self, branch: &str) -> Result<bool, CheckpointError> {
        let listing = self
            .runner
            .run_checked(&["branch", "--list", "--no-color"])
            .await?;

        if branch_listed(&listing.text(), branch) {
            tracing::debug!("Checkpoint branch {} already exists", branch);
            return Ok(false);
        }

        self.runner.run_checked(&["branch", branch]).await?;
        tracing::info!("Created checkpoint branch {}", branch);
        Ok(true)
    }

}

/// Whether `name` appears as a whole branch in `git branch --list` output
pub fn branch_listed(listing: &str, name: &str) -> bool {
    listing.lines().any(|line| {
        line.trim_start_matches(['*', '+', ' '])
            .split_whitespace()
            .next()
            == Some(name)
    })
}
