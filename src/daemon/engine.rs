use regex::Regex;
use std::sync::{Arc, LazyLock};

use crate::error::CheckpointError;
use crate::git::{CommandRunner, RemoteBinding};

/// Commit message that marks automatic checkpoints in history
pub const CHECKPOINT_MESSAGE: &str = "Anti eneo auto-save";

/// Object name printed by `git commit-tree`
static COMMIT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9a-f]{5,40})$").expect("commit id pattern is valid")
});

/// Hash of the commit reported on the first line of `git commit-tree` output
pub fn parse_commit_hash(output: &str) -> Option<String> {
    let first = output.lines().next()?.trim();
    COMMIT_ID
        .captures(first)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Outcome of one commit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    pub hash: Option<String>,
    pub created: bool,
}

impl CommitResult {
    pub fn nothing() -> Self {
        Self {
            hash: None,
            created: false,
        }
    }

    pub fn created(hash: String) -> Self {
        Self {
            hash: Some(hash),
            created: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed { hash: String },
    Failed { hash: String, reason: String },
}

/// What one checkpoint cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointReport {
    pub commit: CommitResult,
    /// `None` when there was nothing to push
    pub push: Option<PushOutcome>,
}

/// Commits the working tree onto the checkpoint branch and pushes it
///
/// The commit is assembled with plumbing (`stash create`, `commit-tree`,
/// `update-ref`), so HEAD, the index and the checked-out branch are never
/// touched. Like `commit -a`, only tracked files are captured.
pub struct CheckpointEngine {
    runner: Arc<dyn CommandRunner>,
    remote: RemoteBinding,
    branch: String,
    last_commit: Option<String>,
    last_pushed: Option<String>,
    pending_push: Option<String>,
}

impl CheckpointEngine {
    pub fn new(runner: Arc<dyn CommandRunner>, remote: RemoteBinding, branch: &str) -> Self {
        Self {
            runner,
            remote,
            branch: branch.to_string(),
            last_commit: None,
            last_pushed: None,
            pending_push: None,
        }
    }

    /// Resume a push that failed in an earlier run
    pub fn with_pending_push(mut self, pending: Option<String>) -> Self {
        self.pending_push = pending;
        self
    }

    pub fn last_commit(&self) -> Option<&str> {
        self.last_commit.as_deref()
    }

    pub fn last_pushed(&self) -> Option<&str> {
        self.last_pushed.as_deref()
    }

    pub fn pending_push(&self) -> Option<&str> {
        self.pending_push.as_deref()
    }

    /// Run one checkpoint cycle
    ///
    /// Pushes when a commit was created, and also when an earlier push has
    /// not gone through yet. Push failures are reported in the result, not
    /// returned as errors.
    pub async fn checkpoint(&mut self) -> Result<CheckpointReport, CheckpointError> {
        let commit = self.commit().await?;

        if let Some(hash) = &commit.hash {
            self.last_commit = Some(hash.clone());
            self.pending_push = Some(hash.clone());
        }

        let push = match self.pending_push.clone() {
            Some(hash) => Some(self.push(hash).await),
            None => None,
        };

        Ok(CheckpointReport { commit, push })
    }

    async fn commit(&self) -> Result<CommitResult, CheckpointError> {
        let branch_ref = format!("refs/heads/{}", self.branch);

        // Empty output means the tracked files match HEAD.
        let stash = self.runner.run_checked(&["stash", "create"]).await?;
        let snapshot = match stash.text().trim() {
            "" => "HEAD".to_string(),
            id => id.to_string(),
        };

        let parent = self.rev_parse(&branch_ref).await?;
        let tree = self.rev_parse(&format!("{snapshot}^{{tree}}")).await?;
        let parent_tree = self.rev_parse(&format!("{parent}^{{tree}}")).await?;

        if tree == parent_tree {
            tracing::debug!("Nothing to checkpoint: {} already matches the working tree", self.branch);
            return Ok(CommitResult::nothing());
        }

        let created = self
            .runner
            .run_checked(&["commit-tree", tree.as_str(), "-p", parent.as_str(), "-m", CHECKPOINT_MESSAGE])
            .await?;

        let Some(hash) = parse_commit_hash(&created.text()) else {
            tracing::warn!("Unexpected commit-tree output: {}", created.text().trim());
            return Ok(CommitResult::nothing());
        };

        self.runner
            .run_checked(&["update-ref", branch_ref.as_str(), hash.as_str(), parent.as_str()])
            .await?;

        Ok(CommitResult::created(hash))
    }

    async fn rev_parse(&self, rev: &str) -> Result<String, CheckpointError> {
        let output = self.runner.run_checked(&["rev-parse", "--verify", rev]).await?;
        Ok(output.text().trim().to_string())
    }

    async fn push(&mut self, hash: String) -> PushOutcome {
        match self
            .runner
            .run_checked(&["push", self.remote.name.as_str(), self.branch.as_str()])
            .await
        {
            Ok(_) => {
                tracing::info!("Pushed checkpoint {} to {}/{}", hash, self.remote.name, self.branch);
                self.last_pushed = Some(hash.clone());
                self.pending_push = None;
                PushOutcome::Pushed { hash }
            }
            Err(e) => {
                tracing::warn!("Push of checkpoint {} failed, will retry next cycle: {}", hash, e);
                PushOutcome::Failed {
                    hash,
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testing::FakeGit;

    fn engine(git: &Arc<FakeGit>) -> CheckpointEngine {
        let remote = RemoteBinding {
            name: "origin".to_string(),
            url: "https://github.example/user/repo.git".to_string(),
        };
        CheckpointEngine::new(git.clone(), remote, "checkpoints")
    }

    fn checkpoint_git() -> Arc<FakeGit> {
        Arc::new(FakeGit::new().with_branch("checkpoints"))
    }

    fn push_args(git: &FakeGit) -> Vec<Vec<String>> {
        git.calls_to("push")
    }

    #[test]
    fn parses_commit_tree_output() {
        let full = "0123456789abcdef0123456789abcdef01234567";
        assert_eq!(parse_commit_hash(&format!("{full}\n")).as_deref(), Some(full));
        assert_eq!(parse_commit_hash("1a2b3c4").as_deref(), Some("1a2b3c4"));
    }

    #[test]
    fn no_hash_in_error_output() {
        assert_eq!(parse_commit_hash("fatal: not a valid object name abc\n"), None);
        assert_eq!(parse_commit_hash(""), None);
    }

    #[test]
    fn short_or_non_hex_tokens_are_ignored() {
        assert_eq!(parse_commit_hash("abcd"), None);
        assert_eq!(parse_commit_hash("xyz1234"), None);
        assert_eq!(parse_commit_hash("[main 1a2b3c4] msg"), None);
    }

    #[tokio::test]
    async fn created_commit_lands_on_checkpoint_branch_and_is_pushed() {
        let git = checkpoint_git();
        git.edit_worktree();
        let mut engine = engine(&git);

        let report = engine.checkpoint().await.unwrap();

        let tip = git.branch_tip("checkpoints").unwrap();
        assert_eq!(report.commit, CommitResult::created(tip.clone()));
        assert_eq!(report.push, Some(PushOutcome::Pushed { hash: tip.clone() }));
        assert_eq!(push_args(&git), vec![vec!["push".to_string(), "origin".to_string(), "checkpoints".to_string()]]);
        assert_eq!(engine.last_pushed(), Some(tip.as_str()));

        let commits = git.calls_to("commit-tree");
        assert_eq!(commits[0][4..], ["-m".to_string(), CHECKPOINT_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn user_branch_and_head_are_left_alone() {
        let git = checkpoint_git();
        let main_before = git.branch_tip("main");
        git.edit_worktree();
        let mut engine = engine(&git);

        engine.checkpoint().await.unwrap();

        assert_eq!(git.branch_tip("main"), main_before);
        assert_ne!(git.branch_tip("checkpoints"), main_before);
        assert_eq!(git.current_branch(), "main");
        assert!(git.calls_to("commit").is_empty());
        assert!(git.calls_to("checkout").is_empty());
    }

    #[tokio::test]
    async fn nothing_to_commit_skips_push() {
        let git = checkpoint_git();
        let mut engine = engine(&git);

        let report = engine.checkpoint().await.unwrap();

        assert_eq!(report.commit, CommitResult::nothing());
        assert_eq!(report.push, None);
        assert!(push_args(&git).is_empty());
        assert!(git.calls_to("commit-tree").is_empty());
    }

    #[tokio::test]
    async fn unchanged_tree_after_a_checkpoint_is_nothing_to_commit() {
        let git = checkpoint_git();
        git.edit_worktree();
        let mut engine = engine(&git);

        assert!(engine.checkpoint().await.unwrap().commit.created);
        let second = engine.checkpoint().await.unwrap();

        assert_eq!(second.commit, CommitResult::nothing());
        assert_eq!(git.calls_to("commit-tree").len(), 1);
    }

    #[tokio::test]
    async fn checkpoints_chain_on_the_branch_tip() {
        let git = checkpoint_git();
        let mut engine = engine(&git);

        git.edit_worktree();
        engine.checkpoint().await.unwrap();
        let first = git.branch_tip("checkpoints").unwrap();

        git.edit_worktree();
        engine.checkpoint().await.unwrap();

        let commits = git.calls_to("commit-tree");
        assert_eq!(commits[1][3], first);
        assert_eq!(engine.last_commit(), git.branch_tip("checkpoints").as_deref());
    }

    #[tokio::test]
    async fn failed_push_is_retried_without_new_commit() {
        let git = checkpoint_git();
        git.edit_worktree();
        git.fail_next_pushes(1);
        let mut engine = engine(&git);

        let first = engine.checkpoint().await.unwrap();
        let hash = git.branch_tip("checkpoints").unwrap();
        assert!(matches!(first.push, Some(PushOutcome::Failed { hash: ref h, .. }) if *h == hash));
        assert_eq!(engine.pending_push(), Some(hash.as_str()));
        assert_eq!(engine.last_pushed(), None);

        let second = engine.checkpoint().await.unwrap();
        assert!(!second.commit.created);
        assert_eq!(second.push, Some(PushOutcome::Pushed { hash: hash.clone() }));
        assert_eq!(engine.pending_push(), None);

        let third = engine.checkpoint().await.unwrap();
        assert_eq!(third.push, None);
        assert_eq!(push_args(&git).len(), 2);
    }

    #[tokio::test]
    async fn timed_out_snapshot_is_an_error() {
        let git = checkpoint_git();
        git.edit_worktree();
        git.time_out_next_snapshots(1);
        let mut engine = engine(&git);

        let err = engine.checkpoint().await.unwrap_err();

        assert!(matches!(err, CheckpointError::CommandTimedOut { .. }));
        assert!(push_args(&git).is_empty());
        assert!(engine.checkpoint().await.unwrap().commit.created);
    }

    #[tokio::test]
    async fn pending_push_from_earlier_run_is_resumed() {
        let git = checkpoint_git();
        let mut engine = engine(&git).with_pending_push(Some("abc1234".to_string()));

        let report = engine.checkpoint().await.unwrap();

        assert_eq!(report.push, Some(PushOutcome::Pushed { hash: "abc1234".to_string() }));
        assert_eq!(engine.last_commit(), None);
    }
}
