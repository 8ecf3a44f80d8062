use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

use super::engine::{CheckpointEngine, CheckpointReport, PushOutcome};
use super::state::{DaemonState, StateStore};
use crate::config::{Config, ExpiryPolicy};
use crate::credentials::{CredentialActivator, CredentialSession, CredentialSource, ProviderRegistry};
use crate::error::CheckpointError;
use crate::git::{BranchManager, CommandRunner, RemoteBinding, RemoteResolver};

/// Lifecycle of a daemon run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Polling,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The credential window closed
    WindowElapsed,
    /// A shutdown signal arrived between cycles
    Interrupted,
}

/// Progress through the current credential window
#[derive(Debug, Clone, Copy)]
struct PollState {
    started: Instant,
    cycles: u32,
}

impl PollState {
    fn starting_now() -> Self {
        Self {
            started: Instant::now(),
            cycles: 0,
        }
    }

    /// When the next cycle is due on the fixed schedule
    fn next_due(&self, interval: Duration) -> Instant {
        self.started + interval * (self.cycles + 1)
    }

    /// No further cycle fits in `window`, by schedule or by wall time
    fn window_closed(&self, interval: Duration, window: Duration) -> bool {
        interval * (self.cycles + 1) > window || Instant::now() >= self.started + window
    }
}

/// Totals for a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub attempts: u64,
    pub commits: u64,
    pub pushes: u64,
    pub failed_pushes: u64,
    pub stop_reason: StopReason,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            attempts: 0,
            commits: 0,
            pushes: 0,
            failed_pushes: 0,
            stop_reason: StopReason::WindowElapsed,
        }
    }

    fn record(&mut self, report: &CheckpointReport) {
        if report.commit.created {
            self.commits += 1;
        }
        match &report.push {
            Some(PushOutcome::Pushed { .. }) => self.pushes += 1,
            Some(PushOutcome::Failed { .. }) => self.failed_pushes += 1,
            None => {}
        }
    }
}

/// Drives setup and the bounded polling loop
pub struct Scheduler {
    config: Config,
    repo_root: PathBuf,
    runner: Arc<dyn CommandRunner>,
    activator: CredentialActivator,
    store: Option<StateStore>,
    phase: Phase,
}

impl Scheduler {
    pub fn new(
        config: Config,
        repo_root: PathBuf,
        runner: Arc<dyn CommandRunner>,
        source: Arc<dyn CredentialSource>,
        registry: ProviderRegistry,
    ) -> Self {
        let activator = CredentialActivator::new(runner.clone(), source, registry)
            .with_provider_override(config.provider.clone());

        Self {
            config,
            repo_root,
            runner,
            activator,
            store: None,
            phase: Phase::Initializing,
        }
    }

    /// Persist run state to `store` after every cycle
    pub fn with_state_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run setup, then poll until the credential window closes or `shutdown` resolves
    ///
    /// A cycle that has started always completes; `shutdown` is only
    /// observed while waiting for the next one, so a signal that arrives
    /// during setup takes effect once setup has finished.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<RunSummary, CheckpointError>
    where
        F: Future<Output = ()>,
    {
        self.transition(Phase::Initializing);

        let (remote, mut engine, mut state) = match self.prepare().await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.transition(Phase::Stopped);
                return Err(e);
            }
        };

        let session = match self.activate(&remote).await {
            Ok(session) => session,
            Err(e) => {
                self.transition(Phase::Stopped);
                return Err(e);
            }
        };
        state.update_session(session.cached_until);
        self.persist(&state);

        self.transition(Phase::Polling);

        let interval = self.config.push_interval();
        let window = self.config.password_timeout();
        let mut poll = PollState::starting_now();
        let mut summary = RunSummary::new();

        tokio::pin!(shutdown);

        loop {
            if poll.window_closed(interval, window) {
                match self.config.on_expiry {
                    ExpiryPolicy::Stop => {
                        tracing::info!("Credential window of {}s elapsed, stopping", window.as_secs());
                        summary.stop_reason = StopReason::WindowElapsed;
                        break;
                    }
                    ExpiryPolicy::Reactivate => {
                        tracing::info!("Credential window elapsed, activating credentials again");
                        match self.activate(&remote).await {
                            Ok(session) => {
                                state.update_session(session.cached_until);
                                self.persist(&state);
                                poll = PollState::starting_now();
                            }
                            Err(e) => {
                                self.transition(Phase::Stopped);
                                return Err(e);
                            }
                        }
                    }
                }
            }

            tokio::select! {
                _ = sleep_until(poll.next_due(interval)) => {}
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping between cycles");
                    summary.stop_reason = StopReason::Interrupted;
                    break;
                }
            }

            poll.cycles += 1;
            summary.attempts += 1;

            match engine.checkpoint().await {
                Ok(report) => {
                    log_report(&report);
                    summary.record(&report);
                }
                Err(e) => tracing::warn!("Checkpoint attempt failed: {}", e),
            }

            state.update_checked(engine.last_commit(), engine.last_pushed(), engine.pending_push());
            self.persist(&state);
        }

        self.transition(Phase::Stopped);
        tracing::info!(
            attempts = summary.attempts,
            commits = summary.commits,
            pushes = summary.pushes,
            "Checkpoint daemon stopped"
        );

        Ok(summary)
    }

    /// Run setup without credential activation and a single checkpoint cycle
    pub async fn checkpoint_once(&mut self) -> Result<CheckpointReport, CheckpointError> {
        self.transition(Phase::Initializing);
        let prepared = self.prepare().await;
        let (_, mut engine, mut state) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.transition(Phase::Stopped);
                return Err(e);
            }
        };

        self.transition(Phase::Polling);
        let report = engine.checkpoint().await;
        if let Ok(report) = &report {
            log_report(report);
        }
        state.update_checked(engine.last_commit(), engine.last_pushed(), engine.pending_push());
        self.persist(&state);
        self.transition(Phase::Stopped);

        report
    }

    /// Resolve the remote and get the checkpoint branch ready
    async fn prepare(&self) -> Result<(RemoteBinding, CheckpointEngine, DaemonState), CheckpointError> {
        let remote = RemoteResolver::new(self.runner.clone())
            .resolve(&self.config.remote)
            .await?;
        tracing::info!("Checkpoints go to {} ({})", remote.name, remote.url);

        let branches = BranchManager::new(self.runner.clone());
        branches.ensure(&self.config.branch).await?;

        let state = DaemonState::continue_from(
            self.load_state(),
            &self.repo_root,
            &self.config.remote,
            &self.config.branch,
        );

        if let Some(pending) = &state.pending_push {
            tracing::info!("Checkpoint {} from an earlier run is still waiting to be pushed", pending);
        }

        let engine = CheckpointEngine::new(self.runner.clone(), remote.clone(), &self.config.branch)
            .with_pending_push(state.pending_push.clone());

        Ok((remote, engine, state))
    }

    async fn activate(&self, remote: &RemoteBinding) -> Result<CredentialSession, CheckpointError> {
        let session = self
            .activator
            .activate(&remote.url, &self.config.branch, self.config.cache_timeout())
            .await?;

        tracing::info!(
            "Credentials for {} activated at {}, cached until {}",
            session.provider,
            session.activated_at.format("%H:%M:%S"),
            session.cached_until.format("%Y-%m-%d %H:%M:%S %Z")
        );
        Ok(session)
    }

    fn load_state(&self) -> Option<DaemonState> {
        let store = self.store.as_ref()?;
        match store.load() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Ignoring unreadable state: {:#}", e);
                None
            }
        }
    }

    fn persist(&self, state: &DaemonState) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(state) {
                tracing::warn!("Failed to save state: {:#}", e);
            }
        }
    }

    fn transition(&mut self, to: Phase) {
        tracing::debug!("Daemon phase {:?} -> {:?}", self.phase, to);
        self.phase = to;
    }
}

fn log_report(report: &CheckpointReport) {
    match (&report.commit.hash, &report.push) {
        (Some(hash), _) => tracing::info!("Created checkpoint {}", hash),
        (None, Some(_)) => tracing::debug!("No new changes, retried pending push"),
        (None, None) => tracing::debug!("No changes to checkpoint"),
    }
}
