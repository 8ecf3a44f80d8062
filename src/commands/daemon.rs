use anyhow::Result;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use crate::credentials::{EnvCredentials, ProviderRegistry, TerminalPrompt};
use crate::daemon::{PushOutcome, Scheduler, StateStore, StopReason};
use crate::git::GitRunner;

use super::utils::{Workspace, build_runtime, init_logging, open_workspace};

/// Run the checkpoint daemon in the foreground
pub fn run(config_path: Option<&Path>, verbose: bool) -> Result<()> {
    init_logging(verbose);

    let runtime = build_runtime()?;
    let workspace = runtime.block_on(open_workspace(config_path))?;
    let mut scheduler = build_scheduler(&workspace)?;
    let config = &workspace.loaded.config;

    println!("Anti-eneo checkpoint daemon");
    println!("Version:    {}", env!("CARGO_PKG_VERSION"));
    println!("Config:     {}", workspace.loaded.path.display());
    println!("Repository: {}", workspace.repo_root.display());
    println!(
        "Checkpointing to {}/{} every {} seconds for up to {} seconds",
        config.remote, config.branch, config.push_interval, config.password_timeout,
    );
    println!();

    let summary = runtime.block_on(async {
        // Installed before the credential prompt so Ctrl+C there is caught
        // and the terminal gets its echo back.
        let shutdown = shutdown_signal();
        scheduler.run(shutdown).await
    })?;

    println!();
    match summary.stop_reason {
        StopReason::WindowElapsed => println!("✓ Credential window elapsed"),
        StopReason::Interrupted => println!("✓ Stopped on request"),
    }
    println!(
        "  {} attempts, {} commits, {} pushed, {} failed pushes",
        summary.attempts, summary.commits, summary.pushes, summary.failed_pushes
    );

    Ok(())
}

/// Make one checkpoint now without activating credentials
pub fn check_now(config_path: Option<&Path>, verbose: bool) -> Result<()> {
    init_logging(verbose);

    let runtime = build_runtime()?;
    let workspace = runtime.block_on(open_workspace(config_path))?;
    let mut scheduler = build_scheduler(&workspace)?;

    println!("Making a checkpoint...");

    let report = runtime.block_on(async { scheduler.checkpoint_once().await })?;

    match (&report.commit.hash, report.commit.created) {
        (Some(hash), true) => println!("✓ Committed {}", hash),
        _ => println!("✓ Nothing to commit"),
    }

    match report.push {
        Some(PushOutcome::Pushed { hash }) => println!("✓ Pushed {}", hash),
        Some(PushOutcome::Failed { hash, reason }) => {
            println!("✗ Push of {} failed: {}", hash, reason);
            println!("  It will be retried by the next checkpoint.");
        }
        None => {}
    }

    Ok(())
}

fn build_scheduler(workspace: &Workspace) -> Result<Scheduler> {
    let config = &workspace.loaded.config;
    let runner = Arc::new(GitRunner::new(&workspace.repo_root, config.command_timeout()));
    let source = Arc::new(EnvCredentials::new(TerminalPrompt));
    let store = StateStore::for_repo(&workspace.repo_root)?;

    Ok(Scheduler::new(
        config.clone(),
        workspace.repo_root.clone(),
        runner,
        source,
        ProviderRegistry::with_defaults(),
    )
    .with_state_store(store))
}

/// Listen for SIGINT and SIGTERM from now on
///
/// The listeners are registered immediately; the returned future resolves
/// on the first signal delivered after this call.
#[cfg(unix)]
fn shutdown_signal() -> impl Future<Output = ()> {
    use signal::unix::{Signal, SignalKind};

    fn listen(kind: SignalKind, name: &'static str) -> Option<Signal> {
        signal::unix::signal(kind)
            .inspect_err(|e| tracing::warn!("Failed to listen for {}: {}", name, e))
            .ok()
    }

    async fn received(listener: Option<Signal>) {
        match listener {
            Some(mut stream) => {
                stream.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    let interrupt = listen(SignalKind::interrupt(), "SIGINT");
    let terminate = listen(SignalKind::terminate(), "SIGTERM");

    async move {
        tokio::select! {
            () = received(interrupt) => tracing::info!("received SIGINT"),
            () = received(terminate) => tracing::info!("received SIGTERM"),
        }
    }
}

#[cfg(not(unix))]
fn shutdown_signal() -> impl Future<Output = ()> {
    async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("received Ctrl+C");
    }
}
