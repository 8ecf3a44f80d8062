use anyhow::{Context, Result};
use chrono::Duration;
use std::path::{Path, PathBuf};

use crate::config::{self, LoadedConfig};
use crate::git::{self, CommandRunner, GitRunner};

/// A loaded config and the repository it applies to
#[derive(Debug)]
pub struct Workspace {
    pub loaded: LoadedConfig,
    pub repo_root: PathBuf,
}

/// Load the config and find the repository around the current directory
///
/// The repository is whatever git reports for the current directory, so an
/// explicit `--config` path elsewhere does not move it.
pub async fn open_workspace(config_path: Option<&Path>) -> Result<Workspace> {
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let loaded = config::locate_and_load(config_path, &cwd)?;
    let runner = GitRunner::new(&cwd, loaded.config.command_timeout());
    resolve_workspace(loaded, &cwd, &runner).await
}

async fn resolve_workspace(loaded: LoadedConfig, cwd: &Path, runner: &dyn CommandRunner) -> Result<Workspace> {
    let repo_root = git::repo_root(runner, cwd).await?;
    tracing::debug!("Using config {} for repository {}", loaded.path.display(), repo_root.display());
    Ok(Workspace { loaded, repo_root })
}

/// Single-threaded runtime for the one-shot commands
pub fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

/// Initialize logging
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.num_seconds();
    if secs < 0 {
        format!("-{}", format_duration(-duration))
    } else if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}
