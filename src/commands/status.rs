use anyhow::Result;
use chrono::Utc;
use std::path::Path;

use crate::config::ExpiryPolicy;
use crate::daemon::StateStore;

use super::utils::{build_runtime, format_duration, init_logging, open_workspace};

/// Show configuration and the last recorded daemon activity
pub fn status(config_path: Option<&Path>, verbose: bool) -> Result<()> {
    init_logging(verbose);
    println!("Anti-eneo Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let workspace = build_runtime()?.block_on(open_workspace(config_path))?;
    let config = &workspace.loaded.config;

    println!("Config:        {}", workspace.loaded.path.display());
    println!("Repository:    {}", workspace.repo_root.display());
    println!("Remote:        {}", config.remote);
    println!("Branch:        {}", config.branch);
    println!("Push interval: {} seconds", config.push_interval);
    println!(
        "Credentials:   {} second window, cached for {} seconds",
        config.password_timeout,
        config.cache_timeout().as_secs()
    );
    println!(
        "On expiry:     {}",
        match config.on_expiry {
            ExpiryPolicy::Stop => "stop",
            ExpiryPolicy::Reactivate => "reactivate",
        }
    );

    let store = StateStore::for_repo(&workspace.repo_root)?;
    println!("State file:    {}", store.path().display());
    match store.load()? {
        Some(state) => {
            println!();
            println!("Last run:      {} (started {})", state.run_id, state.started_at.format("%Y-%m-%d %H:%M:%S %Z"));

            if let Some(cached_until) = state.cached_until {
                let left = cached_until - Utc::now();
                if left > chrono::Duration::zero() {
                    println!("Cached until:  {} ({} left)",
                        cached_until.format("%Y-%m-%d %H:%M:%S %Z"),
                        format_duration(left));
                } else {
                    println!("Cached until:  {} (expired)", cached_until.format("%Y-%m-%d %H:%M:%S %Z"));
                }
            }

            if let Some(last_checked) = state.last_checked {
                let ago = Utc::now() - last_checked;
                println!("Last checked:  {} ({} ago)",
                    last_checked.format("%Y-%m-%d %H:%M:%S %Z"),
                    format_duration(ago));
            }

            println!("Last commit:   {}", state.last_commit.as_deref().unwrap_or("none"));
            println!("Last pushed:   {}", state.last_pushed.as_deref().unwrap_or("none"));
            if let Some(pending) = state.pending_push {
                println!("Pending push:  {}", pending);
            }
        }
        None => {
            println!();
            println!("Status: Not yet run (no state file)");
        }
    }

    Ok(())
}
