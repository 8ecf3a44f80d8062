use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CheckpointError;

/// Config file names searched in each directory, in order of preference
pub const CONFIG_FILE_NAMES: [&str; 4] = [
    "anti_eneo.json",
    "anti_eneo.yaml",
    "anti_eneo.yml",
    "anti_eneo.toml",
];

const DEFAULT_COMMAND_TIMEOUT: u64 = 120;

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Name of the git remote checkpoints are pushed to
    pub remote: String,

    /// Dedicated branch that accumulates checkpoints
    pub branch: String,

    /// Seconds git keeps credentials cached after activation
    pub password_timeout: u64,

    /// Seconds between two poll cycles
    pub push_interval: u64,

    /// What to do once the credential window has elapsed
    #[serde(default)]
    pub on_expiry: ExpiryPolicy,

    /// Seconds before a git invocation is killed (0 disables the limit)
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,

    /// Force a credential handler instead of deriving it from the remote host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// Stop the daemon when the window closes
    #[default]
    Stop,
    /// Prompt again and start a new window
    Reactivate,
}

fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT
}

impl Config {
    pub fn password_timeout(&self) -> Duration {
        Duration::from_secs(self.password_timeout)
    }

    pub fn push_interval(&self) -> Duration {
        Duration::from_secs(self.push_interval)
    }

    /// How long git's credential cache keeps the activated credentials
    ///
    /// The last cycle of a window starts right at its end, so the cache
    /// outlives the window by one interval to cover that cycle's push.
    pub fn cache_timeout(&self) -> Duration {
        self.password_timeout() + self.push_interval()
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout > 0).then(|| Duration::from_secs(self.command_timeout))
    }
}

/// A validated config together with where it was found
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
}

/// Search `start` and each of its ancestors for a config file
///
/// The search stops at the filesystem root.
pub fn discover_config(start: &Path) -> Result<PathBuf, CheckpointError> {
    for dir in start.ancestors() {
        for name in CONFIG_FILE_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                tracing::debug!("Found config file: {}", candidate.display());
                return Ok(candidate);
            }
        }
    }

    Err(CheckpointError::ConfigNotFound {
        start: start.to_path_buf(),
        names: CONFIG_FILE_NAMES.join(", "),
    })
}

/// Load and validate a config file, choosing the format by extension
pub fn load_config(path: &Path) -> Result<Config, CheckpointError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CheckpointError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
    })?;

    let config = parse_config(&content, path)?;
    validate_config(&config)?;

    Ok(config)
}

/// Find the config starting at `start` (or use `explicit`) and load it
pub fn locate_and_load(explicit: Option<&Path>, start: &Path) -> Result<LoadedConfig, CheckpointError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => discover_config(start)?,
    };

    let config = load_config(&path)?;

    Ok(LoadedConfig { config, path })
}

fn parse_config(content: &str, path: &Path) -> Result<Config, CheckpointError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("json")
        .to_ascii_lowercase();

    let parsed = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        "toml" => toml::from_str(content).map_err(|e| e.to_string()),
        _ => serde_json::from_str(content).map_err(|e| e.to_string()),
    };

    parsed.map_err(|e| CheckpointError::InvalidConfig(format!("{}: {}", path.display(), e)))
}

/// Validate configuration invariants
pub fn validate_config(config: &Config) -> Result<(), CheckpointError> {
    if config.remote.trim().is_empty() {
        return Err(CheckpointError::InvalidConfig("'remote' must not be empty".into()));
    }

    if config.branch.trim().is_empty() {
        return Err(CheckpointError::InvalidConfig("'branch' must not be empty".into()));
    }

    if config.branch.chars().any(char::is_whitespace) {
        return Err(CheckpointError::InvalidConfig(format!(
            "'branch' must not contain whitespace: {:?}",
            config.branch
        )));
    }

    if config.push_interval == 0 {
        return Err(CheckpointError::InvalidConfig(
            "'push_interval' must be greater than zero".into(),
        ));
    }

    if config.push_interval > config.password_timeout {
        return Err(CheckpointError::InvalidConfig(format!(
            "'push_interval' ({}s) must not exceed 'password_timeout' ({}s)",
            config.push_interval, config.password_timeout
        )));
    }

    if let Some(provider) = &config.provider {
        if provider.trim().is_empty() {
            return Err(CheckpointError::InvalidConfig("'provider' must not be empty when set".into()));
        }
    }

    Ok(())
}

/// Example configuration written by `anti-eneo init`
pub const EXAMPLE_CONFIG: &str = include_str!("../anti_eneo.example.json");
