use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures of the checkpoint core
///
/// Startup variants abort the daemon before it starts polling. Command
/// variants raised during a poll cycle are logged and the daemon continues.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("no config file ({names}) found in {start} or any parent directory")]
    ConfigNotFound { start: PathBuf, names: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{} is not inside a git work tree", .0.display())]
    NotARepository(PathBuf),

    #[error("remote '{0}' is not configured in this repository")]
    RemoteNotConfigured(String),

    #[error("cannot determine the hosting provider of remote url '{0}'")]
    ProviderUnresolvable(String),

    #[error("no credential handler registered for provider '{0}'")]
    UnsupportedProvider(String),

    #[error("credential activation failed: {0}")]
    CredentialActivation(String),

    #[error("failed to execute {command}: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed (status {status}): {output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },

    #[error("{command} timed out after {}s", timeout.as_secs())]
    CommandTimedOut { command: String, timeout: Duration },
}

impl CheckpointError {
    /// Process exit code for a daemon that stopped on this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CheckpointError::ConfigNotFound { .. } | CheckpointError::InvalidConfig(_) => 2,
            CheckpointError::RemoteNotConfigured(_) => 3,
            CheckpointError::ProviderUnresolvable(_) | CheckpointError::UnsupportedProvider(_) => 4,
            CheckpointError::CredentialActivation(_) => 5,
            CheckpointError::NotARepository(_)
            | CheckpointError::CommandSpawn { .. }
            | CheckpointError::CommandFailed { .. }
            | CheckpointError::CommandTimedOut { .. } => 1,
        }
    }
}

/// Exit code for an application error, looking through its context chain
pub fn exit_code_for(error: &anyhow::Error) -> i32 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CheckpointError>())
        .map(CheckpointError::exit_code)
        .unwrap_or(1)
}
