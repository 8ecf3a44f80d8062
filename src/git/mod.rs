// Git plumbing for the checkpoint daemon
//
// Everything here shells out to the `git` binary through a CommandRunner.
// The runner hands back the raw combined output stream and leaves
// interpretation to the caller.

pub mod branch;
pub mod remote;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::CheckpointError;

pub use branch::BranchManager;
pub use remote::{RemoteBinding, RemoteResolver};

/// Captured result of one git invocation
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// stdout followed by stderr
    pub output: Vec<u8>,
    /// Exit code, `None` when the process was killed by a signal
    pub status: Option<i32>,
}

impl CommandOutput {
    pub fn new(output: impl Into<Vec<u8>>, status: Option<i32>) -> Self {
        Self {
            output: output.into(),
            status,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }

    fn status_label(&self) -> String {
        match self.status {
            Some(code) => code.to_string(),
            None => "signal".to_string(),
        }
    }
}

/// Executes git commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `git <args>` and capture its output
    ///
    /// A non-zero exit status is not an error here; only failing to run the
    /// command at all (or running out of time) is.
    async fn run(&self, args: &[&str]) -> Result<CommandOutput, CheckpointError>;

    /// Run `git <args>` and turn a non-zero exit status into an error
    async fn run_checked(&self, args: &[&str]) -> Result<CommandOutput, CheckpointError> {
        let output = self.run(args).await?;
        if !output.succeeded() {
            return Err(CheckpointError::CommandFailed {
                command: describe(args),
                status: output.status_label(),
                output: output.text().trim().to_string(),
            });
        }
        Ok(output)
    }
}

/// [`CommandRunner`] backed by the system `git` binary
#[derive(Debug, Clone)]
pub struct GitRunner {
    program: String,
    repo_root: PathBuf,
    timeout: Option<Duration>,
}

impl GitRunner {
    pub fn new(repo_root: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            program: "git".to_string(),
            repo_root: repo_root.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CommandRunner for GitRunner {
    async fn run(&self, args: &[&str]) -> Result<CommandOutput, CheckpointError> {
        let command = describe(args);

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(&self.repo_root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(%command, "spawning git");

        let pending = cmd.output();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                CheckpointError::CommandTimedOut {
                    command: command.clone(),
                    timeout: limit,
                }
            })?,
            None => pending.await,
        };

        let output = result.map_err(|source| CheckpointError::CommandSpawn {
            command: command.clone(),
            source,
        })?;

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        let captured = CommandOutput::new(combined, output.status.code());
        tracing::debug!(%command, status = %captured.status_label(), "git finished");
        Ok(captured)
    }
}

/// Top level of the work tree `runner` operates in, which was started from `start`
pub async fn repo_root(runner: &dyn CommandRunner, start: &Path) -> Result<PathBuf, CheckpointError> {
    let output = runner.run(&["rev-parse", "--show-toplevel"]).await?;
    let text = output.text();
    let toplevel = text.lines().next().map(str::trim).unwrap_or_default();

    if !output.succeeded() || toplevel.is_empty() {
        return Err(CheckpointError::NotARepository(start.to_path_buf()));
    }
    Ok(PathBuf::from(toplevel))
}

/// Render a git invocation for logs and errors, hiding URL passwords
pub fn describe(args: &[&str]) -> String {
    let rendered: Vec<String> = args.iter().map(|arg| redact_arg(arg)).collect();
    format!("git {}", rendered.join(" "))
}

fn redact_arg(arg: &str) -> String {
    match url::Url::parse(arg) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("***")).is_err() {
                return "<redacted url>".to_string();
            }
            parsed.to_string()
        }
        _ => arg.to_string(),
    }
}
