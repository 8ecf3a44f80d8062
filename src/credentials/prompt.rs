use std::fmt;
use std::io::{self, BufRead, Write};

use crate::platform::terminal::EchoGuard;

/// Environment variables read by [`EnvCredentials`]
pub const USERNAME_ENV: &str = "ANTI_ENEO_USERNAME";
pub const SECRET_ENV: &str = "ANTI_ENEO_SECRET";

/// A username and secret entered by the operator
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"***")
            .finish()
    }
}

/// What to show the operator for each field
#[derive(Debug, Clone)]
pub struct PromptLabels {
    pub username: String,
    pub secret: String,
}

/// Source of credentials for activation
pub trait CredentialSource: Send + Sync {
    /// Ask for a username and secret; called once per activation
    fn prompt(&self, labels: &PromptLabels) -> io::Result<Credentials>;
}

/// Prompts on the controlling terminal, hiding the secret as it is typed
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl CredentialSource for TerminalPrompt {
    fn prompt(&self, labels: &PromptLabels) -> io::Result<Credentials> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut out = io::stderr();

        let username = ask(&mut input, &mut out, &labels.username)?;
        if username.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "username must not be empty"));
        }

        let secret = {
            let _echo_off = EchoGuard::disable_stdin()?;
            ask(&mut input, &mut out, &labels.secret)?
        };
        // Echo was off, so the operator's newline never reached the screen.
        writeln!(out)?;

        if secret.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "secret must not be empty"));
        }

        Ok(Credentials { username, secret })
    }
}

fn ask(input: &mut impl BufRead, out: &mut impl Write, label: &str) -> io::Result<String> {
    write!(out, "{label}: ")?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed before credentials were entered"));
    }

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Reads credentials from the environment, falling back to another source
pub struct EnvCredentials<S> {
    fallback: S,
}

impl<S: CredentialSource> EnvCredentials<S> {
    pub fn new(fallback: S) -> Self {
        Self { fallback }
    }

    fn from_vars(username: Option<String>, secret: Option<String>) -> Option<Credentials> {
        match (username, secret) {
            (Some(username), Some(secret)) if !username.is_empty() && !secret.is_empty() => {
                Some(Credentials { username, secret })
            }
            _ => None,
        }
    }
}

impl<S: CredentialSource> CredentialSource for EnvCredentials<S> {
    fn prompt(&self, labels: &PromptLabels) -> io::Result<Credentials> {
        let found = Self::from_vars(std::env::var(USERNAME_ENV).ok(), std::env::var(SECRET_ENV).ok());
        match found {
            Some(credentials) => {
                tracing::info!("Using credentials from {} and {}", USERNAME_ENV, SECRET_ENV);
                Ok(credentials)
            }
            None => self.fallback.prompt(labels),
        }
    }
}

/// Fixed credentials that count how often they were asked for
#[cfg(test)]
pub struct StaticCredentials {
    credentials: Option<Credentials>,
    prompts: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl StaticCredentials {
    pub fn new(username: &str, secret: &str) -> Self {
        Self {
            credentials: Some(Credentials {
                username: username.to_string(),
                secret: secret.to_string(),
            }),
            prompts: Default::default(),
        }
    }

    /// A source whose prompt always fails, like a closed terminal
    pub fn failing() -> Self {
        Self {
            credentials: None,
            prompts: Default::default(),
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl CredentialSource for StaticCredentials {
    fn prompt(&self, _labels: &PromptLabels) -> io::Result<Credentials> {
        self.prompts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.credentials
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no terminal"))
    }
}
