// Credential activation
//
// Before the daemon starts polling it primes git's own credential cache, so
// that every push inside the cache window goes through without a prompt. The
// hosting provider is read from the remote URL and selects a handler from an
// explicit registry; handlers share the HTTPS cache-priming routine.

mod https_cache;
mod prompt;
mod registry;

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use crate::error::CheckpointError;
use crate::git::CommandRunner;

use https_cache::HttpsCacheHandler;
use registry::ActivationContext;

pub use prompt::{CredentialSource, EnvCredentials, TerminalPrompt};
pub use registry::ProviderRegistry;

#[cfg(test)]
pub use prompt::StaticCredentials;

/// Host label directly left of the top-level domain in `//[user@]host[:port]/`
static PROVIDER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"//(?:[^/@\s]*@)?(?:[A-Za-z0-9-]+\.)*?([A-Za-z0-9-]+)\.[A-Za-z0-9-]+(?::\d+)?/")
        .expect("provider pattern is valid")
});

/// Extract the provider token from a remote URL
///
/// `https://github.example/user/repo.git` yields `github`. URLs without a
/// `//host.tld/` segment (scp-style `git@host:path`, local paths) yield `None`.
pub fn provider_token(url: &str) -> Option<String> {
    PROVIDER_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Window during which git serves cached credentials
///
/// The credentials themselves live in git's cache, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSession {
    pub provider: String,
    pub activated_at: DateTime<Utc>,
    pub cached_until: DateTime<Utc>,
}

impl CredentialSession {
    pub fn starting_now(provider: &str, timeout: Duration) -> Self {
        let activated_at = Utc::now();
        let window = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        Self {
            provider: provider.to_string(),
            activated_at,
            cached_until: activated_at.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

/// Dispatches credential activation to the handler for the remote's provider
pub struct CredentialActivator {
    runner: Arc<dyn CommandRunner>,
    source: Arc<dyn CredentialSource>,
    registry: ProviderRegistry,
    provider_override: Option<String>,
}

impl CredentialActivator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        source: Arc<dyn CredentialSource>,
        registry: ProviderRegistry,
    ) -> Self {
        Self {
            runner,
            source,
            registry,
            provider_override: None,
        }
    }

    /// Use `provider` instead of deriving it from the remote URL
    pub fn with_provider_override(mut self, provider: Option<String>) -> Self {
        self.provider_override = provider.map(|p| p.to_ascii_lowercase());
        self
    }

    /// Prime git's credential cache for `remote_url`
    pub async fn activate(
        &self,
        remote_url: &str,
        branch: &str,
        cache_timeout: Duration,
    ) -> Result<CredentialSession, CheckpointError> {
        let token = match &self.provider_override {
            Some(provider) => provider.clone(),
            None => provider_token(remote_url)
                .ok_or_else(|| CheckpointError::ProviderUnresolvable(remote_url.to_string()))?,
        };

        let handler = self.registry.get(&token).ok_or_else(|| {
            tracing::error!("Known providers: {}", self.registry.tokens().join(", "));
            CheckpointError::UnsupportedProvider(token.clone())
        })?;

        tracing::info!(
            "Activating {} credentials for {} seconds",
            handler.display_name(),
            cache_timeout.as_secs()
        );

        let ctx = ActivationContext {
            runner: self.runner.as_ref(),
            source: self.source.as_ref(),
            branch,
        };

        handler.activate(&ctx, remote_url, cache_timeout).await
    }
}
