use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::prompt::CredentialSource;
use super::{CredentialSession, HttpsCacheHandler};
use crate::error::CheckpointError;
use crate::git::CommandRunner;

/// Collaborators a provider handler works with
pub struct ActivationContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub source: &'a dyn CredentialSource,
    /// Branch pushed to prime the cache
    pub branch: &'a str,
}

/// Credential activation strategy for one hosting provider
#[async_trait]
pub trait ProviderHandler: Send + Sync {
    /// Human-readable provider name used in prompts and logs
    fn display_name(&self) -> &str;

    async fn activate(
        &self,
        ctx: &ActivationContext<'_>,
        remote_url: &str,
        cache_timeout: Duration,
    ) -> Result<CredentialSession, CheckpointError>;
}

/// Provider token to handler mapping
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    handlers: HashMap<String, Arc<dyn ProviderHandler>>,
}

impl ProviderRegistry {
    /// Registry with no handlers
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with handlers for the common hosting services
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("github", Arc::new(HttpsCacheHandler::github()));
        registry.register("gitlab", Arc::new(HttpsCacheHandler::gitlab()));
        registry.register("bitbucket", Arc::new(HttpsCacheHandler::bitbucket()));
        registry
    }

    pub fn register(&mut self, token: &str, handler: Arc<dyn ProviderHandler>) {
        self.handlers.insert(token.to_ascii_lowercase(), handler);
    }

    pub fn get(&self, token: &str) -> Option<Arc<dyn ProviderHandler>> {
        self.handlers.get(&token.to_ascii_lowercase()).cloned()
    }

    /// Registered tokens, sorted
    pub fn tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }
}
