use std::sync::atomic::{AtomicU64, Ordering};
use veranda_core::{VerandaError, VerandaResult};

/// Source of the bearer token used against the managed service APIs.
///
/// Implementations must re-read their backing source on every call so that
/// a [`crate::ClientPool::refresh`] picks up rotated credentials.
pub trait CredentialProvider: Send + Sync {
    /// Resolve the current bearer token.
    fn bearer_token(&self) -> VerandaResult<String>;
}

/// Reads the token from an environment variable on every resolution.
///
/// This is the production provider: rotated credentials land in the
/// environment (instance profile hook, sidecar, etc.) and the next
/// resolution after a refresh sees them.
pub struct EnvCredentials {
    var: String,
    resolutions: AtomicU64,
}

impl EnvCredentials {
    /// Default environment variable holding the bearer token.
    pub const DEFAULT_VAR: &'static str = "VERANDA_BEARER_TOKEN";

    /// Resolve tokens from the named environment variable.
    pub fn new(var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            resolutions: AtomicU64::new(0),
        }
    }

    /// Number of times a token has been resolved. Diagnostic only.
    pub fn resolutions(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VAR)
    }
}

impl CredentialProvider for EnvCredentials {
    fn bearer_token(&self) -> VerandaResult<String> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        std::env::var(&self.var).map_err(|_| {
            VerandaError::Credential(format!("{} is not set", self.var))
        })
    }
}

/// A fixed token, used in configuration-driven setups and tests.
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    /// Wrap a fixed token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn bearer_token(&self) -> VerandaResult<String> {
        Ok(self.token.clone())
    }
}
