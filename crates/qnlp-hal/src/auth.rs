//! Token providers for authenticated executors.
//!
//! Remote executors obtain their bearer token through a [`TokenProvider`]
//! at connect time. The token never appears in `Debug` output or in
//! serialized configuration.

use std::fmt;

use async_trait::async_trait;

use crate::error::{HalError, HalResult};

/// Default environment variable holding the remote executor token.
pub const DEFAULT_TOKEN_ENV: &str = "QNLP_BACKEND_TOKEN";

/// Token provider trait for executors that require authentication.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get a valid access token.
    async fn get_token(&self) -> HalResult<String>;

    /// Check if authentication is available.
    fn has_valid_token(&self) -> bool;
}

/// Reads the token from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    env_var: String,
}

impl EnvTokenProvider {
    /// Create a provider reading `env_var`.
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
        }
    }

    fn read(&self) -> Option<String> {
        std::env::var(&self.env_var)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_ENV)
    }
}

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn get_token(&self) -> HalResult<String> {
        self.read().ok_or_else(|| {
            HalError::AuthenticationFailed(format!(
                "environment variable {} not set or empty",
                self.env_var
            ))
        })
    }

    fn has_valid_token(&self) -> bool {
        self.read().is_some()
    }
}

/// Fixed token, typically from [`crate::BackendConfig::token`].
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Wrap a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> HalResult<String> {
        if self.token.is_empty() {
            return Err(HalError::AuthenticationFailed("empty token".into()));
        }
        Ok(self.token.clone())
    }

    fn has_valid_token(&self) -> bool {
        !self.token.is_empty()
    }
}
