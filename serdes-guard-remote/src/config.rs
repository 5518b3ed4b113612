//! Remote service configuration.

use crate::error::RemoteError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the service API key.
pub const API_KEY_ENV: &str = "SERDES_GUARD_API_KEY";
/// Environment variable overriding the service base URL.
pub const BASE_URL_ENV: &str = "SERDES_GUARD_BASE_URL";
/// Environment variable overriding the request timeout, in seconds.
pub const TIMEOUT_ENV: &str = "SERDES_GUARD_TIMEOUT_SECS";

/// Connection settings for the remote validation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// API key sent as a bearer token.
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Base URL, without a trailing slash.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl RemoteConfig {
    /// Default base URL.
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:8000";
    /// Default timeout.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Create with the default URL and timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            timeout_seconds: Self::DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Read from the process environment.
    ///
    /// Fails when the API key is not set.
    pub fn from_env() -> Result<Self, RemoteError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through a lookup function instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RemoteError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_ENV)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RemoteError::MissingConfig(format!("{API_KEY_ENV} is not set")))?;
        let mut config = Self::new(api_key);
        if let Some(url) = lookup(BASE_URL_ENV).filter(|u| !u.is_empty()) {
            config = config.with_base_url(url);
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            config.timeout_seconds = raw.trim().parse().map_err(|_| {
                RemoteError::MissingConfig(format!("{TIMEOUT_ENV} is not a number: {raw}"))
            })?;
        }
        Ok(config)
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = timeout.as_secs();
        self
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
