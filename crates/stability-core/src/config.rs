//! Configuration structures for Stability API clients.
//!
//! This module provides the connection settings for the API: the base origin,
//! the bearer credential and optional transport timeouts, plus loading those
//! settings from the process environment.

use crate::client::DEFAULT_BASE_URL;
use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "STABILITY_API_KEY";

/// Environment variable overriding the API origin.
pub const ENV_BASE_URL: &str = "STABILITY_API_BASE";

/// Environment variable holding the request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "STABILITY_TIMEOUT_SECS";

/// Configuration for a Stability API client.
///
/// The API key is held as a [`SecretString`] and is redacted from `Debug` output.
#[derive(Debug, Validate)]
pub struct StabilityConfig {
    /// API base URL
    #[validate(url)]
    pub base_url: String,

    /// Bearer token sent with every request
    pub api_key: SecretString,

    /// Request timeout in seconds, applied by the transport
    #[validate(range(min = 1, max = 3600))]
    pub request_timeout_secs: Option<u64>,

    /// Connect timeout in seconds, applied by the transport
    #[validate(range(min = 1, max = 300))]
    pub connect_timeout_secs: Option<u64>,
}

impl StabilityConfig {
    /// Create a configuration for the public API origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the API key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "API key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: SecretString::from(api_key),
            request_timeout_secs: None,
            connect_timeout_secs: None,
        })
    }

    /// Load configuration from the process environment.
    ///
    /// Reads `STABILITY_API_KEY` (required), `STABILITY_API_BASE` and
    /// `STABILITY_TIMEOUT_SECS` (optional).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if a variable is missing or invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if a variable is missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| Error::ConfigError(format!("{ENV_API_KEY} is not set")))?;

        let mut config = Self::new(api_key)?;

        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|value| !value.is_empty()) {
            config = config.with_base_url(base_url);
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let seconds = raw.trim().parse::<u64>().map_err(|err| {
                Error::ConfigError(format!("Invalid {ENV_TIMEOUT_SECS} `{raw}`: {err}"))
            })?;
            config = config.with_timeout(seconds);
        }

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Override the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = Some(seconds);
        self
    }

    /// Set connect timeout in seconds.
    #[must_use]
    pub fn with_connect_timeout(mut self, seconds: u64) -> Self {
        self.connect_timeout_secs = Some(seconds);
        self
    }

    /// Get the request timeout as a Duration, if set.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Get the connect timeout as a Duration, if set.
    #[must_use]
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    /// Return the value of the `Authorization` header.
    #[must_use]
    pub fn bearer_token(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }

    /// Parse and validate the base URL.
    ///
    /// The returned URL always ends with `/` so relative paths are appended
    /// to any path prefix instead of replacing its last segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or cannot be a base.
    pub fn parse_base_url(&self) -> Result<Url, Error> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::ConfigError(format!("Invalid base URL: {e}")))?;

        if url.cannot_be_a_base() {
            return Err(Error::ConfigError(format!(
                "Base URL `{}` cannot be used as a base",
                self.base_url
            )));
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(url)
    }
}
