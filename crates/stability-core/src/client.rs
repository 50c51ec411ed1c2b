//! HTTP client settings.
//!
//! This module provides the transport configuration used to build the
//! underlying [`reqwest::Client`]. The library enforces no timeouts of its own:
//! any timeout configured here is applied by the transport.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default API origin.
pub const DEFAULT_BASE_URL: &str = "https://api.stability.ai";

// Connection pool settings

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// HTTP client configuration.
///
/// Configures transport behaviour: timeouts, connection pooling and compression.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Whole-request timeout, `None` to wait indefinitely
    pub timeout: Option<Duration>,

    /// Connect timeout, `None` to use the transport default
    pub connect_timeout: Option<Duration>,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Enable response compression
    pub enable_compression: bool,

    /// Value of the `User-Agent` header
    pub user_agent: Option<String>,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: None,
            connect_timeout: None,
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            enable_compression: true,
            user_agent: None,
        }
    }

    /// Set request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Enable or disable compression.
    #[must_use]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }

    /// Set the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Apply these settings to a [`reqwest::ClientBuilder`].
    #[must_use]
    pub fn apply(&self, mut builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
        builder = builder
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .gzip(self.enable_compression);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        builder
    }

    /// Build a [`reqwest::Client`] with these settings and the given default headers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the transport cannot be initialised.
    pub fn build_http_client(
        &self,
        default_headers: reqwest::header::HeaderMap,
    ) -> Result<reqwest::Client> {
        self.apply(reqwest::Client::builder().default_headers(default_headers))
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
