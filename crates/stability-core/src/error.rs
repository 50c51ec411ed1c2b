//! Error types for Stability API operations.
//!
//! Every client method funnels failures through [`Error`], so callers see the same
//! shape regardless of which endpoint produced it. Non-success responses are
//! mapped with [`Error::from_error_response`].

use serde_json::Value;
use thiserror::Error;

/// Main error type for Stability API operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A local precondition failed before any request was sent
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The response body did not match the expected shape
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The API answered with a non-success status
    #[error("Remote API error ({status}): {message}")]
    RemoteApiError {
        /// HTTP status code returned by the API
        status: u16,
        /// Message supplied by the API, or the status reason phrase
        message: String,
    },

    /// The operation was cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// The client was closed before the operation started
    #[error("Client has been closed")]
    Disposed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Transport timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The API could not be reached
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Specialized result type for Stability API operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::ProtocolError(_) => "PROTOCOL_ERROR",
            Self::RemoteApiError { .. } => "REMOTE_API_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Disposed => "DISPOSED",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// HTTP status carried by a [`Error::RemoteApiError`].
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::ProtocolError(_)
                | Self::HttpError(_)
                | Self::Timeout(_)
                | Self::ServiceUnavailable(_)
        )
    }

    /// Build a [`Error::RemoteApiError`] from a non-success status and its raw body.
    ///
    /// The message comes from the string `message` field of the JSON body; other
    /// fields are ignored whatever their type. When the body is not JSON or carries
    /// no string message, the status reason phrase is used instead.
    #[must_use]
    pub fn from_error_response(status: reqwest::StatusCode, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|envelope| {
                envelope
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .map_or_else(|| status.as_str().to_string(), str::to_string)
            });

        Self::RemoteApiError {
            status: status.as_u16(),
            message,
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else if err.is_decode() {
            Self::ProtocolError(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ProtocolError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
