//! Error types for DataCrunch operations.
//!
//! Every failed API call ends in an [`ApiError`] carrying an [`ErrorKind`],
//! the HTTP status (absent for transport failures), a human-readable message
//! and the raw response body. Failures that never reach the network
//! (configuration, request construction, response decoding) have their own
//! [`Error`] variants.

use crate::constants::ErrorCode;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failed API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Token acquisition failed or the API rejected a fresh token.
    Authentication,
    /// Valid token, insufficient permission.
    Authorization,
    /// Malformed or semantically invalid request.
    Validation,
    /// Resource does not exist.
    NotFound,
    /// Request conflicts with the current resource state.
    Conflict,
    /// Too many requests.
    RateLimited,
    /// Provider-side failure.
    Server,
    /// Network failure, DNS failure or timeout.
    Transport,
    /// Status code outside the known mapping.
    Unknown,
}

impl ErrorKind {
    /// Map an HTTP status code onto a kind.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 => Self::NotFound,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            500..=599 => Self::Server,
            _ => Self::Unknown,
        }
    }

    /// Stable lowercase name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Validation => "validation",
            Self::NotFound => "not-found",
            Self::Conflict => "conflict",
            Self::RateLimited => "rate-limited",
            Self::Server => "server",
            Self::Transport => "transport",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal error of a failed API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// Error classification
    pub kind: ErrorKind,
    /// HTTP status, `None` when the request never got a response
    pub status: Option<u16>,
    /// Human-readable message
    pub message: String,
    /// Raw response body, kept for diagnostics
    pub body: String,
    /// Provider error code from the JSON error envelope, if any
    pub code: Option<String>,
}

impl ApiError {
    /// Create an error with no provider code.
    #[must_use]
    pub fn new(
        kind: ErrorKind,
        status: Option<u16>,
        message: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
            body: body.into(),
            code: None,
        }
    }

    /// A network-level failure with no HTTP response.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, None, message, String::new())
    }

    /// An authentication failure.
    #[must_use]
    pub fn authentication(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, status, message, String::new())
    }

    /// Attach the raw response body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach a provider error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// The provider error code, if it is one of the documented values.
    #[must_use]
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.code.as_deref().and_then(|code| code.parse().ok())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} error (HTTP {status}): {}", self.kind, self.message),
            None => write!(f, "{} error: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// JSON error envelope returned by the API.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Map a non-success status and its body onto an [`ApiError`].
///
/// Never fails: unknown statuses become [`ErrorKind::Unknown`] and bodies that
/// are not the provider's JSON envelope are used verbatim as the message.
#[must_use]
pub fn map_status(status: StatusCode, body: String) -> ApiError {
    let kind = ErrorKind::from_status(status.as_u16());
    let envelope = serde_json::from_str::<ErrorEnvelope>(&body).ok();

    let (code, message) = match envelope {
        Some(ErrorEnvelope { code, message }) => (code, message),
        None => (None, None),
    };

    let message = message
        .filter(|m| !m.trim().is_empty())
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });

    ApiError {
        kind,
        status: Some(status.as_u16()),
        message,
        body,
        code,
    }
}

/// Main error type for DataCrunch operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The API call failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A successful response could not be decoded
    #[error("Failed to decode response: {0}")]
    DecodeError(String),

    /// Invalid UUID format
    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Specialized result type for DataCrunch operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Api(err) => match err.kind {
                ErrorKind::Authentication => "AUTHENTICATION",
                ErrorKind::Authorization => "AUTHORIZATION",
                ErrorKind::Validation => "VALIDATION",
                ErrorKind::NotFound => "NOT_FOUND",
                ErrorKind::Conflict => "CONFLICT",
                ErrorKind::RateLimited => "RATE_LIMITED",
                ErrorKind::Server => "SERVER",
                ErrorKind::Transport => "TRANSPORT",
                ErrorKind::Unknown => "UNKNOWN",
            },
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::DecodeError(_) => "DECODE_ERROR",
            Self::InvalidUuid(_) => "INVALID_UUID",
            Self::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Kind of the API failure, `None` for local errors.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Api(err) => Some(err.kind),
            _ => None,
        }
    }

    /// The underlying [`ApiError`], if this error came from an API call.
    #[must_use]
    pub const fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };
        Self::Api(ApiError::transport(message))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::DecodeError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Self::InvalidUuid(err.to_string())
    }
}
