use std::sync::Arc;

use payloads::ErrorBody;
use reqwest::StatusCode;

/// Message used when the backend gives no structured detail.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";

/// Errors produced by the data layer.
///
/// `Network`, `Cancelled`, `Http` and `Decode` come from an attempted
/// request. `Encode`, `InvalidMimeType`, `InvalidUrl` and `NoSession` are
/// raised before anything is sent.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
    #[error("Request cancelled")]
    Cancelled,
    /// A non-2xx response. `code` and `message` come from the backend's
    /// JSON error body when it had one.
    #[error("{message}")]
    Http {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },
    #[error("Unexpected response from the server")]
    Decode(#[source] serde_json::Error),
    #[error("Failed to encode request body")]
    Encode(#[source] serde_json::Error),
    #[error("Invalid MIME type {mime_type:?}")]
    InvalidMimeType {
        mime_type: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Invalid request url {url:?}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Not signed in")]
    NoSession,
}

/// Errors kept in shared cache state, where they are read by many observers.
pub type SharedError = Arc<ClientError>;

impl ClientError {
    /// Build an `Http` error from a status and the raw response body.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) if parsed.is_structured() => Self::Http {
                status,
                code: parsed.error_code,
                message: parsed
                    .message
                    .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string()),
            },
            _ => Self::Http {
                status,
                code: None,
                message: GENERIC_ERROR_MESSAGE.to_string(),
            },
        }
    }

    /// HTTP status of the response, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Machine-readable error code supplied by the backend.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Http { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this failure should reach the end user as an error state.
    ///
    /// Deliberate cancellations and skipped unauthenticated calls are not
    /// failures from the user's point of view.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::NoSession)
    }
}
