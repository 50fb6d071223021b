//! Ranking service error types

use thiserror::Error;

/// Ranking service error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct QnaError {
    pub kind: QnaErrorKind,
    pub message: String,
}

impl QnaError {
    pub fn new(kind: QnaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(QnaErrorKind::Network, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(QnaErrorKind::Auth, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(QnaErrorKind::RateLimit, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(QnaErrorKind::InvalidRequest, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(QnaErrorKind::ServerError, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(QnaErrorKind::Decode, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(QnaErrorKind::Unknown, message)
    }
}

/// Error classification, used for logging and HTTP status mapping.
/// Nothing is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QnaErrorKind {
    /// Timeouts, refused connections
    Network,
    /// 401, 403
    Auth,
    /// 429
    RateLimit,
    /// 400, 404
    InvalidRequest,
    /// 5xx
    ServerError,
    /// Body did not match the expected shape
    Decode,
    Unknown,
}

impl QnaErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::InvalidRequest => "invalid_request",
            Self::ServerError => "server_error",
            Self::Decode => "decode",
            Self::Unknown => "unknown",
        }
    }
}
