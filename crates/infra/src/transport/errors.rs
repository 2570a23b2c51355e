//! Transport-specific error types
//!
//! Provides error classification for authority exchanges. The transport
//! never retries; the category only informs the queue manager's decision.

use thiserror::Error;

/// Categories of transport errors for retry classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorCategory {
    /// Network/connection errors - retryable
    Network,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx) - non-retryable
    Client,
    /// Configuration errors - non-retryable
    Config,
}

/// Transport operation errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TransportError {
    /// Get the error category for this error
    pub fn category(&self) -> TransportErrorCategory {
        match self {
            Self::Timeout(_) | Self::Network(_) => TransportErrorCategory::Network,
            Self::Server(_) => TransportErrorCategory::Server,
            Self::Client(_) => TransportErrorCategory::Client,
            Self::Config(_) => TransportErrorCategory::Config,
        }
    }

    /// Whether the queue manager may retry after this error
    pub fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            TransportErrorCategory::Network | TransportErrorCategory::Server
        )
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(std::time::Duration::ZERO)
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_builder() {
            Self::Config(format!("invalid request: {err}"))
        } else if let Some(status) = err.status() {
            if status.is_server_error() {
                Self::Server(err.to_string())
            } else {
                Self::Client(err.to_string())
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_and_server_errors_are_transient() {
        assert!(TransportError::Network("reset".into()).is_transient());
        assert!(TransportError::Server("502".into()).is_transient());
        assert!(TransportError::Timeout(std::time::Duration::from_secs(30)).is_transient());
    }

    #[test]
    fn client_and_config_errors_are_not_transient() {
        assert!(!TransportError::Client("400".into()).is_transient());
        assert!(!TransportError::Config("bad url".into()).is_transient());
    }
}
