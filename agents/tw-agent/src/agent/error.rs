//! Agent Errors
//!
//! The failure taxonomy of an agent session. Every variant ends the session;
//! none of them is retried.

use thiserror::Error;

/// Reasons an agent session can fail
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    /// The connection URL could not be composed or is not a valid URL
    #[error("Invalid URI: {url} - {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// The server or transport refused the connection at handshake time
    #[error("Connection error - {0}")]
    ConnectionRejected(String),

    /// An open connection became unusable
    #[error("Connection lost - {0}")]
    ConnectionLost(String),

    /// Anything the other variants do not describe
    #[error("Unexpected failure - {0}")]
    Fatal(String),
}

/// Failure class of an [`AgentError`], without the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidEndpoint,
    ConnectionRejected,
    ConnectionLost,
    Fatal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::InvalidEndpoint => write!(f, "InvalidEndpoint"),
            FailureKind::ConnectionRejected => write!(f, "ConnectionRejected"),
            FailureKind::ConnectionLost => write!(f, "ConnectionLost"),
            FailureKind::Fatal => write!(f, "Fatal"),
        }
    }
}

impl AgentError {
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        AgentError::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// The failure class of this error
    pub fn kind(&self) -> FailureKind {
        match self {
            AgentError::InvalidEndpoint { .. } => FailureKind::InvalidEndpoint,
            AgentError::ConnectionRejected(_) => FailureKind::ConnectionRejected,
            AgentError::ConnectionLost(_) => FailureKind::ConnectionLost,
            AgentError::Fatal(_) => FailureKind::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        let err = AgentError::invalid_endpoint("https://x/agent/a b/connect", "invalid character");
        assert_eq!(err.kind(), FailureKind::InvalidEndpoint);
        assert_eq!(
            AgentError::ConnectionRejected("401".into()).kind(),
            FailureKind::ConnectionRejected
        );
        assert_eq!(AgentError::Fatal("boom".into()).kind(), FailureKind::Fatal);
    }

    #[test]
    fn test_error_display() {
        let err = AgentError::invalid_endpoint("https://x/agent/a b/connect", "invalid character");
        assert_eq!(
            err.to_string(),
            "Invalid URI: https://x/agent/a b/connect - invalid character"
        );
        assert_eq!(
            AgentError::ConnectionRejected("HTTP error: 401 Unauthorized".into()).to_string(),
            "Connection error - HTTP error: 401 Unauthorized"
        );
    }
}
