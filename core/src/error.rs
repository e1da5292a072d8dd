use std::fmt;
use thiserror::Error;

/// Why an authorized call was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Unauthenticated,
    Forbidden,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => f.write_str("unauthenticated"),
            Self::Forbidden => f.write_str("forbidden"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    Disconnected,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
        }
    }
}

/// Errors surfaced by every client operation.
///
/// Only [`ClientError::Auth`] is ever absorbed below the caller, and only
/// once, by the auth gate. The rest propagate unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("authorization failed: {reason}")]
    Auth { reason: AuthFailure },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("realtime transport error: {reason}")]
    Transport { reason: TransportFailure },
}

impl ClientError {
    pub fn network(detail: impl Into<String>) -> Self {
        Self::Network(detail.into())
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation(detail.into())
    }

    pub const fn unauthenticated() -> Self {
        Self::Auth {
            reason: AuthFailure::Unauthenticated,
        }
    }

    pub const fn forbidden() -> Self {
        Self::Auth {
            reason: AuthFailure::Forbidden,
        }
    }

    pub const fn disconnected() -> Self {
        Self::Transport {
            reason: TransportFailure::Disconnected,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::Auth {
                reason: AuthFailure::Unauthenticated
            }
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Validation(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshFailure {
    Network,
    Rejected,
    Malformed,
}

impl fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("network"),
            Self::Rejected => f.write_str("rejected"),
            Self::Malformed => f.write_str("malformed"),
        }
    }
}

/// A failed credential refresh. Cloneable so every caller sharing one
/// in-flight refresh observes the same outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("credential refresh failed ({reason}): {detail}")]
pub struct RefreshError {
    pub reason: RefreshFailure,
    pub detail: String,
}

impl RefreshError {
    pub fn new(reason: RefreshFailure, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self::new(RefreshFailure::Rejected, detail)
    }

    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(RefreshFailure::Network, detail)
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(RefreshFailure::Malformed, detail)
    }
}

/// Keeps the failure kind: a refresh that could not reach the server is a
/// network error, not a verdict on the session.
impl From<RefreshError> for ClientError {
    fn from(err: RefreshError) -> Self {
        match err.reason {
            RefreshFailure::Network => Self::Network(err.detail),
            RefreshFailure::Rejected => Self::unauthenticated(),
            RefreshFailure::Malformed => Self::Validation(err.detail),
        }
    }
}
