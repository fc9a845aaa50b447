//! Error taxonomy shared by every backend.
//!
//! Backends map their native failures (HTTP status codes, JSON-RPC error
//! objects, vendor faults) into [`Error`] at the transport boundary. The facade
//! never sees anything else.

use crate::config::ConfigError;
use crate::request::BackendKind;

/// Boxed underlying cause of a transport failure.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Every way a random-number request can fail.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad request shape. Detected locally, never sent over the wire.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Missing API key, or the service rejected the key.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The chosen backend cannot provide the requested capability.
    #[error("{backend} backend does not support {feature}")]
    UnsupportedFeature {
        backend: BackendKind,
        feature: &'static str,
    },

    /// The response did not match the expected shape or count.
    #[error("malformed response: {0}")]
    Format(String),

    /// The service reported an explicit error.
    #[error("service error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// Network or timeout failure.
    #[error("transport failure: {source}")]
    Transport {
        #[source]
        source: Cause,
    },
}

/// Discriminant of [`Error`], for callers that branch on the failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Auth,
    UnsupportedFeature,
    Format,
    Protocol,
    Transport,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Auth => write!(f, "auth"),
            Self::UnsupportedFeature => write!(f, "unsupported_feature"),
            Self::Format => write!(f, "format"),
            Self::Protocol => write!(f, "protocol"),
            Self::Transport => write!(f, "transport"),
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Auth(_) => ErrorKind::Auth,
            Self::UnsupportedFeature { .. } => ErrorKind::UnsupportedFeature,
            Self::Format(_) => ErrorKind::Format,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Transport { .. } => ErrorKind::Transport,
        }
    }

    /// Only network failures are worth a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub(crate) fn transport<E>(cause: E) -> Self
    where
        E: Into<Cause>,
    {
        Self::Transport {
            source: cause.into(),
        }
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub(crate) fn unsupported(backend: BackendKind, feature: &'static str) -> Self {
        Self::UnsupportedFeature { backend, feature }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Validation(e.to_string())
    }
}
