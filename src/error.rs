use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// GatewayError
// ---------------------------------------------------------------------------

/// Classification of a gateway failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// The request never completed (connectivity, timeout).
    Network,
    /// The server rejected the request.
    Http,
    /// Anything else.
    Other,
}

/// Error returned by `PersistenceGateway` implementations (wraps arbitrary
/// error strings from the transport layer).
#[derive(Debug, Clone)]
pub struct GatewayError {
    pub message: String,
    pub kind: GatewayErrorKind,
}

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GatewayErrorKind::Other,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: GatewayErrorKind::Network,
        }
    }

    pub fn with_kind(message: impl Into<String>, kind: GatewayErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for GatewayError {}

// ---------------------------------------------------------------------------
// EngineError — top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("No active session")]
    SessionEmpty,

    #[error("{operation}: {failed} of {total} gateway calls failed; first: {first}")]
    Bulk {
        operation: &'static str,
        failed: usize,
        total: usize,
        /// Message of the first failure, for display.
        first: String,
    },
}

/// Convenience alias — the default error type is `EngineError`.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
