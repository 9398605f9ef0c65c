//! Coordination Error Hierarchy
//!
//! Defines the error types surfaced by the coordination core, categorized by
//! layer: client-visible coordination failures (node, version, session and
//! transaction errors) and infrastructure failures (snapshot serialization).

use config::ConfigError;

use crate::SessionId;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Client-visible coordination failures
    #[error(transparent)]
    Coordination(#[from] CoordinationError),
}

impl Error {
    /// Returns the coordination error, if this is one
    pub fn as_coordination(&self) -> Option<&CoordinationError> {
        match self {
            Error::Coordination(e) => Some(e),
            _ => None,
        }
    }

    /// Transport-level ambiguity: the request may or may not have committed
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, Error::Coordination(CoordinationError::ConnectionLoss))
    }
}

/// Failures reported synchronously to the caller of a coordination operation.
///
/// None of these are retried inside the core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinationError {
    /// Path is absent
    #[error("Node does not exist: {path}")]
    NoNode { path: String },

    /// Create on an existing path
    #[error("Node already exists: {path}")]
    NodeExists { path: String },

    /// Ancestor missing and parent creation was not requested
    #[error("Parent node does not exist for: {path}")]
    NoParent { path: String },

    /// Non-recursive delete of a node that still has children
    #[error("Node has children: {path}")]
    NotEmpty { path: String },

    /// Compare-and-set precondition failed
    #[error("Version conflict on {path}: expected {expected}, actual {actual}")]
    VersionConflict {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// Ephemeral nodes cannot own children
    #[error("Ephemeral node cannot have children: {path}")]
    NoChildrenForEphemerals { path: String },

    /// Malformed path or forbidden target (e.g. deleting the root)
    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// An operation inside a batch failed; nothing from the batch was applied
    #[error("Transaction aborted at op #{index}: {source}")]
    TransactionAborted {
        index: usize,
        #[source]
        source: Box<CoordinationError>,
    },

    /// Operation referenced a session that is closed or past its deadline
    #[error("Session {session_id:#x} has expired")]
    SessionExpired { session_id: SessionId },

    /// Per-session watch limit reached
    #[error("Session {session_id:#x} exceeded the watch limit of {limit}")]
    TooManyWatches { session_id: SessionId, limit: usize },

    /// Transport-level ambiguity, surfaced by the connection collaborator
    #[error("Connection lost before the outcome was known")]
    ConnectionLoss,
}

impl CoordinationError {
    /// Unwraps a one-element transaction failure into its underlying cause.
    pub(crate) fn into_op_error(self) -> Self {
        match self {
            CoordinationError::TransactionAborted { source, .. } => *source,
            other => other,
        }
    }

    pub(crate) fn invalid_path(
        path: &str,
        reason: &'static str,
    ) -> Self {
        CoordinationError::InvalidPath {
            path: path.to_string(),
            reason,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// Snapshot encoding/decoding failures
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

// Serialization is classified separately so snapshot callers can match on it
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("Bincode serialization failed: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Snapshot is corrupted: {0}")]
    Corrupted(String),
}

impl From<SerializationError> for Error {
    fn from(e: SerializationError) -> Self {
        Error::System(SystemError::Serialization(e))
    }
}
