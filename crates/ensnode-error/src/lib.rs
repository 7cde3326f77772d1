//! Error types shared by every ensnode crate.
//!
//! Two families of failure are distinguished:
//! - contract violations (`KindMismatch`, `UnsupportedOperation`,
//!   `InvalidState`, `DimensionMismatch`): a caller wired the wrong node to
//!   the wrong operation. These must propagate up and stop the run.
//! - recoverable failures (`CorruptRecord`, `ExternalIo`, `Io`,
//!   `UnknownKind`): one member or one report step is bad, and an
//!   orchestrator may skip it.

use std::io;

use thiserror::Error;

/// Primary error type for node, codec, store and update operations.
#[derive(Debug, Error)]
pub enum EnsError {
    /// Dispatch or load against the wrong payload variant.
    #[error("kind mismatch in {operation}: expected kind tag {expected}, found {found}")]
    KindMismatch {
        operation: &'static str,
        expected: i32,
        found: i32,
    },

    /// The capability table for this kind has no entry for the operation.
    #[error("operation '{operation}' is not supported by kind '{kind}'")]
    UnsupportedOperation {
        kind: &'static str,
        operation: &'static str,
    },

    /// Operation requires a payload that is absent (or vice versa).
    #[error("invalid node state: {detail}")]
    InvalidState { detail: String },

    /// Buffer read ran past declared lengths or hit an unexpected tag.
    #[error("corrupt record: {detail}")]
    CorruptRecord { detail: String },

    /// An index or row block falls outside its container.
    #[error("dimension mismatch: {detail}")]
    DimensionMismatch { detail: String },

    /// A collaborator (forward-model files, ensemble store) failed.
    #[error("external I/O failure: {detail}")]
    ExternalIo { detail: String },

    /// A persisted record carries a kind tag no registry entry knows.
    #[error("unknown kind tag {tag}")]
    UnknownKind { tag: i32 },

    /// Invalid parameter declaration.
    #[error("configuration error: {detail}")]
    Config { detail: String },

    /// Underlying file system error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal logic error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EnsError {
    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a corrupt-record error.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::CorruptRecord {
            detail: detail.into(),
        }
    }

    /// Create an invalid-state error.
    pub fn invalid_state(detail: impl Into<String>) -> Self {
        Self::InvalidState {
            detail: detail.into(),
        }
    }

    /// Create a dimension-mismatch error.
    pub fn dimension(detail: impl Into<String>) -> Self {
        Self::DimensionMismatch {
            detail: detail.into(),
        }
    }

    /// Create an external I/O error.
    pub fn external(detail: impl Into<String>) -> Self {
        Self::ExternalIo {
            detail: detail.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    /// Whether this error means the caller broke the node contract.
    ///
    /// Such errors must never be downgraded to a skipped member.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::KindMismatch { .. }
                | Self::UnsupportedOperation { .. }
                | Self::InvalidState { .. }
                | Self::DimensionMismatch { .. }
                | Self::Internal(_)
        )
    }

    /// Whether an orchestrator may skip the affected member/report step and
    /// continue the ensemble run.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CorruptRecord { .. }
                | Self::ExternalIo { .. }
                | Self::UnknownKind { .. }
                | Self::Io(_)
        )
    }
}

/// Result type alias using `EnsError`.
pub type Result<T> = std::result::Result<T, EnsError>;
