//! Error types for Procflow.
//!
//! All errors in Procflow are represented by the `ProcflowError` enum,
//! which provides specific variants for different error categories.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Procflow operations.
///
/// Variants fall into three families:
/// - business faults: modeled errors thrown by the process itself,
///   intended to be caught by an error boundary in the graph
/// - technical errors: storage failures, optimistic-lock conflicts,
///   invalid state transitions, missing entities
/// - configuration errors: fatal, never retried by the job executor
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum ProcflowError {
    /// Engine-level errors (startup, shutdown, deployment).
    #[error("{0}")]
    Engine(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, variable values).
    #[error("{0}")]
    Convert(String),

    /// Modeled business error thrown by an error end event; routed to a
    /// matching error boundary before it ever surfaces to a caller.
    #[error("business fault {error_code}: {message}")]
    BusinessFault {
        error_code: String,
        message: String,
    },

    /// A revision-checked update lost the race against a concurrent
    /// writer. The command pipeline retries the whole command on this.
    #[error("optimistic locking conflict: {0}")]
    OptimisticLocking(String),

    /// A referenced entity no longer exists (completed or deleted by a
    /// racing transaction).
    #[error("{kind} {id} not found")]
    NotFound {
        kind: String,
        id: String,
    },

    /// An execution was signaled while not in the state the signal
    /// expects (stale caller state).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Missing job handler registration or malformed job configuration.
    /// Dead-letters the job immediately, never retried.
    #[error("{0}")]
    JobConfiguration(String),

    /// Storage operation errors.
    #[error("{0}")]
    Store(String),

    /// Process definition errors.
    #[error("{0}")]
    Definition(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),
}

impl ProcflowError {
    pub fn not_found(
        kind: &str,
        id: &str,
    ) -> Self {
        ProcflowError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    /// True when the error is a transient revision conflict that the
    /// command pipeline should retry.
    pub fn is_optimistic_locking(&self) -> bool {
        matches!(self, ProcflowError::OptimisticLocking(_))
    }

    /// True when retrying can never succeed and the job executor should
    /// dead-letter the job directly.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ProcflowError::Config(_) | ProcflowError::JobConfiguration(_))
    }
}

impl From<ProcflowError> for String {
    fn from(val: ProcflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for ProcflowError {
    fn from(error: std::io::Error) -> Self {
        ProcflowError::IoError(error.to_string())
    }
}

impl From<ProcflowError> for std::io::Error {
    fn from(val: ProcflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for ProcflowError {
    fn from(_: FromUtf8Error) -> Self {
        ProcflowError::Convert("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for ProcflowError {
    fn from(error: serde_json::Error) -> Self {
        ProcflowError::Convert(error.to_string())
    }
}
