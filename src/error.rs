//! Error types for the distribution engine.

use thiserror::Error;

use crate::domain::batch::BatchId;
use crate::task::TaskId;

/// Result type alias using the largesse error type.
pub type Result<T> = std::result::Result<T, LargesseError>;

/// Main error type for the distribution engine.
///
/// Per-cycle grant failures are deliberately absent here: a failed grant
/// cycle is logged and skipped by the worker, and only shows up as a lower
/// `real_count` on the finished batch.
#[derive(Error, Debug)]
pub enum LargesseError {
    /// Batch id did not resolve
    #[error("Batch not found: {0}")]
    BatchNotFound(BatchId),

    /// Task id did not resolve
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// A distribution run is already executing for this batch
    #[error("Distribution already running for batch {0}")]
    AlreadyRunning(BatchId),

    /// Bad caller-supplied parameters (rejected before any work starts)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record is in an invalid state for the requested transition
    #[error("Invalid state transition: {0} is in state '{1}', expected '{2}'")]
    InvalidState(String, String, String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
