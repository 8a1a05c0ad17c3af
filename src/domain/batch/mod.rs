//! Batch lifecycle types using the typestate pattern.
//!
//! A batch is one administrative unit of work: a planned total of grant
//! cycles to distribute over a recipient pool. It progresses through
//! distinct states, enforced at compile time:
//!
//! ```text
//! Batch<New> ──start()──> Batch<InProgress> ──complete()──> Batch<Completed>
//! ```
//!
//! `real_count` (cycles actually issued) lives only on the `Completed` state
//! and is written exactly once, by the terminal transition.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

mod transitions;

/// Unique identifier for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BatchId(pub Uuid);

impl From<Uuid> for BatchId {
    fn from(uuid: Uuid) -> Self {
        BatchId(uuid)
    }
}

impl std::ops::Deref for BatchId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Marker trait for valid batch states.
pub trait BatchState: Send + Sync {}

/// A batch in the largesse system.
///
/// The generic parameter `T` represents the current state of the batch.
#[derive(Debug, Clone, Serialize)]
pub struct Batch<T: BatchState> {
    /// The current state of the batch.
    pub state: T,
    /// The immutable batch metadata.
    pub data: BatchData,
}

/// Immutable batch metadata, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchData {
    pub id: BatchId,
    /// User who created this batch
    pub created_by: String,
    /// Planned number of grant units for the whole batch
    pub total_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Batch<New> {
    /// Create a new batch with a planned grant total.
    pub fn new(created_by: impl Into<String>, total_count: i64) -> Self {
        Batch {
            state: New,
            data: BatchData {
                id: BatchId::from(Uuid::new_v4()),
                created_by: created_by.into(),
                total_count,
                created_at: Utc::now(),
            },
        }
    }
}

// ============================================================================
// Batch States
// ============================================================================

/// Batch has been created; no distribution run has touched it yet.
#[derive(Debug, Clone, Serialize)]
pub struct New;

impl BatchState for New {}

/// A distribution run has started against this batch.
#[derive(Debug, Clone, Serialize)]
pub struct InProgress {
    pub started_at: DateTime<Utc>,
}

impl BatchState for InProgress {}

/// The distribution run finished (terminal state).
#[derive(Debug, Clone, Serialize)]
pub struct Completed {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
    /// Grant cycles actually issued, summed across the main and remainder
    /// passes. Written exactly once, here.
    pub real_count: i64,
}

impl BatchState for Completed {}

// ============================================================================
// Unified Batch Representation
// ============================================================================

/// Enum that can hold a batch in any state.
///
/// This is used for storage and polling surfaces where batches are handled
/// uniformly regardless of their current state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "batch")]
pub enum AnyBatch {
    New(Batch<New>),
    InProgress(Batch<InProgress>),
    Completed(Batch<Completed>),
}

impl AnyBatch {
    /// Get the batch ID regardless of state.
    pub fn id(&self) -> BatchId {
        self.data().id
    }

    /// Get the batch metadata regardless of state.
    pub fn data(&self) -> &BatchData {
        match self {
            AnyBatch::New(b) => &b.data,
            AnyBatch::InProgress(b) => &b.data,
            AnyBatch::Completed(b) => &b.data,
        }
    }

    /// Get the batch status enum.
    pub fn status(&self) -> BatchStatus {
        match self {
            AnyBatch::New(_) => BatchStatus::New,
            AnyBatch::InProgress(_) => BatchStatus::InProgress,
            AnyBatch::Completed(_) => BatchStatus::Completed,
        }
    }

    /// Check if this batch is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnyBatch::Completed(_))
    }

    /// Cycles actually issued; `None` until the batch completes.
    pub fn real_count(&self) -> Option<i64> {
        match self {
            AnyBatch::Completed(b) => Some(b.state.real_count),
            _ => None,
        }
    }
}

/// Batch status enum for filtering and polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    New,
    InProgress,
    Completed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::New => "new",
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(BatchStatus::New),
            "in_progress" => Ok(BatchStatus::InProgress),
            "completed" => Ok(BatchStatus::Completed),
            _ => Err(format!("Invalid batch status: {}", s)),
        }
    }
}

// Conversion traits for going from typed Batch to AnyBatch

impl From<Batch<New>> for AnyBatch {
    fn from(b: Batch<New>) -> Self {
        AnyBatch::New(b)
    }
}

impl From<Batch<InProgress>> for AnyBatch {
    fn from(b: Batch<InProgress>) -> Self {
        AnyBatch::InProgress(b)
    }
}

impl From<Batch<Completed>> for AnyBatch {
    fn from(b: Batch<Completed>) -> Self {
        AnyBatch::Completed(b)
    }
}
