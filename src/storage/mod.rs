//! Storage traits for batches, grants, recipients and async tasks.
//!
//! Persistence is an opaque collaborator: the core hands it state changes
//! and reads them back, and the only invariant it leans on is that the
//! terminal batch write is compare-and-set. The crate ships an in-memory
//! implementation; a durable backend would implement the same traits.

use async_trait::async_trait;

use crate::domain::batch::{AnyBatch, Batch, BatchId, BatchState, Completed};
use crate::domain::grant::GrantRecord;
use crate::domain::recipient::{Recipient, RecipientType};
use crate::error::Result;
use crate::task::{AsyncTask, TaskId, TaskOutcome, TaskStatus};

pub mod memory;

pub use memory::MemoryStore;

/// Aggregate view over the grants of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct GrantStatistics {
    pub total_grants: u64,
    pub total_amount: i64,
    pub distinct_recipients: u64,
    pub platform_a_grants: u64,
    pub platform_b_grants: u64,
}

/// Batch and grant persistence.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch a batch in whatever state it is currently in.
    async fn get_batch(&self, batch_id: BatchId) -> Result<AnyBatch>;

    /// Persist a batch in a non-terminal state, inserting or overwriting.
    async fn persist_batch<T>(&self, batch: &Batch<T>) -> Result<()>
    where
        T: BatchState + Clone,
        AnyBatch: From<Batch<T>>;

    /// Terminal write: record completion and the real issued count.
    ///
    /// Compare-and-set on status. Fails with `InvalidState` if the stored
    /// batch is already completed, so the first terminal write wins.
    async fn complete_batch(&self, batch: &Batch<Completed>) -> Result<()>;

    /// Append one issued grant.
    async fn insert_grant(&self, grant: GrantRecord) -> Result<()>;

    /// All grants issued under a batch, in insertion order.
    async fn list_grants_by_batch(&self, batch_id: BatchId) -> Result<Vec<GrantRecord>>;

    /// Aggregate statistics over the grants of a batch.
    async fn batch_statistics(&self, batch_id: BatchId) -> Result<GrantStatistics>;
}

/// Read-only access to the recipient pool.
#[async_trait]
pub trait RecipientPool: Send + Sync {
    /// Every recipient of the given type, in stable pool order.
    async fn list_recipients(&self, recipient_type: RecipientType) -> Result<Vec<Recipient>>;
}

/// Persistence for background task records.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: AsyncTask) -> Result<()>;

    async fn get_task(&self, task_id: TaskId) -> Result<AsyncTask>;

    /// Advance a task's processed count.
    ///
    /// Progress is monotonic (stale writes are clamped) and the first write
    /// flips a `Pending` task to `Running`. Fails with `InvalidState` on a
    /// terminal task.
    async fn update_task_progress(&self, task_id: TaskId, processed: u64) -> Result<AsyncTask>;

    /// Terminal write: settle the task with its outcome.
    ///
    /// Compare-and-set on status, so a task settles exactly once.
    async fn complete_task(&self, task_id: TaskId, outcome: TaskOutcome) -> Result<AsyncTask>;

    /// Tasks created by a user, newest first, optionally filtered by status.
    async fn list_tasks_for_user(
        &self,
        created_by: &str,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> Result<Vec<AsyncTask>>;
}
