//! State transition implementations for the batch lifecycle.

use super::{Batch, Completed, InProgress, New};
use crate::error::Result;
use crate::storage::Storage;

impl Batch<New> {
    /// Transition batch from New to InProgress at the start of a
    /// distribution run.
    ///
    /// The coordinator that owns the run is the sole writer of this edge, so
    /// no retry loop is needed.
    pub async fn start<S: Storage + ?Sized>(self, storage: &S) -> Result<Batch<InProgress>> {
        let batch = Batch {
            data: self.data,
            state: InProgress {
                started_at: chrono::Utc::now(),
            },
        };
        storage.persist_batch(&batch).await?;
        Ok(batch)
    }
}

impl Batch<InProgress> {
    /// Terminal transition: record the real issued count and mark the batch
    /// completed.
    ///
    /// The storage write is compare-and-set on status, so a duplicate
    /// terminal write fails with `InvalidState` instead of clobbering the
    /// recorded count.
    pub async fn complete<S: Storage + ?Sized>(
        self,
        real_count: i64,
        storage: &S,
    ) -> Result<Batch<Completed>> {
        let batch = Batch {
            data: self.data,
            state: Completed {
                started_at: Some(self.state.started_at),
                completed_at: chrono::Utc::now(),
                real_count,
            },
        };
        storage.complete_batch(&batch).await?;
        Ok(batch)
    }
}
