//! In-memory storage implementation.
//!
//! Backs tests and the load-generation deployment, where batch and grant
//! state is disposable. Batches and tasks live in concurrent maps; grants
//! and the recipient pool are plain vectors under a mutex since they are
//! only ever appended to or scanned.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;

use crate::domain::batch::{AnyBatch, Batch, BatchId, BatchState, Completed};
use crate::domain::grant::{GrantRecord, PlatformType};
use crate::domain::recipient::{Recipient, RecipientType};
use crate::error::{LargesseError, Result};
use crate::task::{AsyncTask, TaskId, TaskOutcome, TaskStatus};

use super::{GrantStatistics, RecipientPool, Storage, TaskStore};

#[derive(Default)]
pub struct MemoryStore {
    batches: DashMap<BatchId, AnyBatch>,
    grants: Mutex<Vec<GrantRecord>>,
    recipients: Mutex<Vec<Recipient>>,
    tasks: DashMap<TaskId, AsyncTask>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the recipient pool. Pool order is preserved by
    /// `list_recipients`.
    pub fn seed_recipients(&self, recipients: Vec<Recipient>) {
        *self.recipients.lock() = recipients;
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get_batch(&self, batch_id: BatchId) -> Result<AnyBatch> {
        self.batches
            .get(&batch_id)
            .map(|entry| entry.value().clone())
            .ok_or(LargesseError::BatchNotFound(batch_id))
    }

    async fn persist_batch<T>(&self, batch: &Batch<T>) -> Result<()>
    where
        T: BatchState + Clone,
        AnyBatch: From<Batch<T>>,
    {
        self.batches
            .insert(batch.data.id, AnyBatch::from(batch.clone()));
        Ok(())
    }

    async fn complete_batch(&self, batch: &Batch<Completed>) -> Result<()> {
        match self.batches.entry(batch.data.id) {
            Entry::Vacant(_) => Err(LargesseError::BatchNotFound(batch.data.id)),
            Entry::Occupied(mut entry) => {
                if entry.get().is_terminal() {
                    return Err(LargesseError::InvalidState(
                        batch.data.id.to_string(),
                        "completed".to_string(),
                        "in_progress".to_string(),
                    ));
                }
                entry.insert(AnyBatch::from(batch.clone()));
                Ok(())
            }
        }
    }

    async fn insert_grant(&self, grant: GrantRecord) -> Result<()> {
        self.grants.lock().push(grant);
        Ok(())
    }

    async fn list_grants_by_batch(&self, batch_id: BatchId) -> Result<Vec<GrantRecord>> {
        Ok(self
            .grants
            .lock()
            .iter()
            .filter(|grant| grant.batch_id == batch_id)
            .cloned()
            .collect())
    }

    async fn batch_statistics(&self, batch_id: BatchId) -> Result<GrantStatistics> {
        if !self.batches.contains_key(&batch_id) {
            return Err(LargesseError::BatchNotFound(batch_id));
        }

        let grants = self.grants.lock();
        let mut stats = GrantStatistics::default();
        let mut recipients = HashSet::new();
        for grant in grants.iter().filter(|grant| grant.batch_id == batch_id) {
            stats.total_grants += 1;
            stats.total_amount += grant.amount;
            recipients.insert(grant.recipient_id);
            match grant.platform {
                PlatformType::A => stats.platform_a_grants += 1,
                PlatformType::B => stats.platform_b_grants += 1,
            }
        }
        stats.distinct_recipients = recipients.len() as u64;
        Ok(stats)
    }
}

#[async_trait]
impl RecipientPool for MemoryStore {
    async fn list_recipients(&self, recipient_type: RecipientType) -> Result<Vec<Recipient>> {
        Ok(self
            .recipients
            .lock()
            .iter()
            .filter(|recipient| recipient.recipient_type == recipient_type)
            .copied()
            .collect())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: AsyncTask) -> Result<()> {
        self.tasks.insert(task.id, task);
        Ok(())
    }

    async fn get_task(&self, task_id: TaskId) -> Result<AsyncTask> {
        self.tasks
            .get(&task_id)
            .map(|entry| entry.value().clone())
            .ok_or(LargesseError::TaskNotFound(task_id))
    }

    async fn update_task_progress(&self, task_id: TaskId, processed: u64) -> Result<AsyncTask> {
        match self.tasks.entry(task_id) {
            Entry::Vacant(_) => Err(LargesseError::TaskNotFound(task_id)),
            Entry::Occupied(mut entry) => {
                let task = entry.get_mut();
                if task.status.is_terminal() {
                    return Err(LargesseError::InvalidState(
                        task_id.to_string(),
                        task.status.as_str().to_string(),
                        "pending or running".to_string(),
                    ));
                }
                if task.status == TaskStatus::Pending {
                    task.status = TaskStatus::Running;
                }
                // Progress reports can race; keep the furthest one.
                task.processed_count = task.processed_count.max(processed);
                Ok(task.clone())
            }
        }
    }

    async fn complete_task(&self, task_id: TaskId, outcome: TaskOutcome) -> Result<AsyncTask> {
        match self.tasks.entry(task_id) {
            Entry::Vacant(_) => Err(LargesseError::TaskNotFound(task_id)),
            Entry::Occupied(mut entry) => {
                let task = entry.get_mut();
                if task.status.is_terminal() {
                    return Err(LargesseError::InvalidState(
                        task_id.to_string(),
                        task.status.as_str().to_string(),
                        "pending or running".to_string(),
                    ));
                }
                match outcome {
                    TaskOutcome::Success { result_ref } => {
                        task.status = TaskStatus::Succeeded;
                        task.result_ref = Some(result_ref);
                        task.processed_count = task.total_count;
                    }
                    TaskOutcome::Failure { error_message } => {
                        task.status = TaskStatus::Failed;
                        task.error_message = Some(error_message);
                    }
                }
                task.completed_at = Some(Utc::now());
                Ok(task.clone())
            }
        }
    }

    async fn list_tasks_for_user(
        &self,
        created_by: &str,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> Result<Vec<AsyncTask>> {
        let mut tasks: Vec<AsyncTask> = self
            .tasks
            .iter()
            .filter(|entry| {
                let task = entry.value();
                task.created_by == created_by
                    && status.map_or(true, |status| task.status == status)
            })
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks.truncate(limit);
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GrantReceipt;
    use crate::domain::grant::PlanId;

    fn grant(batch_id: BatchId, recipient_id: i64, amount: i64, platform: PlatformType) -> GrantRecord {
        GrantRecord::from_receipt(
            recipient_id.into(),
            batch_id,
            PlanId(1),
            GrantReceipt { amount, platform },
        )
    }

    #[tokio::test]
    async fn test_statistics_aggregation() {
        let store = MemoryStore::new();
        let batch = Batch::new("tester", 100);
        let batch_id = batch.data.id;
        store.persist_batch(&batch).await.unwrap();

        store.insert_grant(grant(batch_id, 1, 100, PlatformType::A)).await.unwrap();
        store.insert_grant(grant(batch_id, 1, 150, PlatformType::A)).await.unwrap();
        store.insert_grant(grant(batch_id, 2, 300, PlatformType::B)).await.unwrap();

        // Grants from another batch are invisible to this one.
        let other = Batch::new("tester", 10);
        store.persist_batch(&other).await.unwrap();
        store.insert_grant(grant(other.data.id, 9, 999, PlatformType::B)).await.unwrap();

        let stats = store.batch_statistics(batch_id).await.unwrap();
        assert_eq!(stats.total_grants, 3);
        assert_eq!(stats.total_amount, 550);
        assert_eq!(stats.distinct_recipients, 2);
        assert_eq!(stats.platform_a_grants, 2);
        assert_eq!(stats.platform_b_grants, 1);
    }

    #[tokio::test]
    async fn test_statistics_unknown_batch() {
        let store = MemoryStore::new();
        let err = store
            .batch_statistics(BatchId::from(uuid::Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, LargesseError::BatchNotFound(_)));
    }

    #[tokio::test]
    async fn test_recipient_pool_filters_by_type_in_order() {
        let store = MemoryStore::new();
        store.seed_recipients(vec![
            Recipient::new(1, RecipientType::PlatformA),
            Recipient::new(2, RecipientType::PlatformB),
            Recipient::new(3, RecipientType::PlatformA),
        ]);

        let pool = store.list_recipients(RecipientType::PlatformA).await.unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[0].id.0, 1);
        assert_eq!(pool[1].id.0, 3);
    }

    #[tokio::test]
    async fn test_task_progress_is_monotonic() {
        let store = MemoryStore::new();
        let task = AsyncTask::new("export", "tester", 100);
        let task_id = task.id;
        store.insert_task(task).await.unwrap();

        let updated = store.update_task_progress(task_id, 40).await.unwrap();
        assert_eq!(updated.status, TaskStatus::Running);
        assert_eq!(updated.processed_count, 40);

        // A stale report cannot move progress backwards.
        let updated = store.update_task_progress(task_id, 25).await.unwrap();
        assert_eq!(updated.processed_count, 40);
    }

    #[tokio::test]
    async fn test_task_settles_exactly_once() {
        let store = MemoryStore::new();
        let task = AsyncTask::new("export", "tester", 100);
        let task_id = task.id;
        store.insert_task(task).await.unwrap();

        let done = store
            .complete_task(
                task_id,
                TaskOutcome::Success {
                    result_ref: "/exports/csv/a.csv".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(done.status, TaskStatus::Succeeded);
        assert_eq!(done.processed_count, done.total_count);

        let err = store
            .complete_task(
                task_id,
                TaskOutcome::Failure {
                    error_message: "late".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LargesseError::InvalidState(..)));

        let err = store.update_task_progress(task_id, 50).await.unwrap_err();
        assert!(matches!(err, LargesseError::InvalidState(..)));
    }
}
