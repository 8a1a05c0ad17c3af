//! Grant cycle worker.
//!
//! A worker owns one partition of the recipient pool for the duration of a
//! run. It admits each cycle through the shared rate limiter, issues the
//! grant via the client, and appends the record to storage. Failures are
//! logged and skipped; only successful cycles count toward the batch's
//! real total.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::client::GrantClient;
use crate::domain::batch::BatchId;
use crate::domain::grant::{GrantRecord, PlanId};
use crate::domain::recipient::Recipient;
use crate::limiter::RateLimiter;
use crate::storage::Storage;

pub struct Worker<S, C> {
    storage: Arc<S>,
    client: Arc<C>,
    limiter: Arc<RateLimiter>,
    cancel: CancellationToken,
}

impl<S, C> Worker<S, C>
where
    S: Storage,
    C: GrantClient,
{
    pub fn new(
        storage: Arc<S>,
        client: Arc<C>,
        limiter: Arc<RateLimiter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            storage,
            client,
            limiter,
            cancel,
        }
    }

    /// Run `cycles` grant cycles against one recipient and return how many
    /// were actually issued.
    ///
    /// Cancellation is checked at the top of each cycle, so an in-flight
    /// grant always finishes and gets recorded before the worker stops.
    pub async fn run(
        &self,
        recipient: &Recipient,
        plan_id: PlanId,
        batch_id: BatchId,
        cycles: i64,
        thread_share: u32,
    ) -> u64 {
        let mut issued = 0u64;
        for _ in 0..cycles {
            if self.cancel.is_cancelled() {
                tracing::debug!(
                    batch_id = %batch_id,
                    recipient_id = %recipient.id,
                    issued,
                    "run cancelled, stopping cycles for recipient"
                );
                break;
            }

            self.limiter.admit(thread_share).await;

            let receipt = match self.client.issue_grant(recipient, plan_id).await {
                Ok(receipt) => receipt,
                Err(error) => {
                    tracing::warn!(
                        batch_id = %batch_id,
                        recipient_id = %recipient.id,
                        %error,
                        "grant cycle failed, skipping"
                    );
                    continue;
                }
            };

            let record = GrantRecord::from_receipt(recipient.id, batch_id, plan_id, receipt);
            if let Err(error) = self.storage.insert_grant(record).await {
                tracing::warn!(
                    batch_id = %batch_id,
                    recipient_id = %recipient.id,
                    %error,
                    "failed to record grant, cycle not counted"
                );
                continue;
            }
            issued += 1;
        }
        issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockGrantClient;
    use crate::config::DistributionConfig;
    use crate::domain::batch::Batch;
    use crate::domain::recipient::RecipientType;
    use crate::storage::MemoryStore;

    fn worker(
        storage: Arc<MemoryStore>,
        client: MockGrantClient,
        cancel: CancellationToken,
    ) -> Worker<MemoryStore, MockGrantClient> {
        let limiter = Arc::new(RateLimiter::new(&DistributionConfig::default()));
        Worker::new(storage, Arc::new(client), limiter, cancel)
    }

    #[tokio::test]
    async fn test_worker_issues_requested_cycles() {
        let storage = Arc::new(MemoryStore::new());
        let client = MockGrantClient::with_seed(7).without_latency();
        let batch = Batch::new("tester", 100);
        let batch_id = batch.data.id;
        storage.persist_batch(&batch).await.unwrap();

        let worker = worker(storage.clone(), client.clone(), CancellationToken::new());
        let recipient = Recipient::new(1, RecipientType::PlatformA);

        let issued = worker.run(&recipient, PlanId(1), batch_id, 5, 1).await;
        assert_eq!(issued, 5);
        assert_eq!(client.call_count(), 5);

        let grants = storage.list_grants_by_batch(batch_id).await.unwrap();
        assert_eq!(grants.len(), 5);
        assert!(grants.iter().all(|g| g.recipient_id == recipient.id));
    }

    #[tokio::test]
    async fn test_failed_cycles_are_skipped_not_counted() {
        let storage = Arc::new(MemoryStore::new());
        let client = MockGrantClient::with_seed(7)
            .without_latency()
            .with_failure_rate(1.0);
        let batch = Batch::new("tester", 100);
        let batch_id = batch.data.id;
        storage.persist_batch(&batch).await.unwrap();

        let worker = worker(storage.clone(), client.clone(), CancellationToken::new());
        let recipient = Recipient::new(1, RecipientType::PlatformA);

        let issued = worker.run(&recipient, PlanId(1), batch_id, 5, 1).await;
        assert_eq!(issued, 0);
        // Every cycle was attempted.
        assert_eq!(client.call_count(), 5);
        assert!(storage.list_grants_by_batch(batch_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_worker_stops_immediately() {
        let storage = Arc::new(MemoryStore::new());
        let client = MockGrantClient::with_seed(7).without_latency();
        let batch = Batch::new("tester", 100);
        let batch_id = batch.data.id;
        storage.persist_batch(&batch).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let worker = worker(storage.clone(), client.clone(), cancel);
        let recipient = Recipient::new(1, RecipientType::PlatformA);

        let issued = worker.run(&recipient, PlanId(1), batch_id, 5, 1).await;
        assert_eq!(issued, 0);
        assert_eq!(client.call_count(), 0);
    }
}
