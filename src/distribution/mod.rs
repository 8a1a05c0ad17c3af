//! Distribution runs: the coordinator that drives a batch from start to
//! completion.
//!
//! A run takes one batch, resolves its plan unit size, carves the recipient
//! pool into partitions, and fans the grant cycles out over a bounded
//! worker pool that shares one rate limiter. When the pool drains, a
//! sequential remainder pass hands out the leftover cycles, and the real
//! issued count is written to the batch exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::client::GrantClient;
use crate::config::DistributionConfig;
use crate::domain::batch::{AnyBatch, Batch, BatchId, InProgress};
use crate::domain::grant::PlanId;
use crate::domain::recipient::RecipientType;
use crate::error::{LargesseError, Result};
use crate::limiter::RateLimiter;
use crate::storage::{RecipientPool, Storage};

pub mod partition;
pub mod quota;
pub mod worker;

use worker::Worker;

/// Coordinates distribution runs over batches.
///
/// One coordinator serves the whole process; per-batch run locks make sure
/// a batch has at most one run in flight at a time.
pub struct DistributionCoordinator<S, C> {
    storage: Arc<S>,
    client: Arc<C>,
    config: DistributionConfig,
    shutdown: CancellationToken,
    active_runs: Arc<DashMap<BatchId, ()>>,
}

impl<S, C> Clone for DistributionCoordinator<S, C> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            client: self.client.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            active_runs: self.active_runs.clone(),
        }
    }
}

impl<S, C> DistributionCoordinator<S, C>
where
    S: Storage + RecipientPool + Send + Sync + 'static,
    C: GrantClient + 'static,
{
    pub fn new(storage: Arc<S>, client: Arc<C>, config: DistributionConfig) -> Self {
        Self {
            storage,
            client,
            config,
            shutdown: CancellationToken::new(),
            active_runs: Arc::new(DashMap::new()),
        }
    }

    /// Signal every in-flight run to stop after its current cycle.
    ///
    /// Runs still finish their terminal write, so partial counts are
    /// recorded rather than lost.
    pub fn shutdown(&self) {
        tracing::info!("distribution shutdown requested");
        self.shutdown.cancel();
    }

    /// Whether a run is currently in flight for the given batch.
    pub fn is_running(&self, batch_id: BatchId) -> bool {
        self.active_runs.contains_key(&batch_id)
    }

    /// Execute a distribution run for a batch and return the number of
    /// grant cycles actually issued.
    ///
    /// Rejects with `AlreadyRunning` if another run holds the batch. A
    /// batch that is already completed still executes (useful for load
    /// replay) but its recorded count is left untouched.
    #[tracing::instrument(
        skip(self),
        fields(batch_id = %batch_id, plan_id = %plan_id, %recipient_type)
    )]
    pub async fn start(
        &self,
        batch_id: BatchId,
        plan_id: PlanId,
        recipient_type: RecipientType,
        concurrency: usize,
    ) -> Result<i64> {
        match self.active_runs.entry(batch_id) {
            Entry::Occupied(_) => return Err(LargesseError::AlreadyRunning(batch_id)),
            Entry::Vacant(entry) => {
                entry.insert(());
            }
        }
        let active_runs = self.active_runs.clone();
        let _run_lock = scopeguard::guard((), move |_| {
            active_runs.remove(&batch_id);
        });

        let batch = self.storage.get_batch(batch_id).await?;
        let total_count = batch.data().total_count;
        let in_progress: Option<Batch<InProgress>> = match batch {
            AnyBatch::New(batch) => Some(batch.start(self.storage.as_ref()).await?),
            AnyBatch::InProgress(batch) => Some(batch),
            AnyBatch::Completed(_) => {
                tracing::warn!("batch already completed, re-running without terminal write");
                None
            }
        };

        let unit_size = self.client.plan_unit_size(plan_id).await?;
        let recipients = self.storage.list_recipients(recipient_type).await?;
        if recipients.is_empty() {
            tracing::warn!("recipient pool is empty, completing batch with zero grants");
            self.finish(in_progress, 0).await?;
            return Ok(0);
        }

        let quota = quota::allocate(total_count, unit_size, recipients.len())?;
        let pool_size = concurrency.max(1).min(self.config.concurrency_cap.max(1));
        let partitions = partition::partition(&recipients, concurrency, self.config.concurrency_cap);
        tracing::info!(
            unit_size,
            recipients = recipients.len(),
            per_recipient = quota.per_recipient,
            remainder = quota.remainder,
            pool_size,
            partitions = partitions.len(),
            "starting distribution run"
        );

        let limiter = Arc::new(RateLimiter::new(&self.config));

        // Exactly pool_size tasks drain the partition queue, so true
        // parallelism never exceeds the bounded pool even when chunking
        // produced more partitions than workers.
        let queue = Arc::new(partitions);
        let next = Arc::new(AtomicUsize::new(0));
        let mut pool: JoinSet<u64> = JoinSet::new();
        for _ in 0..pool_size.min(queue.len()) {
            let worker = Worker::new(
                self.storage.clone(),
                self.client.clone(),
                limiter.clone(),
                self.shutdown.clone(),
            );
            let queue = queue.clone();
            let next = next.clone();
            let per_recipient = quota.per_recipient;
            let share = pool_size as u32;
            pool.spawn(async move {
                let mut issued = 0u64;
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(part) = queue.get(index) else { break };
                    for recipient in part {
                        issued += worker
                            .run(recipient, plan_id, batch_id, per_recipient, share)
                            .await;
                    }
                }
                issued
            });
        }

        // Barrier: the remainder pass must not start until every worker has
        // drained its partition.
        let mut real_count = 0u64;
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(issued) => real_count += issued,
                Err(error) => tracing::error!(%error, "distribution worker panicked"),
            }
        }

        if quota.remainder > 0 {
            let worker = Worker::new(
                self.storage.clone(),
                self.client.clone(),
                limiter.clone(),
                self.shutdown.clone(),
            );
            for recipient in recipients.iter().take(quota.remainder) {
                real_count += worker.run(recipient, plan_id, batch_id, 1, 1).await;
            }
        }

        self.finish(in_progress, real_count as i64).await?;
        tracing::info!(real_count, "distribution run finished");
        Ok(real_count as i64)
    }

    /// Terminal write, if this run owns one.
    ///
    /// A lost race on the terminal write is logged and swallowed: the
    /// recorded count belongs to whichever run got there first.
    async fn finish(&self, in_progress: Option<Batch<InProgress>>, real_count: i64) -> Result<()> {
        let Some(batch) = in_progress else {
            return Ok(());
        };
        match batch.complete(real_count, self.storage.as_ref()).await {
            Ok(_) => Ok(()),
            Err(LargesseError::InvalidState(..)) => {
                tracing::warn!(real_count, "terminal write lost, keeping recorded count");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }
}
