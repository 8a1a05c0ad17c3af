//! End-to-end tests driving a batch through distribution, statistics and
//! export against the in-memory store and mock grant client.

use std::sync::Arc;
use std::time::Duration;

use largesse::{
    AsyncTask, Batch, BatchId, BatchStatus, DistributionConfig, DistributionCoordinator,
    GrantExporter, MemoryStore, MockGrantClient, PlanId, Recipient, RecipientType, Storage,
    TaskId, TaskStatus,
};

fn seeded_store() -> Arc<MemoryStore> {
    let storage = Arc::new(MemoryStore::new());
    storage.seed_recipients(
        (1..=7)
            .map(|id| Recipient::new(id, RecipientType::PlatformA))
            .chain((101..=103).map(|id| Recipient::new(id, RecipientType::PlatformB)))
            .collect(),
    );
    storage
}

async fn persist_new_batch(storage: &MemoryStore, total_count: i64) -> BatchId {
    let batch = Batch::new("tester", total_count);
    let batch_id = batch.data.id;
    storage.persist_batch(&batch).await.unwrap();
    batch_id
}

async fn poll_until_terminal(exporter: &GrantExporter<MemoryStore>, task_id: TaskId) -> AsyncTask {
    for _ in 0..200 {
        let task = exporter.get_task(task_id).await.unwrap();
        if task.status.is_terminal() {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("export task never settled");
}

#[test_log::test(tokio::test)]
async fn full_run_statistics_and_export() {
    let storage = seeded_store();
    let client = MockGrantClient::with_seed(42).without_latency().with_unit_size(5);
    let config = DistributionConfig::default();
    let coordinator =
        DistributionCoordinator::new(storage.clone(), Arc::new(client), config.clone());

    let batch_id = persist_new_batch(&storage, 100).await;
    let real_count = coordinator
        .start(batch_id, PlanId(1), RecipientType::PlatformA, 3)
        .await
        .unwrap();
    assert_eq!(real_count, 20);

    let stored = storage.get_batch(batch_id).await.unwrap();
    assert_eq!(stored.status(), BatchStatus::Completed);
    assert_eq!(stored.real_count(), Some(20));

    let stats = storage.batch_statistics(batch_id).await.unwrap();
    assert_eq!(stats.total_grants, 20);
    assert_eq!(stats.distinct_recipients, 7);
    assert_eq!(stats.platform_a_grants, 20);
    assert_eq!(stats.platform_b_grants, 0);
    let grants = storage.list_grants_by_batch(batch_id).await.unwrap();
    assert_eq!(stats.total_amount, grants.iter().map(|g| g.amount).sum::<i64>());

    let exporter = GrantExporter::new(storage.clone(), config.export_progress_chunks);
    let task_id = exporter.export_grants(batch_id, "json", "tester").await.unwrap();
    let done = poll_until_terminal(&exporter, task_id).await;
    assert_eq!(done.status, TaskStatus::Succeeded);
    assert_eq!(done.processed_count, 20);
    assert!(done.result_ref.unwrap().starts_with("/exports/json/"));

    let tasks = exporter
        .list_for_user("tester", Some(TaskStatus::Succeeded), 10)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
}

#[test_log::test(tokio::test)]
async fn rerun_of_completed_batch_keeps_recorded_count() {
    let storage = seeded_store();
    let client = MockGrantClient::with_seed(42).without_latency().with_unit_size(5);
    let coordinator = DistributionCoordinator::new(
        storage.clone(),
        Arc::new(client),
        DistributionConfig::default(),
    );

    let batch_id = persist_new_batch(&storage, 100).await;
    coordinator
        .start(batch_id, PlanId(1), RecipientType::PlatformA, 3)
        .await
        .unwrap();

    // A replay run still issues grants but cannot touch the recorded count.
    let replayed = coordinator
        .start(batch_id, PlanId(1), RecipientType::PlatformA, 3)
        .await
        .unwrap();
    assert_eq!(replayed, 20);

    let stored = storage.get_batch(batch_id).await.unwrap();
    assert_eq!(stored.real_count(), Some(20));
    let grants = storage.list_grants_by_batch(batch_id).await.unwrap();
    assert_eq!(grants.len(), 40);
}

#[test_log::test(tokio::test)]
async fn run_targets_only_the_requested_pool() {
    let storage = seeded_store();
    let client = MockGrantClient::with_seed(42).without_latency().with_unit_size(4);
    let coordinator = DistributionCoordinator::new(
        storage.clone(),
        Arc::new(client),
        DistributionConfig::default(),
    );

    let batch_id = persist_new_batch(&storage, 48).await;
    // 48 units at size 4 is 12 cycles over the 3 platform B recipients.
    let real_count = coordinator
        .start(batch_id, PlanId(2), RecipientType::PlatformB, 2)
        .await
        .unwrap();
    assert_eq!(real_count, 12);

    let grants = storage.list_grants_by_batch(batch_id).await.unwrap();
    assert!(grants.iter().all(|g| g.recipient_id.0 >= 101));
    assert!(grants.iter().all(|g| (200..1000).contains(&g.amount)));

    let stats = storage.batch_statistics(batch_id).await.unwrap();
    assert_eq!(stats.platform_b_grants, 12);
    assert_eq!(stats.platform_a_grants, 0);
    assert_eq!(stats.distinct_recipients, 3);
}

#[test_log::test(tokio::test)]
async fn partial_failures_reconcile_with_recorded_grants() {
    let storage = seeded_store();
    let client = MockGrantClient::with_seed(42)
        .without_latency()
        .with_unit_size(5)
        .with_failure_rate(0.5);
    let coordinator = DistributionCoordinator::new(
        storage.clone(),
        Arc::new(client.clone()),
        DistributionConfig::default(),
    );

    // 300 units at size 5: 60 cycles, of which roughly half get rejected.
    let batch_id = persist_new_batch(&storage, 300).await;
    let real_count = coordinator
        .start(batch_id, PlanId(1), RecipientType::PlatformA, 3)
        .await
        .unwrap();
    assert!((0..60).contains(&real_count), "real_count was {real_count}");
    // Every cycle was attempted; only the successful ones were recorded.
    assert_eq!(client.call_count(), 60);

    let grants = storage.list_grants_by_batch(batch_id).await.unwrap();
    assert_eq!(grants.len() as i64, real_count);

    let stored = storage.get_batch(batch_id).await.unwrap();
    assert_eq!(stored.status(), BatchStatus::Completed);
    assert_eq!(stored.real_count(), Some(real_count));
}

#[test_log::test(tokio::test)]
async fn failed_cycles_lower_the_recorded_count() {
    let storage = seeded_store();
    let client = MockGrantClient::with_seed(42)
        .without_latency()
        .with_unit_size(5)
        .with_failure_rate(1.0);
    let coordinator = DistributionCoordinator::new(
        storage.clone(),
        Arc::new(client),
        DistributionConfig::default(),
    );

    let batch_id = persist_new_batch(&storage, 100).await;
    let real_count = coordinator
        .start(batch_id, PlanId(1), RecipientType::PlatformA, 3)
        .await
        .unwrap();
    assert_eq!(real_count, 0);

    let stored = storage.get_batch(batch_id).await.unwrap();
    assert_eq!(stored.status(), BatchStatus::Completed);
    assert_eq!(stored.real_count(), Some(0));
    assert!(storage.list_grants_by_batch(batch_id).await.unwrap().is_empty());
}
