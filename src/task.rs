//! Background task records and the registry that tracks them.
//!
//! Long-running jobs (grant exports, for now) register a task up front,
//! report progress while they run, and settle exactly once with a success
//! or failure outcome. Callers poll the registry by task id.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::TaskStore;

/// Unique identifier for a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        TaskId(uuid)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Lifecycle status of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "succeeded" => Ok(TaskStatus::Succeeded),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

/// How a task settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success { result_ref: String },
    Failure { error_message: String },
}

/// One background task record.
#[derive(Debug, Clone, Serialize)]
pub struct AsyncTask {
    pub id: TaskId,
    /// Human-readable job name, e.g. "export grants"
    pub name: String,
    pub status: TaskStatus,
    /// Work items the job expects to process
    pub total_count: u64,
    /// Work items processed so far; monotonic
    pub processed_count: u64,
    /// Where the job output landed, once succeeded
    pub result_ref: Option<String>,
    pub error_message: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AsyncTask {
    pub fn new(name: impl Into<String>, created_by: impl Into<String>, total_count: u64) -> Self {
        Self {
            id: TaskId::from(Uuid::new_v4()),
            name: name.into(),
            status: TaskStatus::Pending,
            total_count,
            processed_count: 0,
            result_ref: None,
            error_message: None,
            created_by: created_by.into(),
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Registry for submitting and tracking background tasks.
///
/// The `TaskStore` bound lives on the impl blocks so containers can stay
/// generic without repeating it.
pub struct AsyncTaskRegistry<S> {
    store: Arc<S>,
}

// Manual impl: deriving Clone would require S: Clone.
impl<S> Clone for AsyncTaskRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: TaskStore> AsyncTaskRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Register a new pending task and return its id immediately.
    ///
    /// The caller is expected to spawn the actual job and drive it through
    /// `update_progress` and `complete`.
    pub async fn submit(
        &self,
        name: impl Into<String>,
        created_by: impl Into<String>,
        total_count: u64,
    ) -> Result<TaskId> {
        let task = AsyncTask::new(name, created_by, total_count);
        let task_id = task.id;
        tracing::info!(task_id = %task_id, name = %task.name, "task submitted");
        self.store.insert_task(task).await?;
        Ok(task_id)
    }

    /// Report progress for a running task.
    pub async fn update_progress(&self, task_id: TaskId, processed: u64) -> Result<AsyncTask> {
        self.store.update_task_progress(task_id, processed).await
    }

    /// Settle a task with its outcome. Idempotence is rejected rather than
    /// absorbed: a second settle fails with `InvalidState`.
    pub async fn complete(&self, task_id: TaskId, outcome: TaskOutcome) -> Result<AsyncTask> {
        let task = self.store.complete_task(task_id, outcome).await?;
        // The original system notified the requesting user here; a log line
        // stands in for that channel.
        match task.status {
            TaskStatus::Succeeded => tracing::info!(
                task_id = %task_id,
                result_ref = task.result_ref.as_deref().unwrap_or(""),
                "task succeeded"
            ),
            _ => tracing::warn!(
                task_id = %task_id,
                error = task.error_message.as_deref().unwrap_or(""),
                "task failed"
            ),
        }
        Ok(task)
    }

    pub async fn get(&self, task_id: TaskId) -> Result<AsyncTask> {
        self.store.get_task(task_id).await
    }

    pub async fn list_for_user(
        &self,
        created_by: &str,
        status: Option<TaskStatus>,
        limit: usize,
    ) -> Result<Vec<AsyncTask>> {
        self.store.list_tasks_for_user(created_by, status, limit).await
    }
}
