//! # largesse
//!
//! A batch grant-distribution engine for load exercises against downstream
//! grant platforms.
//!
//! A batch plans a total number of grant units. A distribution run divides
//! that total into cycles, fans the cycles out over a rate-limited worker
//! pool covering a recipient pool, and records the count actually issued
//! when the run completes. Grants can afterwards be aggregated and exported
//! through fire-and-forget background tasks.
//!
//! ## Architecture
//!
//! ```text
//! DistributionCoordinator ──> quota / partition ──> Worker pool
//!          │                                           │
//!          │                    RateLimiter <──────────┤
//!          │                                           │
//!          └──────────> Storage <── GrantClient ───────┘
//!                          │
//!     GrantExporter ───────┘──> AsyncTaskRegistry
//! ```
//!
//! The batch lifecycle is typestate-encoded: `Batch<New>` starts into
//! `Batch<InProgress>`, which completes into `Batch<Completed>` carrying
//! the real issued count, written exactly once.

pub mod client;
pub mod config;
pub mod distribution;
pub mod domain;
pub mod error;
pub mod export;
pub mod limiter;
pub mod storage;
pub mod task;

pub use client::{GrantClient, GrantReceipt, MockGrantClient};
pub use config::DistributionConfig;
pub use distribution::DistributionCoordinator;
pub use distribution::quota::Quota;
pub use domain::batch::{AnyBatch, Batch, BatchData, BatchId, BatchState, BatchStatus};
pub use domain::grant::{GrantId, GrantRecord, PlanId, PlatformType};
pub use domain::recipient::{Recipient, RecipientId, RecipientType};
pub use error::{LargesseError, Result};
pub use export::{GrantExporter, SUPPORTED_FORMATS};
pub use limiter::{Clock, RateLimiter, TokioClock};
pub use storage::{GrantStatistics, MemoryStore, RecipientPool, Storage, TaskStore};
pub use task::{AsyncTask, AsyncTaskRegistry, TaskId, TaskOutcome, TaskStatus};
