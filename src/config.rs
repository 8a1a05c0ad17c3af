//! Configuration for distribution runs.

use serde::{Deserialize, Serialize};

/// Configuration for the distribution engine.
///
/// One instance is shared by the coordinator and the exporter; per-run knobs
/// (requested concurrency, recipient type) come in through the call instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Global ceiling on grant cycles per minute, shared by every worker in a
    /// run. Each worker's window budget is this divided by its thread share.
    pub grants_per_minute: u32,

    /// Length of one rate-limiting window in milliseconds
    pub window_ms: u64,

    /// Hard cap on concurrent worker tasks per run, regardless of what the
    /// caller requests
    pub concurrency_cap: usize,

    /// How many progress updates an export job reports over its lifetime
    pub export_progress_chunks: usize,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            grants_per_minute: 300,
            window_ms: 1000,
            concurrency_cap: 5,
            export_progress_chunks: 10,
        }
    }
}
