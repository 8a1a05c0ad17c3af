//! Recipient partitioning for the worker pool.

use crate::domain::recipient::Recipient;

/// Split the recipient pool into contiguous partitions.
///
/// Partition size is `len / min(concurrency, cap)`, floored at 1, so the
/// partition count can exceed the worker pool size when the division is
/// uneven. The coordinator runs a fixed pool of workers that drain the
/// partitions from a shared queue, so extra partitions add work, not
/// parallelism. Pool order is preserved and every recipient lands in
/// exactly one partition.
pub fn partition(recipients: &[Recipient], concurrency: usize, cap: usize) -> Vec<Vec<Recipient>> {
    if recipients.is_empty() {
        return Vec::new();
    }
    let effective = concurrency.max(1).min(cap.max(1));
    let size = (recipients.len() / effective).max(1);
    recipients.chunks(size).map(<[Recipient]>::to_vec).collect()
}
