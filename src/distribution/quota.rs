//! Quota allocation: turn a batch total into per-recipient cycle counts.

use crate::error::{LargesseError, Result};

/// How a batch's grant cycles divide over a recipient pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Full cycles every recipient receives in the main pass
    pub per_recipient: i64,
    /// Leftover cycles, handed out one each to the first `remainder`
    /// recipients in pool order by the remainder pass
    pub remainder: usize,
}

/// Allocate grant cycles over a recipient pool.
///
/// The batch total counts grant units; one cycle consumes `unit_size` of
/// them, so the number of cycles is the truncating division of the two.
/// Units that do not fill a whole cycle are dropped.
pub fn allocate(total_count: i64, unit_size: i32, recipient_count: usize) -> Result<Quota> {
    if unit_size <= 0 {
        return Err(LargesseError::InvalidInput(format!(
            "unit size must be positive, got {unit_size}"
        )));
    }
    if recipient_count == 0 {
        return Err(LargesseError::InvalidInput(
            "recipient pool is empty".to_string(),
        ));
    }
    if total_count < 0 {
        return Err(LargesseError::InvalidInput(format!(
            "total count must be non-negative, got {total_count}"
        )));
    }

    let cycles = total_count / unit_size as i64;
    Ok(Quota {
        per_recipient: cycles / recipient_count as i64,
        remainder: (cycles % recipient_count as i64) as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_with_remainder() {
        // 100 units at size 5 is 20 cycles over 7 recipients.
        let quota = allocate(100, 5, 7).unwrap();
        assert_eq!(quota.per_recipient, 2);
        assert_eq!(quota.remainder, 6);
    }

    #[test]
    fn test_allocate_exact_division() {
        let quota = allocate(100, 5, 4).unwrap();
        assert_eq!(quota.per_recipient, 5);
        assert_eq!(quota.remainder, 0);
    }

    #[test]
    fn test_partial_unit_is_dropped() {
        // 103 units at size 5 still yields 20 cycles.
        let quota = allocate(103, 5, 7).unwrap();
        assert_eq!(quota.per_recipient, 2);
        assert_eq!(quota.remainder, 6);
    }

    #[test]
    fn test_fewer_cycles_than_recipients() {
        let quota = allocate(15, 5, 7).unwrap();
        assert_eq!(quota.per_recipient, 0);
        assert_eq!(quota.remainder, 3);
    }

    #[test]
    fn test_allocation_identity() {
        // per_recipient * n + remainder always reassembles the cycle count.
        for (total, unit, n) in [(100, 5, 7), (99, 3, 10), (1, 1, 1), (0, 4, 3), (500, 7, 13)] {
            let quota = allocate(total, unit, n).unwrap();
            assert_eq!(
                quota.per_recipient * n as i64 + quota.remainder as i64,
                total / unit as i64,
            );
            assert!(quota.remainder < n);
        }
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(allocate(100, 0, 7), Err(LargesseError::InvalidInput(_))));
        assert!(matches!(allocate(100, -5, 7), Err(LargesseError::InvalidInput(_))));
        assert!(matches!(allocate(100, 5, 0), Err(LargesseError::InvalidInput(_))));
        assert!(matches!(allocate(-1, 5, 7), Err(LargesseError::InvalidInput(_))));
    }
}
