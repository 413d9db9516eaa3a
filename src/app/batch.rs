//! Fixed-size batching of incoming records.
//!
//! Lines accumulate until the batch fills, the timeout elapses, a filter
//! change forces a flush, or shutdown. Batching amortizes lock traffic on
//! the stores at fire-hose ingest rates.

use crate::record::LineRecord;
use std::time::{Duration, Instant};

/// Default records per batch.
pub const BATCH_SIZE: usize = 1000;

/// Default time after which a partial batch commits anyway.
pub const BATCH_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct Batcher {
    pending: Vec<LineRecord>,
    batch_size: usize,
    timeout: Duration,
    last_commit: Instant,
}

impl Default for Batcher {
    fn default() -> Self {
        Batcher::new(BATCH_SIZE, BATCH_TIMEOUT)
    }
}

impl Batcher {
    pub fn new(batch_size: usize, timeout: Duration) -> Self {
        Batcher {
            pending: Vec::with_capacity(batch_size.max(1)),
            batch_size: batch_size.max(1),
            timeout,
            last_commit: Instant::now(),
        }
    }

    /// Queue a record; returns true when the batch is full and must be
    /// committed.
    pub fn push(&mut self, record: LineRecord) -> bool {
        self.pending.push(record);
        self.pending.len() >= self.batch_size
    }

    /// Whether a partial batch has waited past the timeout.
    pub fn timed_out(&self) -> bool {
        !self.pending.is_empty() && self.last_commit.elapsed() >= self.timeout
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Drain the pending records and restart the timeout clock.
    pub fn take(&mut self) -> Vec<LineRecord> {
        self.last_commit = Instant::now();
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn record(n: u64) -> LineRecord {
        LineRecord::new(Path::new("t.log"), n, None, format!("line {}", n))
    }

    #[test]
    fn test_push_signals_full_batch() {
        let mut batcher = Batcher::new(3, Duration::from_secs(10));
        assert!(!batcher.push(record(1)));
        assert!(!batcher.push(record(2)));
        assert!(batcher.push(record(3)));
        assert_eq!(batcher.len(), 3);

        let taken = batcher.take();
        assert_eq!(taken.len(), 3);
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_timeout_requires_pending_records() {
        let mut batcher = Batcher::new(1000, Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(20));
        // Empty batches never time out.
        assert!(!batcher.timed_out());

        batcher.push(record(1));
        std::thread::sleep(Duration::from_millis(20));
        assert!(batcher.timed_out());

        batcher.take();
        assert!(!batcher.timed_out());
    }

    #[test]
    fn test_take_preserves_order() {
        let mut batcher = Batcher::default();
        for n in 0..10 {
            batcher.push(record(n));
        }
        let taken = batcher.take();
        let nums: Vec<u64> = taken.iter().map(|r| r.line_num).collect();
        assert_eq!(nums, (0..10).collect::<Vec<_>>());
    }
}
