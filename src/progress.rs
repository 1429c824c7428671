use std::time::{Duration, Instant};

/// Snapshot of how far an operation has got.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingProgress {
    pub total_size: u64,
    /// Raw source bytes consumed so far. Only the final record equals `total_size`.
    pub processed_size: u64,
    pub percentage: f64,
    /// 1-based chunk being filled; the chunk count on the final record.
    pub current_chunk: usize,
    /// Estimate from the bytes-per-row seen so far; exact on the final record.
    pub total_chunks: usize,
    pub estimated_time_remaining: Duration,
}

impl ProcessingProgress {
    /// The record for an operation that finished in one step.
    pub fn complete(total_size: u64, chunks: usize) -> Self {
        Self {
            total_size,
            processed_size: total_size,
            percentage: 100.0,
            current_chunk: chunks,
            total_chunks: chunks,
            estimated_time_remaining: Duration::ZERO,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.processed_size == self.total_size && self.percentage >= 100.0
    }
}

/// Tracks consumed bytes and completed lines, and produces a
/// [`ProcessingProgress`] every `cadence` lines.
///
/// The start instant is captured once, at construction; elapsed time for the
/// ETA is always measured from it.
#[derive(Debug)]
pub struct ProgressEstimator {
    total_size: u64,
    cadence: u64,
    chunk_capacity: usize,
    started: Instant,
    processed: u64,
    lines: u64,
}

impl ProgressEstimator {
    pub fn new(total_size: u64, cadence: u64, chunk_capacity: usize) -> Self {
        Self {
            total_size,
            cadence: cadence.max(1),
            chunk_capacity: chunk_capacity.max(1),
            started: Instant::now(),
            processed: 0,
            lines: 0,
        }
    }

    /// Record the cumulative byte count read from the source so far.
    pub fn record_bytes(&mut self, consumed: u64) {
        self.processed = self.processed.max(consumed);
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Count one completed line; returns a record when the cadence is hit.
    pub fn on_line(&mut self, rows_so_far: u64, chunks_emitted: usize) -> Option<ProcessingProgress> {
        self.lines += 1;
        if self.lines % self.cadence != 0 {
            return None;
        }
        Some(self.snapshot_at(Instant::now(), rows_so_far, chunks_emitted))
    }

    /// The closing record: everything consumed, 100 %, nothing remaining.
    pub fn finish(&mut self, chunks_emitted: usize) -> ProcessingProgress {
        self.processed = self.total_size;
        ProcessingProgress::complete(self.total_size, chunks_emitted)
    }

    fn snapshot_at(&self, now: Instant, rows_so_far: u64, chunks_emitted: usize) -> ProcessingProgress {
        // completion is reserved for the final record
        let processed = self.processed.min(self.total_size.saturating_sub(1));
        let percentage = if self.total_size == 0 {
            0.0
        } else {
            processed as f64 / self.total_size as f64 * 100.0
        };

        let elapsed = now.saturating_duration_since(self.started);
        let estimated_time_remaining = if processed == 0 {
            Duration::ZERO
        } else {
            let remaining = self.total_size - processed;
            elapsed.mul_f64(remaining as f64 / processed as f64)
        };

        let current_chunk = chunks_emitted + 1;
        let total_chunks = if rows_so_far == 0 || processed == 0 {
            current_chunk
        } else {
            let bytes_per_row = processed as f64 / rows_so_far as f64;
            let estimated_rows = self.total_size as f64 / bytes_per_row;
            let estimated = (estimated_rows / self.chunk_capacity as f64).ceil() as usize;
            estimated.max(current_chunk)
        };

        ProcessingProgress {
            total_size: self.total_size,
            processed_size: processed,
            percentage,
            current_chunk,
            total_chunks,
            estimated_time_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_on_cadence_only() {
        let mut est = ProgressEstimator::new(1_000, 3, 10);
        est.record_bytes(100);
        assert!(est.on_line(1, 0).is_none());
        assert!(est.on_line(2, 0).is_none());
        let p = est.on_line(3, 0).expect("third line ticks");
        assert_eq!(p.processed_size, 100);
        assert_eq!(p.percentage, 10.0);
        assert_eq!(p.current_chunk, 1);
    }

    #[test]
    fn eta_uses_elapsed_since_start() {
        let mut est = ProgressEstimator::new(1_000, 1, 10);
        est.record_bytes(250);
        let now = est.started + Duration::from_secs(10);
        let p = est.snapshot_at(now, 25, 2);
        // 250 bytes in 10s, 750 left
        assert_eq!(p.estimated_time_remaining, Duration::from_secs(30));
        // 10 bytes/row -> ~100 rows -> 10 chunks of 10
        assert_eq!(p.total_chunks, 10);
        assert_eq!(p.current_chunk, 3);
    }

    #[test]
    fn only_final_record_reaches_total() {
        let mut est = ProgressEstimator::new(500, 1, 10);
        est.record_bytes(500);
        let p = est.on_line(5, 0).unwrap();
        assert!(p.processed_size < 500);
        assert!(p.percentage < 100.0);

        let done = est.finish(1);
        assert_eq!(done.processed_size, 500);
        assert_eq!(done.percentage, 100.0);
        assert_eq!(done.estimated_time_remaining, Duration::ZERO);
        assert!(done.is_complete());
    }

    #[test]
    fn bytes_never_go_backwards() {
        let mut est = ProgressEstimator::new(500, 1, 10);
        est.record_bytes(300);
        est.record_bytes(200);
        assert_eq!(est.processed(), 300);
    }
}
