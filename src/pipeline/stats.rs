use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate counters shared by the consumer adapter and the workers.
/// Dead-letter growth relative to `received` is the pipeline's failure signal.
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    redelivered: AtomicU64,
    malformed: AtomicU64,
    persisted: AtomicU64,
    unchanged: AtomicU64,
    dead_lettered: AtomicU64,
    requeued: AtomicU64,
    embed_retries: AtomicU64,
    ack_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub redelivered: u64,
    pub malformed: u64,
    pub persisted: u64,
    pub unchanged: u64,
    pub dead_lettered: u64,
    pub requeued: u64,
    pub embed_retries: u64,
    pub ack_failures: u64,
}

impl StatsSnapshot {
    pub fn dead_letter_rate(&self) -> f64 {
        if self.received == 0 {
            0.0
        } else {
            self.dead_lettered as f64 / self.received as f64
        }
    }
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_redelivered(&self) {
        self.redelivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unchanged(&self) {
        self.unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_embed_retries(&self, retries: u64) {
        self.embed_retries.fetch_add(retries, Ordering::Relaxed);
    }

    pub fn record_ack_failure(&self) {
        self.ack_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            redelivered: self.redelivered.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            embed_retries: self.embed_retries.load(Ordering::Relaxed),
            ack_failures: self.ack_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_rate() {
        let stats = PipelineStats::new();
        for _ in 0..4 {
            stats.record_received();
        }
        stats.record_dead_lettered();
        stats.record_embed_retries(2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 4);
        assert_eq!(snapshot.embed_retries, 2);
        assert!((snapshot.dead_letter_rate() - 0.25).abs() < f64::EPSILON);
        assert_eq!(StatsSnapshot::default().dead_letter_rate(), 0.0);
    }
}
