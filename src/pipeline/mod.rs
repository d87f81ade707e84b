//! Enrichment pipeline: bounded queue, worker pool and per-record processing.

pub mod enricher;
pub mod inflight;
pub mod retry;
pub mod stats;
pub mod worker;

use crate::domain::Transaction;
use crate::stream::DeliveryHandle;

pub use enricher::{EnrichmentPipeline, EnrichmentSettings, Outcome};
pub use retry::RetryPolicy;
pub use stats::{PipelineStats, StatsSnapshot};
pub use worker::WorkerPool;

/// One unit of work on the queue between the consumer adapter and the workers.
pub struct Job {
    pub record: Transaction,
    pub delivery: Box<dyn DeliveryHandle>,
}
