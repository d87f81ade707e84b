use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use crate::pipeline::{EnrichmentPipeline, StatsSnapshot, WorkerPool};
use crate::ports::DeadLetterSink;
use crate::stream::{AdapterExit, ConsumerSettings, MessageSource, StreamConsumerAdapter};

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub workers: usize,
    pub queue_capacity: usize,
    pub shutdown_grace: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 256,
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

/// Wires a message source to the enrichment pipeline: the consumer adapter
/// on its own task, a bounded queue, and a fixed worker pool behind it.
pub struct IngestService {
    pipeline: Arc<EnrichmentPipeline>,
    dead_letters: Arc<dyn DeadLetterSink>,
    consumer: ConsumerSettings,
    pool: PoolSettings,
}

impl IngestService {
    pub fn new(
        pipeline: Arc<EnrichmentPipeline>,
        dead_letters: Arc<dyn DeadLetterSink>,
        consumer: ConsumerSettings,
        pool: PoolSettings,
    ) -> Self {
        Self {
            pipeline,
            dead_letters,
            consumer,
            pool,
        }
    }

    /// Runs until the source is drained or `shutdown` flips to true.
    /// Returns the aggregate counters at exit.
    pub async fn run<S: MessageSource>(
        &self,
        source: Arc<S>,
        shutdown: watch::Receiver<bool>,
    ) -> StatsSnapshot {
        let stats = self.pipeline.stats().clone();
        let (jobs_tx, jobs_rx) = mpsc::channel(self.pool.queue_capacity.max(1));
        let workers = WorkerPool::spawn(self.pipeline.clone(), jobs_rx, self.pool.workers);

        info!(
            workers = workers.size(),
            queue_capacity = self.pool.queue_capacity,
            "Ingest pipeline started"
        );

        let adapter = StreamConsumerAdapter::new(
            self.consumer.clone(),
            source,
            self.dead_letters.clone(),
            stats.clone(),
        );
        let exit = match tokio::spawn(adapter.run(jobs_tx, shutdown)).await {
            Ok(exit) => exit,
            Err(e) => {
                error!(error = %e, "Consumer task failed");
                AdapterExit::Shutdown
            }
        };

        match exit {
            AdapterExit::Drained => workers.join().await,
            AdapterExit::Shutdown => {
                info!(grace = ?self.pool.shutdown_grace, "Draining in-flight work");
                workers.shutdown(self.pool.shutdown_grace).await;
            }
        }

        let snapshot = stats.snapshot();
        info!(
            received = snapshot.received,
            persisted = snapshot.persisted,
            unchanged = snapshot.unchanged,
            dead_lettered = snapshot.dead_lettered,
            requeued = snapshot.requeued,
            redelivered = snapshot.redelivered,
            embed_retries = snapshot.embed_retries,
            dead_letter_rate = snapshot.dead_letter_rate(),
            "Ingest pipeline stopped"
        );
        snapshot
    }
}
