//! Stream consumer adapter.
//!
//! Owns the subscription loop: pulls messages from a [`MessageSource`],
//! decodes them into transaction records and hands them to the worker pool
//! through a bounded queue together with a [`DeliveryHandle`]. Offsets are
//! committed only when a handle is acknowledged, so delivery to the pipeline
//! stays at-least-once.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tracing::{debug, error, info, warn};

use super::delivery::DeliveryHandle;
use super::offsets::OffsetTracker;
use super::source::{MessageSource, SourceMessage};
use crate::domain::Transaction;
use crate::error::{FailureClass, StreamError};
use crate::pipeline::stats::PipelineStats;
use crate::pipeline::Job;
use crate::ports::{DeadLetter, DeadLetterSink};

const RECV_ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub topic: String,
    pub group_id: String,
    pub redelivery_delay: Duration,
    /// Upper bound on a malformed-payload dead-letter write.
    pub dead_letter_timeout: Duration,
}

/// Why the adapter loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterExit {
    /// A finite source ended and every delivery settled.
    Drained,
    /// Shutdown was requested or the work queue closed.
    Shutdown,
}

#[derive(Default)]
struct Outstanding {
    count: AtomicUsize,
    idle: Notify,
}

impl Outstanding {
    fn add(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn settle(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_one();
        }
    }

    fn is_idle(&self) -> bool {
        self.count.load(Ordering::SeqCst) == 0
    }
}

struct Redelivery {
    message: Arc<SourceMessage>,
    attempt: u32,
}

struct Shared<S> {
    source: Arc<S>,
    offsets: Mutex<OffsetTracker>,
    outstanding: Outstanding,
    redeliver: mpsc::UnboundedSender<Redelivery>,
    redelivery_delay: Duration,
}

struct StreamDelivery<S: MessageSource> {
    message: Arc<SourceMessage>,
    attempt: u32,
    shared: Arc<Shared<S>>,
    finished: AtomicBool,
}

#[async_trait]
impl<S: MessageSource> DeliveryHandle for StreamDelivery<S> {
    fn attempt(&self) -> u32 {
        self.attempt
    }

    async fn ack(self: Box<Self>) -> Result<(), StreamError> {
        self.finished.store(true, Ordering::SeqCst);
        let (partition, offset) = (self.message.partition, self.message.offset);

        // Commit under the tracker lock so positions reach the source in order.
        let result = {
            let mut offsets = self.shared.offsets.lock().await;
            match offsets.complete(partition, offset) {
                Some(next) => self.shared.source.commit(partition, next).await,
                None => Ok(()),
            }
        };
        self.shared.outstanding.settle();
        result
    }

    async fn reject(self: Box<Self>) {
        self.finished.store(true, Ordering::SeqCst);
        let shared = self.shared.clone();
        let redelivery = Redelivery {
            message: self.message.clone(),
            attempt: self.attempt + 1,
        };

        tokio::spawn(async move {
            tokio::time::sleep(shared.redelivery_delay).await;
            if shared.redeliver.send(redelivery).is_err() {
                debug!("Consumer stopped; message left for stream redelivery");
            }
        });
    }
}

impl<S: MessageSource> Drop for StreamDelivery<S> {
    fn drop(&mut self) {
        if !self.finished.load(Ordering::SeqCst) {
            warn!(
                partition = self.message.partition,
                offset = self.message.offset,
                "Delivery dropped without acknowledgment"
            );
            self.shared.outstanding.settle();
        }
    }
}

/// Resolves once shutdown is requested. A dropped sender never resolves.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn decode(payload: &[u8]) -> Result<Transaction, StreamError> {
    serde_json::from_slice(payload).map_err(|e| StreamError::Malformed(e.to_string()))
}

enum Next {
    Received(Result<Option<SourceMessage>, StreamError>),
    Redelivery(Redelivery),
    Idle,
    Shutdown,
}

pub struct StreamConsumerAdapter<S: MessageSource> {
    settings: ConsumerSettings,
    source: Arc<S>,
    dead_letters: Arc<dyn DeadLetterSink>,
    stats: Arc<PipelineStats>,
}

impl<S: MessageSource> StreamConsumerAdapter<S> {
    pub fn new(
        settings: ConsumerSettings,
        source: Arc<S>,
        dead_letters: Arc<dyn DeadLetterSink>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            settings,
            source,
            dead_letters,
            stats,
        }
    }

    /// Runs until shutdown, until `jobs` closes, or until a finite source is
    /// exhausted and all of its deliveries are settled. Blocks on `jobs.send`
    /// when the queue is full, which stops pulling from the source.
    pub async fn run(
        self,
        jobs: mpsc::Sender<Job>,
        mut shutdown: watch::Receiver<bool>,
    ) -> AdapterExit {
        let (redeliver_tx, mut redeliver_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            source: self.source.clone(),
            offsets: Mutex::new(OffsetTracker::new()),
            outstanding: Outstanding::default(),
            redeliver: redeliver_tx,
            redelivery_delay: self.settings.redelivery_delay,
        });

        info!(
            topic = %self.settings.topic,
            group_id = %self.settings.group_id,
            "Stream consumer started"
        );

        let mut source_open = true;
        let exit = loop {
            if !source_open && shared.outstanding.is_idle() {
                break AdapterExit::Drained;
            }

            let next = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => Next::Shutdown,
                Some(redelivery) = redeliver_rx.recv() => Next::Redelivery(redelivery),
                received = self.source.recv(), if source_open => Next::Received(received),
                _ = shared.outstanding.idle.notified(), if !source_open => Next::Idle,
            };

            let keep_going = match next {
                Next::Shutdown => false,
                Next::Idle => true,
                Next::Redelivery(redelivery) => {
                    self.stats.record_redelivered();
                    self.dispatch(
                        &shared,
                        redelivery.message,
                        redelivery.attempt,
                        &jobs,
                        &mut shutdown,
                    )
                    .await
                }
                Next::Received(Ok(Some(message))) => {
                    self.stats.record_received();
                    shared
                        .offsets
                        .lock()
                        .await
                        .track(message.partition, message.offset);
                    shared.outstanding.add();
                    self.dispatch(&shared, Arc::new(message), 1, &jobs, &mut shutdown)
                        .await
                }
                Next::Received(Ok(None)) => {
                    info!("Source exhausted, waiting for outstanding deliveries");
                    source_open = false;
                    true
                }
                Next::Received(Err(e)) => {
                    warn!(error = %e, "Stream receive failed");
                    tokio::select! {
                        _ = tokio::time::sleep(RECV_ERROR_BACKOFF) => true,
                        _ = shutdown_requested(&mut shutdown) => false,
                    }
                }
            };

            if !keep_going {
                break AdapterExit::Shutdown;
            }
        };

        info!(?exit, "Stream consumer stopped");
        exit
    }

    /// Returns false when the pipeline can no longer accept work.
    async fn dispatch(
        &self,
        shared: &Arc<Shared<S>>,
        message: Arc<SourceMessage>,
        attempt: u32,
        jobs: &mpsc::Sender<Job>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        let record = decode(&message.payload);
        let delivery = Box::new(StreamDelivery {
            message,
            attempt,
            shared: shared.clone(),
            finished: AtomicBool::new(false),
        });

        match record {
            Ok(record) => {
                let job = Job { record, delivery };
                tokio::select! {
                    sent = jobs.send(job) => sent.is_ok(),
                    _ = shutdown_requested(shutdown) => false,
                }
            }
            Err(e) => self.dead_letter_malformed(delivery, e, shutdown).await,
        }
    }

    /// Acknowledges only after the entry is durable. A failed or timed-out
    /// write rejects for redelivery; shutdown abandons the delivery unacked.
    async fn dead_letter_malformed(
        &self,
        delivery: Box<StreamDelivery<S>>,
        err: StreamError,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        if delivery.attempt == 1 {
            self.stats.record_malformed();
        }
        let entry = DeadLetter::for_raw_payload(
            &delivery.message.payload,
            FailureClass::Permanent,
            err.to_string(),
            delivery.attempt,
        );

        let written = tokio::select! {
            written = tokio::time::timeout(
                self.settings.dead_letter_timeout,
                self.dead_letters.write(&entry),
            ) => written,
            _ = shutdown_requested(shutdown) => {
                warn!(
                    partition = delivery.message.partition,
                    offset = delivery.message.offset,
                    "Shutdown during dead-letter write, payload left unacknowledged"
                );
                return false;
            }
        };

        match written {
            Ok(Ok(())) => {
                self.stats.record_dead_lettered();
                warn!(
                    partition = delivery.message.partition,
                    offset = delivery.message.offset,
                    dedupe_key = %entry.dedupe_key,
                    error = %err,
                    "Malformed payload dead-lettered"
                );
                if let Err(e) = delivery.ack().await {
                    self.stats.record_ack_failure();
                    warn!(error = %e, "Acknowledging malformed payload failed");
                }
            }
            Ok(Err(e)) => {
                error!(error = %e, "Dead-letter write failed, payload will be redelivered");
                self.stats.record_requeued();
                delivery.reject().await;
            }
            Err(_) => {
                error!(
                    timeout = ?self.settings.dead_letter_timeout,
                    "Dead-letter write timed out, payload will be redelivered"
                );
                self.stats.record_requeued();
                delivery.reject().await;
            }
        }
        true
    }
}
