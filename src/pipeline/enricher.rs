use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::inflight::InFlight;
use super::retry::{retry_with_backoff, RetryPolicy};
use super::stats::PipelineStats;
use crate::domain::Transaction;
use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, FailureClass};
use crate::ports::{DeadLetter, DeadLetterSink, TransactionStore, UpsertOutcome};
use crate::stream::DeliveryHandle;

#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    pub embed_retry: RetryPolicy,
    /// Bound on each individual provider call.
    pub embed_timeout: Duration,
    /// Deliveries allowed for a record whose store write keeps failing transiently.
    pub max_deliveries: u32,
    pub dead_letter_timeout: Duration,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            embed_retry: RetryPolicy::default(),
            embed_timeout: Duration::from_secs(3),
            max_deliveries: 5,
            dead_letter_timeout: Duration::from_secs(5),
        }
    }
}

/// Result of processing one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Persisted(UpsertOutcome),
    DeadLettered(FailureClass),
    /// Left unacknowledged for redelivery.
    Requeued,
}

struct Failure {
    class: FailureClass,
    reason: String,
    attempts: u32,
}

pub struct EnrichmentPipeline {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn TransactionStore>,
    dead_letters: Arc<dyn DeadLetterSink>,
    settings: EnrichmentSettings,
    stats: Arc<PipelineStats>,
    in_flight: InFlight,
}

impl EnrichmentPipeline {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn TransactionStore>,
        dead_letters: Arc<dyn DeadLetterSink>,
        settings: EnrichmentSettings,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            provider,
            store,
            dead_letters,
            settings,
            stats,
            in_flight: InFlight::new(),
        }
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Enrich, persist and settle one delivery. Never panics on bad input;
    /// every failure ends as a dead-letter entry or a rejected delivery.
    #[tracing::instrument(
        skip_all,
        fields(transaction_id = %record.transaction_id, attempt = delivery.attempt())
    )]
    pub async fn process(&self, record: Transaction, delivery: Box<dyn DeliveryHandle>) -> Outcome {
        let _guard = self.in_flight.acquire(&record.transaction_id).await;

        if let Err(e) = record.validate() {
            let failure = Failure {
                class: FailureClass::InvalidInput,
                reason: e.to_string(),
                attempts: delivery.attempt(),
            };
            return self.dead_letter(record, failure, delivery).await;
        }

        let enriched = match self.enrich(&record).await {
            Ok(enriched) => enriched,
            Err(failure) => return self.dead_letter(record, failure, delivery).await,
        };

        match self.store.upsert(&enriched).await {
            Ok(outcome) => {
                match outcome {
                    UpsertOutcome::Unchanged => self.stats.record_unchanged(),
                    _ => self.stats.record_persisted(),
                }
                debug!(?outcome, "Transaction persisted");
                self.acknowledge(delivery).await;
                Outcome::Persisted(outcome)
            }
            Err(e) if e.is_retryable() && delivery.attempt() < self.settings.max_deliveries => {
                warn!(error = %e, "Store unavailable, requeueing delivery");
                self.stats.record_requeued();
                delivery.reject().await;
                Outcome::Requeued
            }
            Err(e) => {
                let failure = Failure {
                    class: e.class(),
                    reason: e.to_string(),
                    attempts: delivery.attempt(),
                };
                self.dead_letter(enriched, failure, delivery).await
            }
        }
    }

    async fn enrich(&self, record: &Transaction) -> Result<Transaction, Failure> {
        let text = record.embedding_text();
        let timeout = self.settings.embed_timeout;

        let (result, attempts) = retry_with_backoff(
            &self.settings.embed_retry,
            "embedding.embed",
            EmbeddingError::is_retryable,
            |_| {
                let text = text.as_str();
                async move {
                    match tokio::time::timeout(timeout, self.provider.embed(text)).await {
                        Ok(result) => result,
                        Err(_) => Err(EmbeddingError::ProviderUnavailable(format!(
                            "embedding call exceeded {:?}",
                            timeout
                        ))),
                    }
                }
            },
        )
        .await;
        self.stats.record_embed_retries(u64::from(attempts.saturating_sub(1)));

        let vector = result.map_err(|e| Failure {
            class: e.class(),
            reason: e.to_string(),
            attempts,
        })?;

        record
            .clone()
            .with_embedding(vector, self.provider.dimensions())
            .map_err(|e| Failure {
                class: FailureClass::Permanent,
                reason: EmbeddingError::InvalidResponse(e.to_string()).to_string(),
                attempts,
            })
    }

    /// Acknowledge only after the entry is durable; otherwise reject.
    async fn dead_letter(
        &self,
        record: Transaction,
        failure: Failure,
        delivery: Box<dyn DeliveryHandle>,
    ) -> Outcome {
        let class = failure.class;
        let entry = DeadLetter::for_record(record, class, failure.reason, failure.attempts);

        let written = tokio::time::timeout(
            self.settings.dead_letter_timeout,
            self.dead_letters.write(&entry),
        )
        .await;

        match written {
            Ok(Ok(())) => {
                self.stats.record_dead_lettered();
                info!(
                    %class,
                    reason = %entry.reason,
                    attempts = entry.attempts,
                    "Transaction dead-lettered"
                );
                self.acknowledge(delivery).await;
                Outcome::DeadLettered(class)
            }
            Ok(Err(e)) => {
                error!(
                    %class,
                    error = %e,
                    "Dead-letter write failed, leaving delivery unacknowledged"
                );
                self.stats.record_requeued();
                delivery.reject().await;
                Outcome::Requeued
            }
            Err(_) => {
                error!(%class, "Dead-letter write timed out, leaving delivery unacknowledged");
                self.stats.record_requeued();
                delivery.reject().await;
                Outcome::Requeued
            }
        }
    }

    async fn acknowledge(&self, delivery: Box<dyn DeliveryHandle>) {
        if let Err(e) = delivery.ack().await {
            self.stats.record_ack_failure();
            warn!(error = %e, "Acknowledgment failed, message may be redelivered");
        }
    }
}
