//! In-process implementations of the storage ports. Used by the simulator,
//! by runs without `DATABASE_URL`, and by tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::Transaction;
use crate::ports::{DeadLetter, DeadLetterSink, StoreResult, TransactionStore, UpsertOutcome};

#[derive(Default)]
pub struct MemoryTransactionStore {
    records: RwLock<HashMap<String, Transaction>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn upsert(&self, tx: &Transaction) -> StoreResult<UpsertOutcome> {
        tx.validate()?;

        let mut records = self.records.write().await;
        let Some(existing) = records.get_mut(&tx.transaction_id) else {
            let mut stored = tx.clone();
            stored.id = Some(Uuid::new_v4());
            stored.fraud_label_override = false;
            records.insert(stored.transaction_id.clone(), stored);
            return Ok(UpsertOutcome::Inserted);
        };

        let mut next = tx.clone();
        next.id = existing.id;
        next.timestamp = existing.timestamp;
        next.fraud_label_override = false;
        if !tx.fraud_label_override {
            next.is_fraud = existing.is_fraud;
        }

        if next == *existing {
            return Ok(UpsertOutcome::Unchanged);
        }
        *existing = next;
        Ok(UpsertOutcome::Updated)
    }

    async fn get(&self, transaction_id: &str) -> StoreResult<Option<Transaction>> {
        Ok(self.records.read().await.get(transaction_id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryDeadLetterSink {
    entries: RwLock<Vec<DeadLetter>>,
}

impl MemoryDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<DeadLetter> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetterSink {
    async fn write(&self, entry: &DeadLetter) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.dedupe_key == entry.dedupe_key) {
            // A different message under the same key replaces the entry whole.
            Some(existing) if existing.payload != entry.payload => {
                *existing = DeadLetter {
                    id: existing.id,
                    ..entry.clone()
                };
            }
            Some(existing) => {
                existing.class = entry.class;
                existing.reason = entry.reason.clone();
                existing.attempts = existing.attempts.max(entry.attempts);
                existing.failed_at = entry.failed_at;
            }
            None => entries.push(entry.clone()),
        }
        Ok(())
    }

    async fn list(&self, limit: i64) -> StoreResult<Vec<DeadLetter>> {
        let entries = self.entries.read().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}

/// Dead-letter sink that only logs. Used when no database is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDeadLetterSink;

#[async_trait]
impl DeadLetterSink for LogDeadLetterSink {
    async fn write(&self, entry: &DeadLetter) -> StoreResult<()> {
        let payload = serde_json::to_string(&entry.payload).unwrap_or_default();
        tracing::error!(
            dedupe_key = %entry.dedupe_key,
            transaction_id = entry.transaction_id.as_deref().unwrap_or("-"),
            class = %entry.class,
            attempts = entry.attempts,
            reason = %entry.reason,
            payload = %payload,
            "Dead-lettered message"
        );
        Ok(())
    }

    async fn list(&self, _limit: i64) -> StoreResult<Vec<DeadLetter>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, Currency, Merchant};
    use crate::error::FailureClass;
    use crate::ports::DeadLetterPayload;
    use bigdecimal::BigDecimal;

    fn record(id: &str) -> Transaction {
        Transaction::new(
            id,
            "U1",
            BigDecimal::from(42),
            Currency::Usd,
            Merchant::M1,
            Category::Grocery,
        )
        .with_embedding(vec![0.5, 0.5], 2)
        .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = MemoryTransactionStore::new();
        let tx = record("T1");

        assert_eq!(store.upsert(&tx).await.unwrap(), UpsertOutcome::Inserted);
        let first = store.get("T1").await.unwrap().unwrap();
        assert_eq!(store.upsert(&tx).await.unwrap(), UpsertOutcome::Unchanged);
        let second = store.get("T1").await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len().await, 1);
        assert!(first.id.is_some());
    }

    #[tokio::test]
    async fn test_upsert_keeps_fraud_label_without_override() {
        let store = MemoryTransactionStore::new();
        store.upsert(&record("T1")).await.unwrap();
        store
            .upsert(&record("T1").with_fraud_label(true))
            .await
            .unwrap();

        let outcome = store.upsert(&record("T1")).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert!(store.get("T1").await.unwrap().unwrap().is_fraud);
    }

    #[tokio::test]
    async fn test_upsert_updates_changed_fields() {
        let store = MemoryTransactionStore::new();
        store.upsert(&record("T1")).await.unwrap();

        let mut changed = record("T1");
        changed.amount = BigDecimal::from(43);
        assert_eq!(store.upsert(&changed).await.unwrap(), UpsertOutcome::Updated);
        assert_eq!(
            store.get("T1").await.unwrap().unwrap().amount,
            BigDecimal::from(43)
        );
    }

    #[tokio::test]
    async fn test_upsert_rejects_invalid_record_permanently() {
        let store = MemoryTransactionStore::new();
        let mut tx = record("T1");
        tx.amount = BigDecimal::from(-1);

        let err = store.upsert(&tx).await.unwrap_err();
        assert_eq!(err.class(), FailureClass::Permanent);
    }

    #[tokio::test]
    async fn test_dead_letter_sink_collapses_duplicates() {
        let sink = MemoryDeadLetterSink::new();
        let first = DeadLetter::for_record(record("T1"), FailureClass::Transient, "timeout", 1);
        let second = DeadLetter::for_record(record("T1"), FailureClass::Transient, "timeout", 3);

        sink.write(&first).await.unwrap();
        sink.write(&second).await.unwrap();

        let entries = sink.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attempts, 3);
    }

    #[tokio::test]
    async fn test_dead_letter_for_different_record_replaces_payload() {
        let sink = MemoryDeadLetterSink::new();
        let mut invalid = record("T1");
        invalid.amount = BigDecimal::from(-1);
        let first = DeadLetter::for_record(
            invalid,
            FailureClass::InvalidInput,
            "amount must be positive",
            1,
        );

        let mut other = record("T1");
        other.user_id = "U2".into();
        other.amount = BigDecimal::from(77);
        let second = DeadLetter::for_record(
            other.clone(),
            FailureClass::ProviderUnavailable,
            "provider down",
            1,
        );

        sink.write(&first).await.unwrap();
        sink.write(&second).await.unwrap();

        let entries = sink.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, first.id);
        assert_eq!(entries[0].class, FailureClass::ProviderUnavailable);
        assert_eq!(entries[0].reason, "provider down");
        assert_eq!(entries[0].payload, DeadLetterPayload::Record(other));
    }
}
