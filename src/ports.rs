//! Storage boundaries used by the pipeline.
//! Adapters in `crate::adapters` implement these for Postgres and in memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::Transaction;
use crate::error::{FailureClass, StoreError};

pub type StoreResult<T> = Result<T, StoreError>;

/// Observable effect of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Persistence gateway keyed by `transaction_id`.
///
/// `upsert` inserts absent records and otherwise updates every field except
/// `is_fraud`, which only changes when the incoming record carries
/// `fraud_label_override`. Repeating an identical upsert is `Unchanged`.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn upsert(&self, tx: &Transaction) -> StoreResult<UpsertOutcome>;

    async fn get(&self, transaction_id: &str) -> StoreResult<Option<Transaction>>;
}

/// What a dead-letter entry preserves about the failed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DeadLetterPayload {
    Record(Transaction),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub id: Uuid,
    /// Stable key so repeated failures of the same message collapse into one entry.
    pub dedupe_key: String,
    pub transaction_id: Option<String>,
    pub payload: DeadLetterPayload,
    pub class: FailureClass,
    pub reason: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn for_record(
        record: Transaction,
        class: FailureClass,
        reason: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            dedupe_key: record.transaction_id.clone(),
            transaction_id: Some(record.transaction_id.clone()),
            payload: DeadLetterPayload::Record(record),
            class,
            reason: reason.into(),
            attempts,
            failed_at: Utc::now(),
        }
    }

    pub fn for_raw_payload(
        payload: &[u8],
        class: FailureClass,
        reason: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            dedupe_key: payload_fingerprint(payload),
            transaction_id: None,
            payload: DeadLetterPayload::Raw(String::from_utf8_lossy(payload).into_owned()),
            class,
            reason: reason.into(),
            attempts,
            failed_at: Utc::now(),
        }
    }
}

pub fn payload_fingerprint(payload: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(payload)))
}

/// Append-only destination for messages that must not be retried again.
/// Writing an entry whose `dedupe_key` already exists refreshes that entry.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn write(&self, entry: &DeadLetter) -> StoreResult<()>;

    async fn list(&self, limit: i64) -> StoreResult<Vec<DeadLetter>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_payload_dedupe_key_is_stable() {
        let a = DeadLetter::for_raw_payload(b"{bad", FailureClass::Permanent, "eof", 1);
        let b = DeadLetter::for_raw_payload(b"{bad", FailureClass::Permanent, "eof", 2);
        assert_eq!(a.dedupe_key, b.dedupe_key);
        assert!(a.dedupe_key.starts_with("sha256:"));
        assert_eq!(a.dedupe_key.len(), "sha256:".len() + 64);
        assert_eq!(a.payload, DeadLetterPayload::Raw("{bad".to_string()));
    }

    #[test]
    fn test_payload_serializes_tagged() {
        let value = serde_json::to_value(DeadLetterPayload::Raw("x".into())).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "raw", "value": "x"}));
    }
}
