use chrono::{DateTime, Utc};
use sqlx::types::BigDecimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::Transaction;
use crate::error::StoreError;
use crate::ports::{DeadLetter, DeadLetterPayload};

/// Row type for the `transactions` table. Not exposed outside the adapters.
#[derive(Debug, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub transaction_id: String,
    pub user_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub merchant: String,
    pub category: String,
    pub occurred_at: DateTime<Utc>,
    pub is_fraud: bool,
    pub embedding: Vec<f32>,
}

impl TransactionRow {
    pub fn into_domain(self) -> Result<Transaction, StoreError> {
        Ok(Transaction {
            id: Some(self.id),
            transaction_id: self.transaction_id,
            user_id: self.user_id,
            amount: self.amount,
            currency: self.currency.parse()?,
            timestamp: self.occurred_at,
            merchant: self.merchant.parse()?,
            category: self.category.parse()?,
            is_fraud: self.is_fraud,
            fraud_label_override: false,
            embedding: self.embedding,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct DeadLetterRow {
    pub id: Uuid,
    pub dedupe_key: String,
    pub transaction_id: Option<String>,
    pub payload: serde_json::Value,
    pub failure_class: String,
    pub error_reason: String,
    pub attempts: i32,
    pub last_failed_at: DateTime<Utc>,
}

impl DeadLetterRow {
    pub fn into_domain(self) -> Result<DeadLetter, StoreError> {
        let payload: DeadLetterPayload = serde_json::from_value(self.payload)
            .map_err(|e| StoreError::Permanent(format!("undecodable dead-letter payload: {}", e)))?;

        Ok(DeadLetter {
            id: self.id,
            dedupe_key: self.dedupe_key,
            transaction_id: self.transaction_id,
            payload,
            class: self.failure_class.parse().map_err(StoreError::Permanent)?,
            reason: self.error_reason,
            attempts: u32::try_from(self.attempts).unwrap_or(0),
            failed_at: self.last_failed_at,
        })
    }
}
