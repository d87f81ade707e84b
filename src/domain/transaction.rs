//! Transaction domain entity.
//! Framework-agnostic representation of one financial transaction and its embedding.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Category, Currency, Merchant};
use crate::validation::{
    validate_finite, validate_max_len, validate_positive, validate_required, ValidationError,
    ValidationResult, TRANSACTION_ID_MAX_LEN, USER_ID_MAX_LEN,
};

/// Domain entity representing a transaction.
///
/// A record is *raw* while `embedding` is empty and *enriched* once a vector
/// has been attached through [`Transaction::with_embedding`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(alias = "transaction_id")]
    pub transaction_id: String,
    pub user_id: String,
    pub amount: BigDecimal,
    pub currency: Currency,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub merchant: Merchant,
    pub category: Category,
    #[serde(default, alias = "fraud")]
    pub is_fraud: bool,
    /// Set only by a scorer that means to replace an existing label.
    /// Never read from the wire; see [`Transaction::with_fraud_label`].
    #[serde(skip_deserializing, skip_serializing_if = "std::ops::Not::not")]
    pub fraud_label_override: bool,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl Transaction {
    pub fn new(
        transaction_id: impl Into<String>,
        user_id: impl Into<String>,
        amount: BigDecimal,
        currency: Currency,
        merchant: Merchant,
        category: Category,
    ) -> Self {
        Self {
            id: None,
            transaction_id: transaction_id.into(),
            user_id: user_id.into(),
            amount,
            currency,
            timestamp: Utc::now(),
            merchant,
            category,
            is_fraud: false,
            fraud_label_override: false,
            embedding: Vec::new(),
        }
    }

    pub fn validate(&self) -> ValidationResult {
        validate_required("transactionId", &self.transaction_id)?;
        validate_max_len("transactionId", &self.transaction_id, TRANSACTION_ID_MAX_LEN)?;
        validate_required("userId", &self.user_id)?;
        validate_max_len("userId", &self.user_id, USER_ID_MAX_LEN)?;
        validate_positive("amount", &self.amount)?;
        validate_finite("embedding", &self.embedding)?;
        Ok(())
    }

    pub fn is_enriched(&self) -> bool {
        !self.embedding.is_empty()
    }

    /// Text handed to the embedding provider. Field order is fixed so that
    /// records with identical attributes always produce identical input.
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.user_id,
            plain_amount(&self.amount),
            self.currency,
            self.merchant,
            self.category
        )
    }

    /// Attach an embedding. The vector must have exactly `dimensions`
    /// finite components, at least one of them non-zero.
    pub fn with_embedding(
        mut self,
        vector: Vec<f32>,
        dimensions: usize,
    ) -> Result<Self, ValidationError> {
        if vector.len() != dimensions {
            return Err(ValidationError::new(
                "embedding",
                format!("expected {} dimensions, got {}", dimensions, vector.len()),
            ));
        }
        validate_finite("embedding", &vector)?;
        if vector.iter().all(|v| *v == 0.0) {
            return Err(ValidationError::new("embedding", "vector is all zeros"));
        }

        self.embedding = vector;
        Ok(self)
    }

    /// Mark this record as an intentional fraud-label update.
    pub fn with_fraud_label(mut self, is_fraud: bool) -> Self {
        self.is_fraud = is_fraud;
        self.fraud_label_override = true;
        self
    }
}

/// Decimal rendering without trailing fractional zeros (`120.50` -> `120.5`).
fn plain_amount(amount: &BigDecimal) -> String {
    let text = amount.to_string();
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}
