//! Postgres implementation of DeadLetterSink, backed by `transaction_dlq`.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::models::DeadLetterRow;
use crate::error::StoreError;
use crate::ports::{DeadLetter, DeadLetterSink, StoreResult};

#[derive(Clone)]
pub struct PgDeadLetterSink {
    pool: PgPool,
}

impl PgDeadLetterSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterSink for PgDeadLetterSink {
    async fn write(&self, entry: &DeadLetter) -> StoreResult<()> {
        let payload = serde_json::to_value(&entry.payload)
            .map_err(|e| StoreError::Permanent(e.to_string()))?;
        let attempts = i32::try_from(entry.attempts).unwrap_or(i32::MAX);

        sqlx::query(
            r#"
            INSERT INTO transaction_dlq (
                id, dedupe_key, transaction_id, payload, failure_class,
                error_reason, attempts, last_failed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (dedupe_key) DO UPDATE SET
                payload = EXCLUDED.payload,
                failure_class = EXCLUDED.failure_class,
                error_reason = EXCLUDED.error_reason,
                attempts = CASE
                    WHEN transaction_dlq.payload = EXCLUDED.payload
                        THEN GREATEST(transaction_dlq.attempts, EXCLUDED.attempts)
                    ELSE EXCLUDED.attempts
                END,
                last_failed_at = EXCLUDED.last_failed_at
            "#,
        )
        .bind(entry.id)
        .bind(&entry.dedupe_key)
        .bind(&entry.transaction_id)
        .bind(payload)
        .bind(entry.class.as_str())
        .bind(&entry.reason)
        .bind(attempts)
        .bind(entry.failed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, limit: i64) -> StoreResult<Vec<DeadLetter>> {
        let rows = sqlx::query_as::<_, DeadLetterRow>(
            r#"
            SELECT id, dedupe_key, transaction_id, payload, failure_class,
                   error_reason, attempts, last_failed_at
            FROM transaction_dlq
            ORDER BY last_failed_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DeadLetterRow::into_domain).collect()
    }
}
