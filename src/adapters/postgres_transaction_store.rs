//! Postgres implementation of TransactionStore.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::TransactionRow;
use crate::domain::Transaction;
use crate::ports::{StoreResult, TransactionStore, UpsertOutcome};

/// Insert-or-update keyed by `transaction_id`.
///
/// The `WHERE ... IS DISTINCT FROM` guard turns an identical upsert into a
/// no-op, so no row is returned and `updated_at` does not move. `is_fraud`
/// only takes the incoming value when `$11` (the override flag) is set.
/// `occurred_at` is immutable after the first insert.
const UPSERT_SQL: &str = r#"
    INSERT INTO transactions (
        id, transaction_id, user_id, amount, currency,
        merchant, category, occurred_at, is_fraud, embedding
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
    ON CONFLICT (transaction_id) DO UPDATE SET
        user_id = EXCLUDED.user_id,
        amount = EXCLUDED.amount,
        currency = EXCLUDED.currency,
        merchant = EXCLUDED.merchant,
        category = EXCLUDED.category,
        embedding = EXCLUDED.embedding,
        is_fraud = CASE WHEN $11 THEN EXCLUDED.is_fraud ELSE transactions.is_fraud END,
        updated_at = NOW()
    WHERE (transactions.user_id, transactions.amount, transactions.currency,
           transactions.merchant, transactions.category, transactions.embedding,
           transactions.is_fraud)
        IS DISTINCT FROM
          (EXCLUDED.user_id, EXCLUDED.amount, EXCLUDED.currency,
           EXCLUDED.merchant, EXCLUDED.category, EXCLUDED.embedding,
           CASE WHEN $11 THEN EXCLUDED.is_fraud ELSE transactions.is_fraud END)
    RETURNING (xmax = 0) AS inserted
"#;

/// Postgres-backed transaction store.
#[derive(Clone)]
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn upsert(&self, tx: &Transaction) -> StoreResult<UpsertOutcome> {
        tx.validate()?;

        let inserted: Option<(bool,)> = sqlx::query_as(UPSERT_SQL)
            .bind(tx.id.unwrap_or_else(Uuid::new_v4))
            .bind(&tx.transaction_id)
            .bind(&tx.user_id)
            .bind(&tx.amount)
            .bind(tx.currency.as_str())
            .bind(tx.merchant.as_str())
            .bind(tx.category.as_str())
            .bind(tx.timestamp)
            .bind(tx.is_fraud)
            .bind(&tx.embedding)
            .bind(tx.fraud_label_override)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match inserted {
            Some((true,)) => UpsertOutcome::Inserted,
            Some((false,)) => UpsertOutcome::Updated,
            None => UpsertOutcome::Unchanged,
        })
    }

    async fn get(&self, transaction_id: &str) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT id, transaction_id, user_id, amount, currency, merchant, category,
                   occurred_at, is_fraud, embedding
            FROM transactions
            WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TransactionRow::into_domain).transpose()
    }
}
