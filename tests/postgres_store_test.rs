use bigdecimal::BigDecimal;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use std::path::Path;
use std::str::FromStr;

use fraud_ingest::adapters::{PgDeadLetterSink, PgTransactionStore};
use fraud_ingest::domain::{Category, Currency, Merchant, Transaction};
use fraud_ingest::error::FailureClass;
use fraud_ingest::ports::{
    DeadLetter, DeadLetterPayload, DeadLetterSink, TransactionStore, UpsertOutcome,
};

async fn setup_db() -> Option<PgPool> {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(v) => v,
        Err(_) => {
            println!("Skipping Postgres test: DATABASE_URL not set");
            return None;
        }
    };

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test DB");
    let migrator = Migrator::new(Path::join(Path::new(env!("CARGO_MANIFEST_DIR")), "migrations"))
        .await
        .expect("Failed to load migrations");
    migrator.run(&pool).await.expect("Failed to run migrations");
    Some(pool)
}

fn record() -> Transaction {
    Transaction::new(
        uuid::Uuid::new_v4().to_string(),
        "U1",
        BigDecimal::from_str("120.50").unwrap(),
        Currency::Usd,
        Merchant::M1,
        Category::Grocery,
    )
    .with_embedding(vec![0.25, -0.5, 0.75, 0.0], 4)
    .unwrap()
}

#[tokio::test]
async fn test_upsert_insert_then_unchanged_then_updated() {
    let Some(pool) = setup_db().await else { return };
    let store = PgTransactionStore::new(pool);
    let tx = record();

    assert_eq!(store.upsert(&tx).await.unwrap(), UpsertOutcome::Inserted);
    assert_eq!(store.upsert(&tx).await.unwrap(), UpsertOutcome::Unchanged);

    let mut changed = tx.clone();
    changed.merchant = Merchant::M2;
    assert_eq!(store.upsert(&changed).await.unwrap(), UpsertOutcome::Updated);

    let stored = store.get(&tx.transaction_id).await.unwrap().unwrap();
    assert_eq!(stored.merchant, Merchant::M2);
    assert_eq!(stored.embedding, vec![0.25, -0.5, 0.75, 0.0]);
    assert_eq!(stored.amount, BigDecimal::from_str("120.50").unwrap());
    assert!(stored.id.is_some());
}

#[tokio::test]
async fn test_fraud_label_only_changes_with_override() {
    let Some(pool) = setup_db().await else { return };
    let store = PgTransactionStore::new(pool);
    let tx = record();

    store.upsert(&tx.clone().with_fraud_label(true)).await.unwrap();
    assert_eq!(store.upsert(&tx).await.unwrap(), UpsertOutcome::Unchanged);
    assert!(store.get(&tx.transaction_id).await.unwrap().unwrap().is_fraud);

    store.upsert(&tx.clone().with_fraud_label(false)).await.unwrap();
    assert!(!store.get(&tx.transaction_id).await.unwrap().unwrap().is_fraud);
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let Some(pool) = setup_db().await else { return };
    let store = PgTransactionStore::new(pool);

    assert!(store.get("does-not-exist").await.unwrap().is_none());
}

#[tokio::test]
async fn test_dead_letter_write_deduplicates_by_key() {
    let Some(pool) = setup_db().await else { return };
    let sink = PgDeadLetterSink::new(pool);
    let tx = record();

    let first = DeadLetter::for_record(tx.clone(), FailureClass::ProviderUnavailable, "timeout", 3);
    let second = DeadLetter::for_record(tx.clone(), FailureClass::Transient, "pool timed out", 5);
    sink.write(&first).await.unwrap();
    sink.write(&second).await.unwrap();

    let entries: Vec<_> = sink
        .list(100)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.dedupe_key == tx.transaction_id)
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attempts, 5);
    assert_eq!(entries[0].class, FailureClass::Transient);
    assert_eq!(entries[0].reason, "pool timed out");
}

#[tokio::test]
async fn test_dead_letter_for_different_record_replaces_payload() {
    let Some(pool) = setup_db().await else { return };
    let sink = PgDeadLetterSink::new(pool);
    let tx = record();
    let mut other = tx.clone();
    other.user_id = "U2".into();
    other.amount = BigDecimal::from(77);

    let first = DeadLetter::for_record(tx.clone(), FailureClass::InvalidInput, "bad amount", 4);
    let second = DeadLetter::for_record(
        other.clone(),
        FailureClass::ProviderUnavailable,
        "provider down",
        1,
    );
    sink.write(&first).await.unwrap();
    sink.write(&second).await.unwrap();

    let entries: Vec<_> = sink
        .list(100)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.dedupe_key == tx.transaction_id)
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].reason, "provider down");
    assert_eq!(entries[0].attempts, 1);
    assert_eq!(entries[0].payload, DeadLetterPayload::Record(other));
}

#[tokio::test]
async fn test_raw_payload_dead_letter_round_trip() {
    let Some(pool) = setup_db().await else { return };
    let sink = PgDeadLetterSink::new(pool);
    let raw = format!("{{\"transactionId\":\"{}\"", uuid::Uuid::new_v4());

    let entry = DeadLetter::for_raw_payload(raw.as_bytes(), FailureClass::Permanent, "EOF", 1);
    sink.write(&entry).await.unwrap();

    let listed = sink.list(100).await.unwrap();
    let found = listed
        .iter()
        .find(|e| e.dedupe_key == entry.dedupe_key)
        .expect("entry listed");
    assert!(found.transaction_id.is_none());
    assert_eq!(found.payload, entry.payload);
}
