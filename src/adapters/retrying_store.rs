//! Store decorator that absorbs transient failures with bounded backoff.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::Transaction;
use crate::error::StoreError;
use crate::pipeline::retry::{retry_with_backoff, RetryPolicy};
use crate::ports::{StoreResult, TransactionStore, UpsertOutcome};

pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
    timeout: Duration,
}

impl<S: TransactionStore> RetryingStore<S> {
    /// `timeout` bounds every individual call to `inner`.
    pub fn new(inner: S, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            inner,
            policy,
            timeout,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: std::future::Future<Output = StoreResult<T>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Transient(format!("store call exceeded {:?}", self.timeout)))?
    }
}

#[async_trait]
impl<S: TransactionStore> TransactionStore for RetryingStore<S> {
    async fn upsert(&self, tx: &Transaction) -> StoreResult<UpsertOutcome> {
        let (result, attempts) = retry_with_backoff(
            &self.policy,
            "store.upsert",
            StoreError::is_retryable,
            |_| self.bounded(self.inner.upsert(tx)),
        )
        .await;

        if attempts > 1 {
            tracing::debug!(
                transaction_id = %tx.transaction_id,
                attempts,
                ok = result.is_ok(),
                "Upsert finished after retries"
            );
        }
        result
    }

    async fn get(&self, transaction_id: &str) -> StoreResult<Option<Transaction>> {
        retry_with_backoff(
            &self.policy,
            "store.get",
            StoreError::is_retryable,
            |_| self.bounded(self.inner.get(transaction_id)),
        )
        .await
        .0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryTransactionStore;
    use crate::domain::{Category, Currency, Merchant};
    use bigdecimal::BigDecimal;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FailingStore {
        inner: MemoryTransactionStore,
        failures_left: AtomicU32,
        error: fn() -> StoreError,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TransactionStore for FailingStore {
        async fn upsert(&self, tx: &Transaction) -> StoreResult<UpsertOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err((self.error)());
            }
            self.inner.upsert(tx).await
        }

        async fn get(&self, transaction_id: &str) -> StoreResult<Option<Transaction>> {
            self.inner.get(transaction_id).await
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            factor: 2.0,
            max_delay: Duration::from_millis(5),
            jitter: false,
        }
    }

    fn record() -> Transaction {
        Transaction::new(
            "T1",
            "U1",
            BigDecimal::from(5),
            Currency::Gbp,
            Merchant::M3,
            Category::Electronics,
        )
    }

    fn failing(failures: u32, error: fn() -> StoreError) -> FailingStore {
        FailingStore {
            inner: MemoryTransactionStore::new(),
            failures_left: AtomicU32::new(failures),
            error,
            calls: AtomicU32::new(0),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let store = RetryingStore::new(
            failing(2, || StoreError::Transient("connection reset".into())),
            policy(),
            Duration::from_secs(1),
        );

        assert_eq!(store.upsert(&record()).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_surfaces_transient_after_budget() {
        let store = RetryingStore::new(
            failing(3, || StoreError::Transient("connection reset".into())),
            policy(),
            Duration::from_secs(1),
        );

        assert!(store.upsert(&record()).await.unwrap_err().is_retryable());
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_is_not_retried() {
        let store = RetryingStore::new(
            failing(1, || StoreError::Permanent("check constraint".into())),
            policy(),
            Duration::from_secs(1),
        );

        assert!(!store.upsert(&record()).await.unwrap_err().is_retryable());
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 1);
    }
}
