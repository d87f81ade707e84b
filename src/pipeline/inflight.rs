use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-key mutual exclusion. Two deliveries of the same transaction never
/// run through the pipeline at the same time; different keys never wait on
/// each other. Entries are removed once nobody holds or waits on them.
#[derive(Default)]
pub struct InFlight {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> InFlightGuard<'_> {
        let lock = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .clone();

        InFlightGuard {
            owner: self,
            key: key.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self
            .owner
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let in_flight = Arc::new(InFlight::new());
        let active = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let (in_flight, active, max_seen) =
                (in_flight.clone(), active.clone(), max_seen.clone());
            tasks.push(tokio::spawn(async move {
                let _guard = in_flight.acquire("T1").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let in_flight = InFlight::new();
        let _a = in_flight.acquire("T1").await;
        let b = tokio::time::timeout(Duration::from_millis(50), in_flight.acquire("T2")).await;

        assert!(b.is_ok());
        assert_eq!(in_flight.len(), 2);
    }
}
