use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::Notify;

use crate::error::StreamError;

/// One message as read from the stream, copied out of the client's buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMessage {
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

/// Subscription to the upstream event stream.
#[async_trait]
pub trait MessageSource: Send + Sync + 'static {
    /// Next message, or `None` once a finite source is exhausted.
    async fn recv(&self) -> Result<Option<SourceMessage>, StreamError>;

    /// Record that every offset below `next_offset` on `partition` is done.
    async fn commit(&self, partition: i32, next_offset: i64) -> Result<(), StreamError>;
}

/// Single-partition in-memory stream. Messages are pushed by the caller and
/// `recv` ends once the source is closed and drained.
#[derive(Default)]
pub struct MemorySource {
    queue: Mutex<VecDeque<SourceMessage>>,
    next_offset: AtomicI64,
    commits: Mutex<Vec<(i32, i64)>>,
    closed: AtomicBool,
    ready: Notify,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, payload: impl Into<Vec<u8>>) -> i64 {
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(SourceMessage {
                partition: 0,
                offset,
                payload: payload.into(),
            });
        self.ready.notify_one();
        offset
    }

    pub fn push_json<T: Serialize>(&self, value: &T) -> Result<i64, serde_json::Error> {
        Ok(self.push(serde_json::to_vec(value)?))
    }

    /// No more messages will be pushed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.ready.notify_one();
    }

    /// Every commit issued so far, in order.
    pub fn commits(&self) -> Vec<(i32, i64)> {
        self.commits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn committed(&self, partition: i32) -> Option<i64> {
        self.commits()
            .into_iter()
            .filter(|(p, _)| *p == partition)
            .map(|(_, offset)| offset)
            .max()
    }

    fn pop(&self) -> Option<SourceMessage> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn recv(&self) -> Result<Option<SourceMessage>, StreamError> {
        loop {
            if let Some(message) = self.pop() {
                return Ok(Some(message));
            }
            if self.closed.load(Ordering::SeqCst) {
                // a push may have raced with close
                return Ok(self.pop());
            }
            self.ready.notified().await;
        }
    }

    async fn commit(&self, partition: i32, next_offset: i64) -> Result<(), StreamError> {
        self.commits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((partition, next_offset));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source_yields_then_ends() {
        let source = MemorySource::new();
        assert_eq!(source.push("a"), 0);
        assert_eq!(source.push("b"), 1);
        source.close();

        let first = source.recv().await.unwrap().unwrap();
        assert_eq!(first.payload, b"a");
        assert_eq!(source.recv().await.unwrap().unwrap().offset, 1);
        assert!(source.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recv_waits_for_push() {
        let source = std::sync::Arc::new(MemorySource::new());
        let reader = {
            let source = source.clone();
            tokio::spawn(async move { source.recv().await })
        };

        tokio::task::yield_now().await;
        source.push("late");

        let message = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(message.payload, b"late");
    }

    #[tokio::test]
    async fn test_commits_are_recorded() {
        let source = MemorySource::new();
        source.commit(0, 3).await.unwrap();
        source.commit(0, 5).await.unwrap();
        assert_eq!(source.committed(0), Some(5));
        assert_eq!(source.commits(), vec![(0, 3), (0, 5)]);
    }
}
