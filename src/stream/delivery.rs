use async_trait::async_trait;

use crate::error::StreamError;

/// Handle bound to one delivered message.
///
/// Exactly one of `ack` or `reject` should be called. A handle that is
/// dropped without either leaves the message unacknowledged, which is safe
/// because the stream redelivers it.
#[async_trait]
pub trait DeliveryHandle: Send + Sync {
    /// How many times this message has been handed to the pipeline, from 1.
    fn attempt(&self) -> u32;

    /// The message is fully handled; its offset may be committed.
    async fn ack(self: Box<Self>) -> Result<(), StreamError>;

    /// The message should be delivered again later.
    async fn reject(self: Box<Self>);
}
