pub mod consumer;
pub mod delivery;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod offsets;
pub mod source;

pub use consumer::{AdapterExit, ConsumerSettings, StreamConsumerAdapter};
pub use delivery::DeliveryHandle;
#[cfg(feature = "kafka")]
pub use kafka::KafkaSource;
pub use offsets::OffsetTracker;
pub use source::{MemorySource, MessageSource, SourceMessage};
