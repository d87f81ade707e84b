//! Kafka-backed message source.

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::{Message, Offset};

use super::source::{MessageSource, SourceMessage};
use crate::config::KafkaConfig;
use crate::error::StreamError;

pub struct KafkaSource {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaSource {
    /// Subscribes to the configured topic. Auto-commit is disabled; offsets
    /// move only through [`MessageSource::commit`].
    pub fn connect(config: &KafkaConfig) -> Result<Self, StreamError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "10000")
            .create()
            .map_err(|e| StreamError::Transport(e.to_string()))?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| StreamError::Transport(e.to_string()))?;

        tracing::info!(
            bootstrap = %config.bootstrap_servers,
            topic = %config.topic,
            group_id = %config.group_id,
            "Subscribed to Kafka topic"
        );

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn recv(&self) -> Result<Option<SourceMessage>, StreamError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))?;

        Ok(Some(SourceMessage {
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().unwrap_or_default().to_vec(),
        }))
    }

    async fn commit(&self, partition: i32, next_offset: i64) -> Result<(), StreamError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(&self.topic, partition, Offset::Offset(next_offset))
            .map_err(|e| StreamError::Commit(e.to_string()))?;
        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| StreamError::Commit(e.to_string()))
    }
}
