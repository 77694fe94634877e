//! Kafka JSON source built on rdkafka's `StreamConsumer`.

use super::traits::{EventSource, SourceBatch};
use super::SourceError;
use crate::execution::types::{current_time_millis, StreamRecord};
use async_trait::async_trait;
use log::{info, warn};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::Message;
use std::time::Duration;
use tokio::time::timeout;

/// How long `read` waits for the first message of a batch
const POLL_TIMEOUT: Duration = Duration::from_millis(500);
/// How long to wait for follow-up messages once a batch has started
const FILL_TIMEOUT: Duration = Duration::from_millis(10);

pub struct KafkaJsonSource {
    consumer: StreamConsumer,
    topic: String,
    batch_size: usize,
}

/// Consumer settings. Offsets are only committed through `commit`, after a batch has
/// been handed to the job.
fn consumer_config(brokers: &str, group_id: &str) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", brokers)
        .set("group.id", group_id)
        .set("auto.offset.reset", "earliest")
        .set("enable.auto.commit", "false")
        .set("session.timeout.ms", "6000");
    config
}

impl KafkaJsonSource {
    pub fn new(
        brokers: &str,
        topic: &str,
        group_id: &str,
        batch_size: usize,
    ) -> Result<Self, SourceError> {
        let consumer: StreamConsumer = consumer_config(brokers, group_id).create()?;

        consumer.subscribe(&[topic])?;
        info!(
            "Subscribed to Kafka topic '{}' on {} as group '{}'",
            topic, brokers, group_id
        );

        Ok(Self {
            consumer,
            topic: topic.to_string(),
            batch_size: batch_size.max(1),
        })
    }
}

#[async_trait]
impl EventSource for KafkaJsonSource {
    fn name(&self) -> String {
        format!("kafka:{}", self.topic)
    }

    async fn read(&mut self) -> Result<Option<SourceBatch>, SourceError> {
        let mut batch = SourceBatch::default();
        let mut wait = POLL_TIMEOUT;

        while batch.records.len() < self.batch_size {
            let message = match timeout(wait, self.consumer.recv()).await {
                Ok(message) => message?,
                Err(_) => break,
            };
            wait = FILL_TIMEOUT;

            let Some(payload) = message.payload() else {
                warn!(
                    "Skipping empty message at {}/{}",
                    message.partition(),
                    message.offset()
                );
                batch.malformed += 1;
                continue;
            };

            match StreamRecord::from_json_slice(payload) {
                Ok(record) => batch.records.push(
                    record
                        .with_timestamp(current_time_millis())
                        .with_position(message.partition(), message.offset()),
                ),
                Err(reason) => {
                    warn!(
                        "Skipping undecodable message at {}/{}: {}",
                        message.partition(),
                        message.offset(),
                        reason
                    );
                    batch.malformed += 1;
                }
            }
        }

        Ok(Some(batch))
    }

    async fn commit(&mut self) -> Result<(), SourceError> {
        self.consumer.commit_consumer_state(CommitMode::Sync)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_are_committed_manually() {
        let config = consumer_config("localhost:9092", "gearshift");
        assert_eq!(config.get("enable.auto.commit"), Some("false"));
        assert_eq!(config.get("group.id"), Some("gearshift"));
        assert_eq!(config.get("auto.offset.reset"), Some("earliest"));
    }
}
