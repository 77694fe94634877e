//! Kafka sink built on rdkafka's `FutureProducer`.

use super::{LineSink, SinkError};
use async_trait::async_trait;
use log::{debug, info};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct KafkaSink {
    producer: FutureProducer,
    topic: String,
}

impl KafkaSink {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, SinkError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        info!("Created Kafka sink for topic '{}' on {}", topic, brokers);

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl LineSink for KafkaSink {
    fn name(&self) -> String {
        format!("kafka:{}", self.topic)
    }

    async fn deliver(&mut self, line: &str) -> Result<(), SinkError> {
        let record: FutureRecord<'_, (), str> = FutureRecord::to(&self.topic).payload(line);
        match self
            .producer
            .send(record, Timeout::After(SEND_TIMEOUT))
            .await
        {
            Ok(_) => {
                debug!("Line sent to topic '{}'", self.topic);
                Ok(())
            }
            Err((err, _)) => Err(SinkError::Kafka(err)),
        }
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.producer.flush(Timeout::After(FLUSH_TIMEOUT))?;
        Ok(())
    }
}
