//! Message Bus Sinks
//!
//! The publisher writes through the [`EventSink`] trait so that the bus can
//! be swapped: Kafka in production, the log for dry runs, memory in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::client::ClientBuilder;
use rskafka::record::Record;
use tracing::{info, warn};

use crate::error::SinkError;

/// Append-only destination for serialized events
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Write one keyed message
    async fn write(&self, key: &str, value: Vec<u8>) -> Result<(), SinkError>;

    /// Human-readable destination, for logs
    fn describe(&self) -> String;
}

/// Kafka producer for one topic partition
pub struct KafkaSink {
    client: PartitionClient,
    topic: String,
    partition: i32,
}

impl KafkaSink {
    /// Connect to the brokers and resolve the topic partition
    ///
    /// # Arguments
    ///
    /// * `brokers` - Bootstrap broker addresses (`host:port`)
    /// * `topic` - Destination topic, which must already exist
    /// * `partition` - Partition every event is written to
    pub async fn connect(
        brokers: Vec<String>,
        topic: impl Into<String>,
        partition: i32,
    ) -> Result<Self, SinkError> {
        let topic = topic.into();
        info!(brokers = ?brokers, %topic, partition, "connecting to Kafka");

        let client = ClientBuilder::new(brokers)
            .build()
            .await
            .map_err(|e| {
                warn!(error = %e, "Kafka bootstrap failed");
                SinkError::Kafka(e)
            })?;

        let client = client
            .partition_client(topic.clone(), partition, UnknownTopicHandling::Error)
            .await
            .map_err(|e| {
                warn!(%topic, partition, error = %e, "Kafka partition unavailable");
                SinkError::Kafka(e)
            })?;

        Ok(Self {
            client,
            topic,
            partition,
        })
    }
}

#[async_trait]
impl EventSink for KafkaSink {
    async fn write(&self, key: &str, value: Vec<u8>) -> Result<(), SinkError> {
        let record = Record {
            key: Some(key.as_bytes().to_vec()),
            value: Some(value),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };

        self.client
            .produce(vec![record], Compression::NoCompression)
            .await
            .map(|_| ())
            .map_err(SinkError::Kafka)
    }

    fn describe(&self) -> String {
        format!("kafka://{}/{}", self.topic, self.partition)
    }
}

/// Logs events instead of publishing them
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn write(&self, key: &str, value: Vec<u8>) -> Result<(), SinkError> {
        info!(%key, message = %String::from_utf8_lossy(&value), "dry run, event not published");
        Ok(())
    }

    fn describe(&self) -> String {
        "log (dry run)".to_string()
    }
}

#[async_trait]
impl<S: EventSink + ?Sized> EventSink for Box<S> {
    async fn write(&self, key: &str, value: Vec<u8>) -> Result<(), SinkError> {
        (**self).write(key, value).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Split a comma-separated broker list, dropping blanks
pub fn parse_brokers(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_brokers() {
        assert_eq!(
            parse_brokers("kafka-0:9092, kafka-1:9092,,"),
            vec!["kafka-0:9092".to_string(), "kafka-1:9092".to_string()]
        );
        assert!(parse_brokers("").is_empty());
    }

    #[tokio::test]
    async fn test_log_sink_accepts_everything() {
        let sink = LogSink;
        assert!(sink.write("k8s_quota", b"{}".to_vec()).await.is_ok());
        assert_eq!(sink.describe(), "log (dry run)");
    }

    #[tokio::test]
    async fn test_boxed_sink_delegates() {
        let sink: Box<dyn EventSink> = Box::new(LogSink);
        assert!(sink.write("k", Vec::new()).await.is_ok());
        assert_eq!(sink.describe(), "log (dry run)");
    }
}
