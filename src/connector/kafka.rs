//! Kafka connections backed by rdkafka's [`FutureProducer`].
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rdkafka::{
    ClientConfig,
    producer::{FutureProducer, FutureRecord, Producer},
};

use super::{Connection, Connector};
use crate::{config::ProducerSettings, message::Message};

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens Kafka producers configured from [`ProducerSettings`].
#[derive(Clone, Debug)]
pub struct KafkaConnector {
    settings: ProducerSettings,
}

impl KafkaConnector {
    /// Creates a connector for the given settings.
    pub fn new(settings: ProducerSettings) -> Self {
        Self { settings }
    }

    fn client_config(&self, index: usize) -> ClientConfig {
        let s = &self.settings;
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &s.bootstrap_servers)
            .set("client.id", format!("kload-{index}"))
            .set("compression.type", &s.compression)
            .set("acks", &s.acks)
            .set("linger.ms", s.linger_ms.to_string())
            .set("batch.size", s.batch_size.to_string())
            .set("message.max.bytes", s.max_request_size.to_string())
            .set("message.timeout.ms", s.delivery_timeout().as_millis().to_string());
        config
    }
}

/// One Kafka producer.
pub struct KafkaConnection {
    producer: FutureProducer,
    timeout: Duration,
}

#[async_trait]
impl Connector for KafkaConnector {
    type Conn = KafkaConnection;

    async fn connect(&self, index: usize) -> Result<KafkaConnection> {
        let producer: FutureProducer =
            self.client_config(index).create().context("Failed to create Kafka producer")?;

        // Creating a producer does not touch the network; fetching metadata
        // makes an unreachable cluster fail here instead of on the first send.
        let probe = producer.clone();
        tokio::task::spawn_blocking(move || probe.client().fetch_metadata(None, METADATA_TIMEOUT))
            .await?
            .with_context(|| format!("Failed to reach Kafka at {}", self.settings.bootstrap_servers))?;

        Ok(KafkaConnection { producer, timeout: self.settings.delivery_timeout() })
    }
}

#[async_trait]
impl Connection for KafkaConnection {
    async fn send(&self, target: &str, message: &Message) -> Result<()> {
        let payload = message.to_json().context("Failed to encode message")?;
        let record = FutureRecord::to(target).key(message.id.as_bytes()).payload(&payload);

        self.producer
            .send(record, self.timeout)
            .await
            .map_err(|(err, _)| err)
            .context("Failed to send message to Kafka")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let producer = self.producer.clone();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await?
            .context("Failed to flush Kafka producer")?;
        Ok(())
    }
}
