//! Publisher gateway
//!
//! The broker seam of the prepare pipeline. The command handler only sees
//! [`PublisherGateway::send`]; connection handling, partition placement and
//! delivery acknowledgment belong to the implementation.
//!
//! Two implementations are provided:
//! - [`KafkaRestGateway`]: produces to a Kafka REST proxy over HTTP
//! - [`InMemoryGateway`]: records envelopes in memory, for tests and local runs

pub mod kafka_rest;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::RequiredSettings;
use crate::contracts::EventEnvelope;
use crate::error::{ConfigError, PublishError};
use crate::init::Initializable;

pub use kafka_rest::KafkaRestGateway;
pub use memory::InMemoryGateway;

/// Connection string scheme that selects the in-memory gateway
pub const MEMORY_SCHEME: &str = "memory://";

/// Broker acceptance of one envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub msg_id: Uuid,
    /// Transfer id of the published event
    pub entity_id: String,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

impl Ack {
    pub fn for_envelope(envelope: &EventEnvelope) -> Self {
        Self {
            msg_id: envelope.msg_id(),
            entity_id: envelope.header.entity_id.clone(),
            topic: envelope.topic().to_string(),
            partition: None,
            offset: None,
        }
    }

    pub fn at(mut self, partition: Option<i32>, offset: Option<i64>) -> Self {
        self.partition = partition;
        self.offset = offset;
        self
    }
}

/// Submits envelopes to the broker
///
/// Implementations must tolerate concurrent `send` calls from many
/// in-flight requests. Errors are returned as-is; no retry happens here.
#[async_trait]
pub trait PublisherGateway: Send + Sync {
    async fn send(&self, envelope: &EventEnvelope) -> Result<Ack, PublishError>;

    /// Whether `init` has succeeded and `destroy` has not been called since
    fn is_ready(&self) -> bool;
}

/// The configured broker gateway
#[derive(Clone)]
pub enum BrokerGateway {
    KafkaRest(Arc<KafkaRestGateway>),
    Memory(Arc<InMemoryGateway>),
}

impl BrokerGateway {
    /// Pick and build a gateway from the connection string
    ///
    /// Nothing is contacted here; the returned gateway still needs `init`.
    pub fn connect(settings: &RequiredSettings, timeout_ms: u64) -> Result<Self, ConfigError> {
        if settings.kafka_conn_string.starts_with(MEMORY_SCHEME) {
            tracing::warn!(
                topic = %settings.position_cmds_topic,
                "Using in-memory broker gateway; events are not delivered anywhere"
            );
            return Ok(BrokerGateway::Memory(Arc::new(InMemoryGateway::new(
                &settings.position_cmds_topic,
            ))));
        }

        let gateway = KafkaRestGateway::new(
            &settings.kafka_conn_string,
            &settings.position_cmds_topic,
            timeout_ms,
        )?;
        Ok(BrokerGateway::KafkaRest(Arc::new(gateway)))
    }

    pub fn publisher(&self) -> Arc<dyn PublisherGateway> {
        match self {
            BrokerGateway::KafkaRest(g) => g.clone(),
            BrokerGateway::Memory(g) => g.clone(),
        }
    }

    pub fn initializable(&self) -> Arc<dyn Initializable> {
        match self {
            BrokerGateway::KafkaRest(g) => g.clone(),
            BrokerGateway::Memory(g) => g.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BrokerGateway::KafkaRest(_) => "kafka-rest",
            BrokerGateway::Memory(_) => "memory",
        }
    }
}
