//! Kafka REST proxy gateway
//!
//! Produces envelopes through the Confluent REST proxy v2 API:
//!
//! - `init`:  `GET  {base}/topics/{topic}` must answer 2xx
//! - `send`:  `POST {base}/topics/{topic}` with
//!   `{"records":[{"key": <payer fsp>, "value": <envelope>}]}`
//!
//! The proxy decides the partition from the record key, so every event for
//! one payer lands on the same partition.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{Ack, PublisherGateway};
use crate::contracts::EventEnvelope;
use crate::error::{ConfigError, InitError, PublishError};
use crate::init::Initializable;

/// Content type for JSON-embedded records
pub const KAFKA_JSON_CONTENT_TYPE: &str = "application/vnd.kafka.json.v2+json";

/// Content type the proxy answers with
pub const KAFKA_ACCEPT: &str = "application/vnd.kafka.v2+json";

#[derive(Serialize)]
struct ProduceRequest<'a> {
    records: [ProduceRecord<'a>; 1],
}

#[derive(Serialize)]
struct ProduceRecord<'a> {
    key: &'a str,
    value: &'a EventEnvelope,
}

#[derive(Debug, Deserialize)]
struct ProduceResponse {
    #[serde(default)]
    offsets: Vec<PartitionOffset>,
}

#[derive(Debug, Deserialize)]
struct PartitionOffset {
    partition: Option<i32>,
    offset: Option<i64>,
    error_code: Option<i64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProxyError {
    error_code: Option<i64>,
    message: Option<String>,
}

/// Add `http://` when the connection string has no scheme and drop
/// trailing slashes
pub fn normalize_base_url(conn_string: &str) -> String {
    let trimmed = conn_string.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

/// Gateway over a Kafka REST proxy
pub struct KafkaRestGateway {
    client: Client,
    base_url: String,
    topic: String,
    ready: AtomicBool,
}

impl KafkaRestGateway {
    pub fn new(conn_string: &str, topic: &str, timeout_ms: u64) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ConfigError::Invalid {
                name: "kafka_conn_string",
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: normalize_base_url(conn_string),
            topic: topic.to_string(),
            ready: AtomicBool::new(false),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn topic_url(&self, topic: &str) -> String {
        format!("{}/topics/{}", self.base_url, topic)
    }

    /// Turn an error response body into a readable reason
    async fn error_reason(response: reqwest::Response) -> String {
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ProxyError>(&text) {
            Ok(ProxyError {
                error_code: Some(code),
                message: Some(message),
            }) => format!("{} ({})", message, code),
            Ok(ProxyError {
                message: Some(message),
                ..
            }) => message,
            _ => text,
        }
    }
}

#[async_trait]
impl PublisherGateway for KafkaRestGateway {
    async fn send(&self, envelope: &EventEnvelope) -> Result<Ack, PublishError> {
        if !self.is_ready() {
            return Err(PublishError::NotInitialized);
        }

        let body = serde_json::to_vec(&ProduceRequest {
            records: [ProduceRecord {
                key: envelope.key(),
                value: envelope,
            }],
        })?;

        let response = self
            .client
            .post(self.topic_url(envelope.topic()))
            .header(CONTENT_TYPE, KAFKA_JSON_CONTENT_TYPE)
            .header(ACCEPT, KAFKA_ACCEPT)
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let reason = Self::error_reason(response).await;
            tracing::warn!(
                status = status.as_u16(),
                topic = %envelope.topic(),
                msg_id = %envelope.msg_id(),
                error = %reason,
                "Kafka REST proxy rejected produce request"
            );
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                reason,
            });
        }

        let produced: ProduceResponse = response.json().await.map_err(|e| PublishError::Rejected {
            status: status.as_u16(),
            reason: format!("unreadable produce response: {}", e),
        })?;

        let first = produced
            .offsets
            .into_iter()
            .next()
            .ok_or_else(|| PublishError::Rejected {
                status: status.as_u16(),
                reason: "produce response carried no offsets".to_string(),
            })?;

        if let Some(code) = first.error_code {
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                reason: first.error.unwrap_or_else(|| format!("error code {}", code)),
            });
        }

        tracing::debug!(
            topic = %envelope.topic(),
            partition = ?first.partition,
            offset = ?first.offset,
            msg_id = %envelope.msg_id(),
            "Envelope accepted by broker"
        );

        Ok(Ack::for_envelope(envelope).at(first.partition, first.offset))
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Initializable for KafkaRestGateway {
    fn name(&self) -> &str {
        "kafka-rest"
    }

    async fn init(&self) -> Result<(), InitError> {
        let url = self.topic_url(&self.topic);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, KAFKA_ACCEPT)
            .send()
            .await
            .map_err(|e| InitError::new(self.name(), format!("{} unreachable: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let reason = Self::error_reason(response).await;
            return Err(InitError::new(
                self.name(),
                format!("topic {} not available (status {}): {}", self.topic, status.as_u16(), reason),
            ));
        }

        self.ready.store(true, Ordering::Release);
        tracing::info!(base_url = %self.base_url, topic = %self.topic, "Kafka REST gateway ready");
        Ok(())
    }

    async fn destroy(&self) -> Result<(), InitError> {
        self.ready.store(false, Ordering::Release);
        tracing::info!(topic = %self.topic, "Kafka REST gateway closed");
        Ok(())
    }
}
