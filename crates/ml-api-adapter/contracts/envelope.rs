//! PrepareTransfer event envelope
//!
//! The envelope is what lands on the position commands topic. Its header
//! carries identity and routing metadata for the event store; its payload
//! carries the transfer message protocol with the original request
//! attached verbatim.
//!
//! ```json
//! {
//!   "header": {
//!     "msg_id": "…", "msg_schema_name": "PrepareTransfer", "msg_schema_version": 1,
//!     "msg_topic": "position-cmds", "msg_key": "payerA",
//!     "correlation_id": "nothing yet", "entity_id": "…", "entity_version": 0,
//!     "msg_timestamp": 1704067200000,
//!     "source_system_instance_id": "…", "source_system_name": "ml-api-adapter"
//!   },
//!   "payload": {
//!     "id": "…", "to": "payerB", "from": "payerA", "type": "application/json",
//!     "content": { "headers": { … }, "payload": { … } },
//!     "metadata": { "event": { "id": "…", "type": "prepare", "action": "prepare",
//!       "createdAt": "…", "state": { "status": "success", "code": 0 } } }
//!   }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Schema name stamped on every prepare envelope
pub const PREPARE_SCHEMA_NAME: &str = "PrepareTransfer";

/// Schema version stamped on every prepare envelope
pub const PREPARE_SCHEMA_VERSION: u32 = 1;

/// Correlation id used until one is threaded through from the request
pub const CORRELATION_ID_PLACEHOLDER: &str = "nothing yet";

/// Content type of the message protocol payload
pub const PAYLOAD_CONTENT_TYPE: &str = "application/json";

/// Event store message: header + payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub header: EnvelopeHeader,
    pub payload: MessageProtocol,
}

impl EventEnvelope {
    /// Destination topic
    pub fn topic(&self) -> &str {
        &self.header.msg_topic
    }

    /// Partition key (payer FSP)
    pub fn key(&self) -> &str {
        &self.header.msg_key
    }

    pub fn msg_id(&self) -> Uuid {
        self.header.msg_id
    }

    /// Serialized wire form
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Identity and routing metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    pub msg_id: Uuid,
    pub msg_schema_name: String,
    pub msg_schema_version: u32,
    pub msg_topic: String,
    pub msg_key: String,
    pub correlation_id: String,
    /// Transfer id exactly as submitted
    pub entity_id: String,
    pub entity_version: u64,
    /// Emission time, milliseconds since the Unix epoch
    pub msg_timestamp: i64,
    pub source_system_instance_id: String,
    pub source_system_name: String,
}

/// Transfer message protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageProtocol {
    /// Transfer id exactly as submitted
    pub id: String,
    /// Payee FSP
    pub to: String,
    /// Payer FSP
    pub from: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub content: MessageContent,
    pub metadata: MessageMetadata,
}

/// Original request, forwarded untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    pub headers: BTreeMap<String, String>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub event: EventMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventAction,
    pub action: EventAction,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub state: EventState,
}

/// Event kind; this adapter only ever emits `prepare`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    Prepare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Success,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventState {
    pub status: EventStatus,
    pub code: u32,
}

impl EventState {
    /// Initial state of a freshly accepted command
    pub fn success() -> Self {
        Self {
            status: EventStatus::Success,
            code: 0,
        }
    }
}
