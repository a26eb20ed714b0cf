//! Event transformer
//!
//! Maps a validated [`TransferPrepareCommand`] into a `PrepareTransfer`
//! [`EventEnvelope`]. Identifier generation and the clock are injected so a
//! transformer built with [`SequentialIdGenerator`] and [`FixedClock`]
//! produces byte-identical envelopes for identical input.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::contracts::{
    EnvelopeHeader, EventAction, EventEnvelope, EventMetadata, EventState, MessageContent,
    MessageMetadata, MessageProtocol, TransferPrepareCommand, CORRELATION_ID_PLACEHOLDER,
    PAYLOAD_CONTENT_TYPE, PREPARE_SCHEMA_NAME, PREPARE_SCHEMA_VERSION,
};

/// Source of fresh identifiers
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Uuid;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Random v4 identifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Counter-based identifiers: 1, 2, 3, ... as 128-bit values
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> Uuid {
        Uuid::from_u128(self.next.fetch_add(1, Ordering::Relaxed) as u128)
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Builds prepare event envelopes
#[derive(Clone)]
pub struct EventTransformer {
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl Default for EventTransformer {
    fn default() -> Self {
        Self::new(Arc::new(RandomIdGenerator), Arc::new(SystemClock))
    }
}

impl EventTransformer {
    pub fn new(ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self { ids, clock }
    }

    /// Build the envelope for `command`
    ///
    /// The entity id is the transfer id, the routing key is the payer FSP
    /// and the entity version is always 0. The clock is read once, so
    /// `msg_timestamp` and `createdAt` describe the same instant.
    pub fn transform(
        &self,
        command: &TransferPrepareCommand,
        topic: &str,
        source_instance_id: &str,
        source_system_name: &str,
    ) -> EventEnvelope {
        let now = self.clock.now();
        let event_id = self.ids.next_id();
        let msg_id = self.ids.next_id();

        let header = EnvelopeHeader {
            msg_id,
            msg_schema_name: PREPARE_SCHEMA_NAME.to_string(),
            msg_schema_version: PREPARE_SCHEMA_VERSION,
            msg_topic: topic.to_string(),
            msg_key: command.payer_fsp.clone(),
            correlation_id: CORRELATION_ID_PLACEHOLDER.to_string(),
            entity_id: command.transfer_id.clone(),
            entity_version: 0,
            msg_timestamp: now.timestamp_millis(),
            source_system_instance_id: source_instance_id.to_string(),
            source_system_name: source_system_name.to_string(),
        };

        let payload = MessageProtocol {
            id: command.transfer_id.clone(),
            to: command.payee_fsp.clone(),
            from: command.payer_fsp.clone(),
            content_type: PAYLOAD_CONTENT_TYPE.to_string(),
            content: MessageContent {
                headers: command.original_headers.as_map().clone(),
                payload: command.original_body.clone(),
            },
            metadata: MessageMetadata {
                event: EventMetadata {
                    id: event_id,
                    event_type: EventAction::Prepare,
                    action: EventAction::Prepare,
                    created_at: now,
                    state: EventState::success(),
                },
            },
        };

        tracing::debug!(
            transfer_id = %command.transfer_id,
            msg_id = %msg_id,
            topic = %topic,
            "Built prepare envelope"
        );

        EventEnvelope { header, payload }
    }
}
