//! Wire contracts for the transfer prepare adapter
//!
//! These types are the data shapes exchanged with the outside world:
//!
//! - `command`: the validated, normalized form of an inbound
//!   `POST /transfers` request (headers + body)
//! - `envelope`: the `PrepareTransfer` event published to the position
//!   commands topic and consumed by downstream settlement services
//!
//! Both are request-scoped values: built once, never mutated, dropped after
//! the publish call returns.

pub mod command;
pub mod envelope;

pub use command::{CommandHeaders, Extension, Money, PrepareHeaders, TransferPrepareCommand};
pub use envelope::{
    EnvelopeHeader, EventAction, EventEnvelope, EventMetadata, EventState, EventStatus,
    MessageContent, MessageMetadata, MessageProtocol, CORRELATION_ID_PLACEHOLDER, PAYLOAD_CONTENT_TYPE,
    PREPARE_SCHEMA_NAME, PREPARE_SCHEMA_VERSION,
};
