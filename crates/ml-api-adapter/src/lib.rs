//! Transfer prepare command adapter
//!
//! Accepts interoperability `POST /transfers` requests, validates them
//! against a strict header and body schema, turns accepted commands into
//! `PrepareTransfer` event envelopes and publishes them to the position
//! commands topic, keyed by payer FSP.
//!
//! ## Architecture
//!
//! 1. **Contracts** (`contracts/`): the validated command and the event
//!    envelope, the data shapes shared with downstream consumers.
//!
//! 2. **Engine** (`engine/`): the schema validator (composable field rules)
//!    and the event transformer (injected id source and clock).
//!
//! 3. **Gateway** (`gateway/`): the publisher gateway seam with a Kafka REST
//!    proxy implementation and an in-memory one.
//!
//! 4. **Handler** (`handler/`): the command handler state machine, axum
//!    routes and middleware.
//!
//! 5. **Init** (`init`): concurrent startup and explicit teardown of
//!    stateful dependencies.
//!
//! 6. **Telemetry** (`telemetry/`): the `transfer_prepare_ms` histogram and
//!    outcome counters.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ml_api_adapter::{AdapterService, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServiceConfig::load(None)?;
//!     let service = AdapterService::from_config(config)?;
//!     service.init().await?;
//!
//!     let listener = tokio::net::TcpListener::bind(service.config().bind_address()).await?;
//!     axum::serve(listener, service.router()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod init;
pub mod service;
pub mod telemetry;

// Contracts module - located at ../contracts relative to src/
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use config::{RequiredSettings, ServiceConfig, ServiceConfigBuilder};
pub use contracts::{CommandHeaders, EventEnvelope, TransferPrepareCommand};
pub use engine::{EventTransformer, SchemaValidator};
pub use error::{
    ConfigError, HandlerError, InitError, PublishError, ValidationError, Violation, ViolationCode,
};
pub use gateway::{Ack, BrokerGateway, InMemoryGateway, KafkaRestGateway, PublisherGateway};
pub use handler::{create_router, AppState, CommandHandler};
pub use init::{InitCoordinator, Initializable};
pub use service::{AdapterService, ServiceError};
pub use telemetry::{AdapterMetrics, Outcome};

/// Adapter version (from Cargo.toml)
pub const ADAPTER_VERSION: &str = env!("CARGO_PKG_VERSION");
