//! Telemetry for the adapter
//!
//! - `metrics`: prometheus registry with the prepare latency histogram and
//!   outcome counter, rendered at `GET /metrics`

pub mod metrics;

pub use metrics::{AdapterMetrics, Outcome, PrepareTimer};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Failed to encode metrics: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
