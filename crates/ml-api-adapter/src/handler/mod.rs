//! HTTP handling for the adapter
//!
//! - `command`: the prepare pipeline (validate, transform, publish, time)
//! - `routes`: axum routes, shared state and error mapping
//! - `middleware`: correlation ids and request logging

pub mod command;
pub mod middleware;
pub mod routes;

pub use command::CommandHandler;
pub use middleware::{
    correlation_id_middleware, request_logging_middleware, CorrelationId, CORRELATION_ID_HEADER,
};
pub use routes::{create_router, ApiError, AppState, DELIVERY_FAILED_MESSAGE};

use serde::{Deserialize, Serialize};

/// Acknowledgment body for accepted transfer requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub correlation_id: String,
    pub service: String,
    /// Transfer id
    pub id: String,
}

/// Error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` when the broker gateway is ready, `degraded` otherwise
    pub status: String,
    pub service: String,
    pub version: String,
    pub broker_ready: bool,
    pub uptime_seconds: u64,
    pub timestamp: String,
}
