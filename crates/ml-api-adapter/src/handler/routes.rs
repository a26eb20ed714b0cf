//! Route definitions
//!
//! - `POST {base}/transfers`: transfer prepare command
//! - `GET  {base}/transfers/:id`: acknowledgment stub
//! - `PUT  {base}/transfers/:id`: acknowledgment stub
//! - `GET  /health`: liveness and broker readiness
//! - `GET  /metrics`: prometheus exposition

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use super::middleware::{correlation_id_middleware, request_logging_middleware, CorrelationId};
use super::{AckResponse, CommandHandler, ErrorInfo, ErrorResponse, HealthResponse};
use crate::contracts::CommandHeaders;
use crate::error::{HandlerError, PublishError, ValidationError};
use crate::gateway::PublisherGateway;
use crate::telemetry::AdapterMetrics;

/// Message returned for any publish failure; broker detail stays in the logs
pub const DELIVERY_FAILED_MESSAGE: &str = "event delivery failed";

/// State shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<CommandHandler>,
    pub publisher: Arc<dyn PublisherGateway>,
    pub metrics: Arc<AdapterMetrics>,
    pub service_name: String,
    pub version: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        handler: Arc<CommandHandler>,
        publisher: Arc<dyn PublisherGateway>,
        metrics: Arc<AdapterMetrics>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            handler,
            publisher,
            metrics,
            service_name: service_name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }

    fn ack(&self, correlation: CorrelationId, id: String) -> AckResponse {
        AckResponse {
            correlation_id: correlation.0,
            service: self.service_name.clone(),
            id,
        }
    }
}

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Body is not JSON
    MalformedBody(String),
    Validation(ValidationError),
    Publish(PublishError),
    Internal(String),
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::MalformedBody(_) => "MALFORMED_BODY",
            ApiError::Validation(_) => "VALIDATION_FAILED",
            ApiError::Publish(_) => "EVENT_DELIVERY_FAILED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MalformedBody(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Publish(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<HandlerError> for ApiError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Validation(e) => ApiError::Validation(e),
            HandlerError::Publish(e) => ApiError::Publish(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = match &self {
            ApiError::MalformedBody(msg) => {
                ErrorInfo::new(self.error_code(), format!("malformed JSON body: {}", msg))
            }
            ApiError::Validation(e) => ErrorInfo::new(self.error_code(), e.to_string())
                .with_details(serde_json::json!({ "violations": e.violations() })),
            ApiError::Publish(_) => ErrorInfo::new(self.error_code(), DELIVERY_FAILED_MESSAGE),
            ApiError::Internal(msg) => ErrorInfo::new(self.error_code(), msg),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

/// Create the router with all routes
///
/// `base_path` is either empty or starts with `/` and has no trailing slash.
pub fn create_router(state: AppState, base_path: &str, max_body_bytes: usize) -> Router {
    let transfers = Router::new()
        .route("/transfers", post(prepare_transfer))
        .route("/transfers/:id", get(get_transfer).put(put_transfer));

    let api = if base_path.is_empty() {
        transfers
    } else {
        Router::new().nest(base_path, transfers)
    };

    Router::new()
        .merge(api)
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(middleware::from_fn(correlation_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST {base}/transfers - transfer prepare command
///
/// The body is read raw so that a non-JSON body is a 400 from this service
/// rather than a content-type rejection from the extractor.
pub async fn prepare_transfer(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<AckResponse>), ApiError> {
    let body: serde_json::Value =
        serde_json::from_slice(&body).map_err(|e| ApiError::MalformedBody(e.to_string()))?;
    let headers = CommandHeaders::from(&headers);

    let ack = state.handler.handle(&headers, &body).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(state.ack(correlation, ack.entity_id)),
    ))
}

/// GET {base}/transfers/:id
pub async fn get_transfer(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Json<AckResponse> {
    Json(state.ack(correlation, id))
}

/// PUT {base}/transfers/:id
pub async fn put_transfer(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Json<AckResponse> {
    Json(state.ack(correlation, id))
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let broker_ready = state.publisher.is_ready();
    let status = if broker_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if broker_ready { "ok" } else { "degraded" }.to_string(),
            service: state.service_name.clone(),
            version: state.version.clone(),
            broker_ready,
            uptime_seconds: state.start_time.elapsed().as_secs(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }),
    )
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let text = state
        .metrics
        .render()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        text,
    )
        .into_response())
}
