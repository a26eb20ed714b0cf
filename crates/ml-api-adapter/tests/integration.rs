//! Integration tests for ml-api-adapter
//!
//! Requests go through the full router (middleware included) with the
//! in-memory gateway, or a wiremock Kafka REST proxy for the HTTP gateway.

use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use ml_api_adapter::engine::{FixedClock, SequentialIdGenerator};
use ml_api_adapter::{
    AdapterService, BrokerGateway, EventTransformer, InMemoryGateway, Outcome, PublishError,
    ServiceConfig,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TRANSFER_ID: &str = "b51ec534-ee48-4575-b6a9-ead2955b8069";
const CONDITION: &str = "GRzLaTP7DJ9t4P-a_BA0WA9wzzlsugf00-Tn6kESAfM";
const TOPIC: &str = "topic-transfer-prepare";

fn config(conn: &str) -> ServiceConfig {
    ServiceConfig::builder()
        .instance_id("instance-1")
        .instance_name("ml-api-adapter")
        .kafka_conn_string(conn)
        .position_cmds_topic(TOPIC)
        .build()
}

async fn started(config: ServiceConfig) -> AdapterService {
    let service = assert_ok!(AdapterService::from_config(config));
    assert_ok!(service.init().await);
    service
}

fn memory_gateway(service: &AdapterService) -> Arc<InMemoryGateway> {
    match service.gateway() {
        BrokerGateway::Memory(gateway) => Arc::clone(gateway),
        BrokerGateway::KafkaRest(_) => panic!("expected in-memory gateway"),
    }
}

fn prepare_body() -> Value {
    json!({
        "transferId": TRANSFER_ID,
        "payerFsp": "payerA",
        "payeeFsp": "payerB",
        "amount": { "currency": "USD", "amount": "100.00" },
        "ilpPacket": "AYIBYQ",
        "condition": CONDITION,
        "expiration": "2024-01-01T00:05:00.000Z"
    })
}

fn prepare_request(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/vnd.interoperability.transfers+json")
        .header("date", "Mon, 1 Jan 2024 00:00:00 GMT")
        .header("fspiop-source", "payerA")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_prepare_transfer_is_published() {
    let service = started(config("memory://")).await;
    let gateway = memory_gateway(&service);

    let response = service
        .router()
        .oneshot(prepare_request("/transfers", &prepare_body()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let correlation_id = response.headers()["x-correlation-id"].to_str().unwrap().to_string();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["id"], TRANSFER_ID);
    assert_eq!(body["service"], "ml-api-adapter");
    assert_eq!(body["correlation_id"], correlation_id.as_str());

    let sent = gateway.sent().await;
    assert_eq!(sent.len(), 1);
    let envelope = &sent[0];
    assert_eq!(envelope.header.entity_id.to_string(), TRANSFER_ID);
    assert_eq!(envelope.header.msg_key, "payerA");
    assert_eq!(envelope.header.entity_version, 0);
    assert_eq!(envelope.header.msg_topic, TOPIC);
    assert_eq!(envelope.header.correlation_id, "nothing yet");
    assert_eq!(envelope.payload.content.payload, prepare_body());

    let metrics = service.metrics();
    assert_eq!(metrics.prepare_sample_count(), 1);
    assert_eq!(metrics.outcome_count(Outcome::Accepted), 1);
}

#[tokio::test]
async fn test_submitted_transfer_id_and_utf8_source_are_forwarded() {
    let service = started(config("memory://")).await;
    let gateway = memory_gateway(&service);
    let transfer_id = TRANSFER_ID.to_uppercase();
    let mut body = prepare_body();
    body["transferId"] = json!(transfer_id);

    let request = Request::builder()
        .method("POST")
        .uri("/transfers")
        .header("content-type", "application/vnd.interoperability.transfers+json")
        .header("date", "Mon, 1 Jan 2024 00:00:00 GMT")
        .header(
            "fspiop-source",
            HeaderValue::from_bytes("zahlstelle-müller".as_bytes()).unwrap(),
        )
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, response) = send(service.router(), request).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(response["id"], transfer_id.as_str());

    let sent = gateway.sent().await;
    assert_eq!(sent[0].header.entity_id, transfer_id);
    assert_eq!(sent[0].payload.id, transfer_id);
    assert_eq!(
        sent[0].payload.content.headers.get("fspiop-source").map(String::as_str),
        Some("zahlstelle-müller")
    );
}

#[tokio::test]
async fn test_urn_transfer_id_is_rejected() {
    let service = started(config("memory://")).await;
    let mut body = prepare_body();
    body["transferId"] = json!(format!("urn:uuid:{}", TRANSFER_ID));

    let (status, body) = send(service.router(), prepare_request("/transfers", &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["violations"][0]["path"], "body.transferId");
    assert_eq!(memory_gateway(&service).sent_count().await, 0);
}

#[tokio::test]
async fn test_missing_content_type_is_rejected() {
    let service = started(config("memory://")).await;
    let gateway = memory_gateway(&service);

    let request = Request::builder()
        .method("POST")
        .uri("/transfers")
        .header("date", "Mon, 1 Jan 2024 00:00:00 GMT")
        .header("fspiop-source", "payerA")
        .body(Body::from(prepare_body().to_string()))
        .unwrap();

    let (status, body) = send(service.router(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    assert_eq!(body["error"]["details"]["violations"][0]["path"], "headers.content-type");
    assert_eq!(gateway.sent_count().await, 0);
    assert_eq!(service.metrics().prepare_sample_count(), 0);
}

#[tokio::test]
async fn test_short_condition_is_rejected() {
    let service = started(config("memory://")).await;
    let mut body = prepare_body();
    body["condition"] = json!(&CONDITION[..40]);

    let (status, body) = send(service.router(), prepare_request("/transfers", &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["violations"][0]["path"], "body.condition");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("body.condition"));
}

#[tokio::test]
async fn test_amount_with_four_decimals_is_rejected() {
    let service = started(config("memory://")).await;
    let mut body = prepare_body();
    body["amount"]["amount"] = json!("12.3456");

    let (status, body) = send(service.router(), prepare_request("/transfers", &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["violations"][0]["path"], "body.amount.amount");
}

#[tokio::test]
async fn test_publish_failure_is_bad_gateway_and_not_timed() {
    let service = started(config("memory://")).await;
    memory_gateway(&service)
        .fail_sends_with(PublishError::Unavailable("broker connection refused".to_string()))
        .await;

    let (status, body) =
        send(service.router(), prepare_request("/transfers", &prepare_body())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["message"], "event delivery failed");
    assert!(!body.to_string().contains("connection refused"));

    let metrics = service.metrics();
    assert_eq!(metrics.prepare_sample_count(), 0);
    assert_eq!(metrics.outcome_count(Outcome::Failed), 1);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let service = started(config("memory://")).await;
    let request = Request::builder()
        .method("POST")
        .uri("/transfers")
        .header("content-type", "application/vnd.interoperability.transfers+json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(service.router(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MALFORMED_BODY");
}

#[tokio::test]
async fn test_oversized_body_is_refused() {
    let mut config = config("memory://");
    config.max_body_bytes = 256;
    let service = started(config).await;

    let mut body = prepare_body();
    body["ilpPacket"] = json!("A".repeat(1024));

    let response = service
        .router()
        .oneshot(prepare_request("/transfers", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(memory_gateway(&service).sent_count().await, 0);
}

#[tokio::test]
async fn test_routes_under_base_path() {
    let mut config = config("memory://");
    config.app_base_path = "/v1/".to_string();
    let service = started(config).await;

    let (status, _) = send(
        service.router(),
        prepare_request("/v1/transfers", &prepare_body()),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = send(service.router(), prepare_request("/transfers", &prepare_body())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_and_put_stubs_echo_correlation_id() {
    let service = started(config("memory://")).await;

    for verb in ["GET", "PUT"] {
        let request = Request::builder()
            .method(verb)
            .uri(format!("/transfers/{}", TRANSFER_ID))
            .header("x-correlation-id", "corr-42")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(service.router(), request).await;
        assert_eq!(status, StatusCode::OK, "{verb}");
        assert_eq!(body["correlation_id"], "corr-42");
        assert_eq!(body["id"], TRANSFER_ID);
    }
    assert_eq!(memory_gateway(&service).sent_count().await, 0);
}

#[tokio::test]
async fn test_health_reflects_gateway_readiness() {
    let service = AdapterService::from_config(config("memory://")).unwrap();

    let request = || Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = send(service.router(), request()).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["broker_ready"], false);

    service.init().await.unwrap();
    let (status, body) = send(service.router(), request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_prepare_before_init_fails() {
    let service = AdapterService::from_config(config("memory://")).unwrap();

    let (status, _) = send(service.router(), prepare_request("/transfers", &prepare_body())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let service = started(config("memory://")).await;
    send(service.router(), prepare_request("/transfers", &prepare_body())).await;

    let response = service
        .router()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("transfer_prepare_ms_count 1"));
    assert!(text.contains("transfer_prepare_requests_total{outcome=\"accepted\"} 1"));
}

#[tokio::test]
async fn test_fixed_collaborators_make_envelopes_reproducible() {
    let instant = DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap();
    let mut bytes = Vec::new();

    for _ in 0..2 {
        let transformer = EventTransformer::new(
            Arc::new(SequentialIdGenerator::new()),
            Arc::new(FixedClock(instant)),
        );
        let service = AdapterService::with_transformer(config("memory://"), transformer).unwrap();
        service.init().await.unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/transfers")
            .header("content-type", "application/vnd.interoperability.transfers+json")
            .header("date", "Mon, 1 Jan 2024 00:00:00 GMT")
            .header("fspiop-source", "payerA")
            .body(Body::from(prepare_body().to_string()))
            .unwrap();
        send(service.router(), request).await;

        let sent = memory_gateway(&service).sent().await;
        bytes.push(sent[0].to_json_bytes().unwrap());
    }

    assert_eq!(bytes[0], bytes[1]);
}

#[tokio::test]
async fn test_kafka_rest_gateway_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/topics/{}", TOPIC)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": TOPIC })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/topics/{}", TOPIC)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "offsets": [{ "partition": 1, "offset": 7 }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = started(config(&server.uri())).await;
    assert_eq!(service.gateway().kind(), "kafka-rest");

    let (status, body) =
        send(service.router(), prepare_request("/transfers", &prepare_body())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["id"], TRANSFER_ID);

    let requests = server.received_requests().await.unwrap();
    let produce = requests
        .iter()
        .find(|r| r.method.to_string() == "POST")
        .unwrap();
    let produced: Value = serde_json::from_slice(&produce.body).unwrap();
    assert_eq!(produced["records"][0]["key"], "payerA");
    assert_eq!(
        produced["records"][0]["value"]["header"]["entity_id"],
        TRANSFER_ID
    );
}

#[tokio::test]
async fn test_kafka_rest_init_failure_stops_startup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error_code": 40401, "message": "Topic not found."
        })))
        .mount(&server)
        .await;

    let service = AdapterService::from_config(config(&server.uri())).unwrap();
    let err = assert_err!(service.init().await);

    assert_eq!(err.dependency, "kafka-rest");
    assert!(!service.gateway().publisher().is_ready());
}
