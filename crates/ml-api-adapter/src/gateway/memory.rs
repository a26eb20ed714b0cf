//! In-memory gateway
//!
//! Keeps every accepted envelope in a list. Failures can be injected for
//! `init` and `send` so handler and startup paths can be exercised without
//! a broker.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::Mutex;

use super::{Ack, PublisherGateway};
use crate::contracts::EventEnvelope;
use crate::error::{InitError, PublishError};
use crate::init::Initializable;

pub struct InMemoryGateway {
    topic: String,
    ready: AtomicBool,
    next_offset: AtomicI64,
    sent: Mutex<Vec<EventEnvelope>>,
    send_failure: Mutex<Option<PublishError>>,
    init_failure: Mutex<Option<String>>,
}

impl InMemoryGateway {
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            ready: AtomicBool::new(false),
            next_offset: AtomicI64::new(0),
            sent: Mutex::new(Vec::new()),
            send_failure: Mutex::new(None),
            init_failure: Mutex::new(None),
        }
    }

    /// A gateway that is already initialized
    pub fn ready(topic: &str) -> Self {
        let gateway = Self::new(topic);
        gateway.ready.store(true, Ordering::Release);
        gateway
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Fail every `send` with `error` until [`clear_send_failure`](Self::clear_send_failure)
    pub async fn fail_sends_with(&self, error: PublishError) {
        *self.send_failure.lock().await = Some(error);
    }

    pub async fn clear_send_failure(&self) {
        *self.send_failure.lock().await = None;
    }

    /// Make the next `init` fail with `reason`
    pub async fn fail_init_with(&self, reason: impl Into<String>) {
        *self.init_failure.lock().await = Some(reason.into());
    }

    /// Envelopes accepted so far, in send order
    pub async fn sent(&self) -> Vec<EventEnvelope> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl PublisherGateway for InMemoryGateway {
    async fn send(&self, envelope: &EventEnvelope) -> Result<Ack, PublishError> {
        if !self.is_ready() {
            return Err(PublishError::NotInitialized);
        }
        if let Some(error) = self.send_failure.lock().await.clone() {
            return Err(error);
        }

        let offset = self.next_offset.fetch_add(1, Ordering::Relaxed);
        self.sent.lock().await.push(envelope.clone());

        Ok(Ack::for_envelope(envelope).at(Some(0), Some(offset)))
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Initializable for InMemoryGateway {
    fn name(&self) -> &str {
        "memory"
    }

    async fn init(&self) -> Result<(), InitError> {
        if let Some(reason) = self.init_failure.lock().await.take() {
            return Err(InitError::new(self.name(), reason));
        }
        self.ready.store(true, Ordering::Release);
        tracing::debug!(topic = %self.topic, "In-memory gateway ready");
        Ok(())
    }

    async fn destroy(&self) -> Result<(), InitError> {
        self.ready.store(false, Ordering::Release);
        Ok(())
    }
}
