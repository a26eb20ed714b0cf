//! Command handler
//!
//! Runs one prepare request through the pipeline:
//!
//! ```text
//! start timer -> validate -> transform -> send -> stop timer
//!                   |                       |
//!                Rejected                 Failed
//! ```
//!
//! Only the success path stops the timer; `Rejected` and `Failed` return
//! early and the timer is dropped without recording. Every terminal state
//! is counted in `transfer_prepare_requests_total`.

use serde_json::Value;
use std::sync::Arc;

use crate::config::RequiredSettings;
use crate::contracts::CommandHeaders;
use crate::engine::{EventTransformer, SchemaValidator};
use crate::error::{HandlerError, Result};
use crate::gateway::{Ack, PublisherGateway};
use crate::telemetry::{AdapterMetrics, Outcome};

pub struct CommandHandler {
    validator: SchemaValidator,
    transformer: EventTransformer,
    publisher: Arc<dyn PublisherGateway>,
    metrics: Arc<AdapterMetrics>,
    topic: String,
    instance_id: String,
    source_system_name: String,
}

impl CommandHandler {
    pub fn new(
        settings: &RequiredSettings,
        validator: SchemaValidator,
        transformer: EventTransformer,
        publisher: Arc<dyn PublisherGateway>,
        metrics: Arc<AdapterMetrics>,
    ) -> Self {
        Self {
            validator,
            transformer,
            publisher,
            metrics,
            topic: settings.position_cmds_topic.clone(),
            instance_id: settings.instance_id.clone(),
            source_system_name: settings.instance_name.clone(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Validate, transform and publish one prepare command
    ///
    /// Validation and publish errors are returned unmodified.
    pub async fn handle(&self, headers: &CommandHeaders, body: &Value) -> Result<Ack> {
        let timer = self.metrics.start_timer();

        let command = match self.validator.validate(headers, body) {
            Ok(command) => command,
            Err(e) => {
                self.metrics.record_outcome(Outcome::Rejected);
                tracing::warn!(
                    violations = e.violations().len(),
                    error = %e,
                    "Transfer prepare rejected"
                );
                return Err(HandlerError::Validation(e));
            }
        };

        let envelope = self.transformer.transform(
            &command,
            &self.topic,
            &self.instance_id,
            &self.source_system_name,
        );

        match self.publisher.send(&envelope).await {
            Ok(ack) => {
                let duration_ms = timer.stop();
                self.metrics.record_outcome(Outcome::Accepted);
                tracing::info!(
                    transfer_id = %command.transfer_id,
                    msg_id = %ack.msg_id,
                    topic = %ack.topic,
                    duration_ms = duration_ms,
                    "Transfer prepare published"
                );
                Ok(ack)
            }
            Err(e) => {
                self.metrics.record_outcome(Outcome::Failed);
                tracing::error!(
                    transfer_id = %command.transfer_id,
                    msg_id = %envelope.msg_id(),
                    topic = %self.topic,
                    error = %e,
                    "Transfer prepare could not be published"
                );
                Err(HandlerError::Publish(e))
            }
        }
    }
}
