//! Service assembly
//!
//! [`AdapterService::from_config`] is the one place where the pipeline is
//! wired: required settings are checked first, then the gateway, metrics
//! and command handler are built and handed to each other explicitly.
//! Nothing is contacted until [`AdapterService::init`].

use axum::Router;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{RequiredSettings, ServiceConfig};
use crate::engine::{EventTransformer, SchemaValidator};
use crate::error::{ConfigError, InitError};
use crate::gateway::BrokerGateway;
use crate::handler::{create_router, AppState, CommandHandler};
use crate::init::InitCoordinator;
use crate::telemetry::{AdapterMetrics, TelemetryError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Init(#[from] InitError),
}

pub struct AdapterService {
    config: ServiceConfig,
    settings: RequiredSettings,
    gateway: BrokerGateway,
    metrics: Arc<AdapterMetrics>,
    handler: Arc<CommandHandler>,
    coordinator: InitCoordinator,
}

impl AdapterService {
    /// Build the service with a random id source and the wall clock
    pub fn from_config(config: ServiceConfig) -> Result<Self, ServiceError> {
        Self::with_transformer(config, EventTransformer::default())
    }

    pub fn with_transformer(
        config: ServiceConfig,
        transformer: EventTransformer,
    ) -> Result<Self, ServiceError> {
        let settings = config.require()?;
        let gateway = BrokerGateway::connect(&settings, config.request_timeout_ms)?;
        let metrics = Arc::new(AdapterMetrics::new()?);

        let handler = Arc::new(CommandHandler::new(
            &settings,
            SchemaValidator::new(),
            transformer,
            gateway.publisher(),
            Arc::clone(&metrics),
        ));

        let coordinator = InitCoordinator::new().with(gateway.initializable());

        tracing::info!(
            gateway = gateway.kind(),
            topic = %settings.position_cmds_topic,
            instance_id = %settings.instance_id,
            "Service assembled"
        );

        Ok(Self {
            config,
            settings,
            gateway,
            metrics,
            handler,
            coordinator,
        })
    }

    /// Bring every dependency up; the service must not serve on error
    pub async fn init(&self) -> Result<(), InitError> {
        self.coordinator.init_all().await
    }

    /// Tear every dependency down
    pub async fn shutdown(&self) -> Result<(), InitError> {
        self.coordinator.destroy_all().await
    }

    pub fn router(&self) -> Router {
        let state = AppState::new(
            Arc::clone(&self.handler),
            self.gateway.publisher(),
            Arc::clone(&self.metrics),
            self.config.app_name.clone(),
        );
        create_router(state, &self.config.base_path(), self.config.max_body_bytes)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn settings(&self) -> &RequiredSettings {
        &self.settings
    }

    pub fn gateway(&self) -> &BrokerGateway {
        &self.gateway
    }

    pub fn metrics(&self) -> Arc<AdapterMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn handler(&self) -> Arc<CommandHandler> {
        Arc::clone(&self.handler)
    }
}
