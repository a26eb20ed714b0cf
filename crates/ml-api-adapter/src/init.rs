//! Initialization coordinator
//!
//! Brings stateful dependencies up concurrently at startup. Every `init`
//! runs to completion; if any failed, the first failure in registration
//! order is returned and the service must not start. Dependencies that did
//! come up are left as they are; teardown is the separate, explicit
//! [`InitCoordinator::destroy_all`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use crate::error::InitError;

/// A dependency with a startup and a shutdown step
#[async_trait]
pub trait Initializable: Send + Sync {
    /// Name used in logs and [`InitError::dependency`]
    fn name(&self) -> &str;

    async fn init(&self) -> Result<(), InitError>;

    async fn destroy(&self) -> Result<(), InitError>;
}

#[derive(Default, Clone)]
pub struct InitCoordinator {
    dependencies: Vec<Arc<dyn Initializable>>,
}

impl InitCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, dependency: Arc<dyn Initializable>) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn register(&mut self, dependency: Arc<dyn Initializable>) {
        self.dependencies.push(dependency);
    }

    pub fn names(&self) -> Vec<&str> {
        self.dependencies.iter().map(|d| d.name()).collect()
    }

    /// Run every `init` concurrently and wait for all of them
    pub async fn init_all(&self) -> Result<(), InitError> {
        let start = Instant::now();
        let outcomes =
            futures::future::join_all(self.dependencies.iter().map(|d| d.init())).await;

        let mut first_error = None;
        for (dependency, outcome) in self.dependencies.iter().zip(outcomes) {
            match outcome {
                Ok(()) => tracing::info!(dependency = dependency.name(), "Dependency initialized"),
                Err(e) => {
                    tracing::error!(dependency = dependency.name(), error = %e, "Dependency failed to initialize");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        tracing::info!(
            dependencies = self.dependencies.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "All dependencies initialized"
        );
        Ok(())
    }

    /// Run every `destroy` concurrently; returns the first failure
    pub async fn destroy_all(&self) -> Result<(), InitError> {
        let outcomes =
            futures::future::join_all(self.dependencies.iter().map(|d| d.destroy())).await;

        let mut first_error = None;
        for (dependency, outcome) in self.dependencies.iter().zip(outcomes) {
            if let Err(e) = outcome {
                tracing::warn!(dependency = dependency.name(), error = %e, "Dependency teardown failed");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
