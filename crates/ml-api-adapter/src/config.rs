//! Service configuration
//!
//! Sources, lowest to highest precedence: built-in defaults, an optional
//! YAML or TOML file, environment variables, then command line flags
//! (applied by the binary).
//!
//! Broker connection string, topic, instance id and instance name have no
//! defaults. [`ServiceConfig::require`] checks them before anything is
//! constructed; components that need them only accept [`RequiredSettings`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

pub const DEFAULT_APP_NAME: &str = "ml-api-adapter";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_BODY_BYTES: usize = 5_242_880;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Deployment environment label (`development`, `production`, ...)
    pub env: String,
    pub app_name: String,
    pub app_version: String,
    /// Prefix for the transfer routes, e.g. `/v1`
    pub app_base_path: String,
    pub host: String,
    pub port: u16,
    pub instance_id: Option<String>,
    pub instance_name: Option<String>,
    /// Kafka REST proxy URL, or `memory://` for the in-memory gateway
    pub kafka_conn_string: Option<String>,
    pub position_cmds_topic: Option<String>,
    pub max_body_bytes: usize,
    /// Broker HTTP client timeout. The prepare pipeline itself has no deadline.
    pub request_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
            app_name: DEFAULT_APP_NAME.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            app_base_path: String::new(),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            instance_id: None,
            instance_name: None,
            kafka_conn_string: None,
            position_cmds_topic: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

/// Settings without which the service cannot be constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredSettings {
    pub kafka_conn_string: String,
    pub position_cmds_topic: String,
    pub instance_id: String,
    pub instance_name: String,
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::new()
    }

    /// Load a YAML (`.yaml`, `.yml`) or TOML (`.toml`) file over the defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e))),
            Some("toml") => toml::from_str(&content)
                .map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e))),
            _ => Err(ConfigError::File(format!(
                "{}: unsupported format, expected .yaml, .yml or .toml",
                path.display()
            ))),
        }
    }

    /// Defaults, then `file` if given, then the process environment
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()
    }

    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Override fields from `lookup`, which maps a variable name to its value
    pub fn apply_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("ML_ENV") {
            self.env = v;
        }
        if let Some(v) = lookup("INSTANCE_ID") {
            self.instance_id = Some(v);
        }
        if let Some(v) = lookup("INSTANCE_NAME") {
            self.instance_name = Some(v);
        }
        if let Some(v) = lookup("KAFKA_CONN_STRING") {
            self.kafka_conn_string = Some(v);
        }
        if let Some(v) = lookup("POSITION_CMDS_TOPIC") {
            self.position_cmds_topic = Some(v);
        }
        if let Some(v) = lookup("APP_BASE_PATH") {
            self.app_base_path = v;
        }
        if let Some(v) = lookup("PORT") {
            self.port = v.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                reason: format!("'{}' is not a valid port", v),
            })?;
        }
        Ok(self)
    }

    /// Check that every required setting is present and not blank
    pub fn require(&self) -> Result<RequiredSettings, ConfigError> {
        fn present(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(ConfigError::Missing(name)),
            }
        }

        Ok(RequiredSettings {
            kafka_conn_string: present(&self.kafka_conn_string, "kafka_conn_string")?,
            position_cmds_topic: present(&self.position_cmds_topic, "position_cmds_topic")?,
            instance_id: present(&self.instance_id, "instance_id")?,
            instance_name: present(&self.instance_name, "instance_name")?,
        })
    }

    /// Route prefix with a leading slash and no trailing slash; empty for root
    pub fn base_path(&self) -> String {
        let trimmed = self.app_base_path.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`ServiceConfig`]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ServiceConfig::default(),
        }
    }

    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.config.env = env.into();
        self
    }

    pub fn app_base_path(mut self, path: impl Into<String>) -> Self {
        self.config.app_base_path = path.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn instance_id(mut self, id: impl Into<String>) -> Self {
        self.config.instance_id = Some(id.into());
        self
    }

    pub fn instance_name(mut self, name: impl Into<String>) -> Self {
        self.config.instance_name = Some(name.into());
        self
    }

    pub fn kafka_conn_string(mut self, conn: impl Into<String>) -> Self {
        self.config.kafka_conn_string = Some(conn.into());
        self
    }

    pub fn position_cmds_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.position_cmds_topic = Some(topic.into());
        self
    }

    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.config.max_body_bytes = bytes;
        self
    }

    pub fn request_timeout_ms(mut self, timeout: u64) -> Self {
        self.config.request_timeout_ms = timeout;
        self
    }

    pub fn build(self) -> ServiceConfig {
        self.config
    }
}

impl Default for ServiceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
