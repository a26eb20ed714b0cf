//! Error types for the transfer prepare adapter
//!
//! Each pipeline stage owns one error type so callers can tell a rejected
//! command from an undelivered event without inspecting strings:
//!
//! - [`ConfigError`]: required setting missing at construction time (fatal)
//! - [`ValidationError`]: the command failed the interoperability schema
//! - [`PublishError`]: the broker gateway could not accept the envelope
//! - [`InitError`]: a dependency failed to come up at startup (fatal)
//! - [`HandlerError`]: what the command handler hands back to the HTTP layer

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Construction-time configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is absent or blank
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),

    /// A setting is present but unusable
    #[error("invalid configuration value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    /// The configuration file could not be read or parsed
    #[error("configuration file error: {0}")]
    File(String),
}

/// Machine-readable violation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    Required,
    Type,
    Length,
    Pattern,
    Format,
    Currency,
    Range,
    UnknownField,
}

impl ViolationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCode::Required => "required",
            ViolationCode::Type => "type",
            ViolationCode::Length => "length",
            ViolationCode::Pattern => "pattern",
            ViolationCode::Format => "format",
            ViolationCode::Currency => "currency",
            ViolationCode::Range => "range",
            ViolationCode::UnknownField => "unknown_field",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single schema violation: where it happened and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Dotted path of the offending field, e.g. `body.amount.currency`
    pub path: String,
    /// Violation category
    pub code: ViolationCode,
    /// Human-readable reason
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Command rejected by the schema validator
///
/// Holds every violation in schema declaration order; the first one is the
/// reported description.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{}", describe_violations(.violations))]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    /// Build from a non-empty violation list
    pub fn new(violations: Vec<Violation>) -> Self {
        debug_assert!(!violations.is_empty());
        Self { violations }
    }

    /// Single-violation shortcut
    pub fn single(path: impl Into<String>, code: ViolationCode, message: impl Into<String>) -> Self {
        Self::new(vec![Violation::new(path, code, message)])
    }

    /// The violation reported to the caller
    pub fn first(&self) -> Option<&Violation> {
        self.violations.first()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Whether any violation points at `path` or one of its children
    pub fn mentions(&self, path: &str) -> bool {
        self.violations.iter().any(|v| {
            v.path == path
                || v
                    .path
                    .strip_prefix(path)
                    .map_or(false, |rest| rest.starts_with('.') || rest.starts_with('['))
        })
    }
}

fn describe_violations(violations: &[Violation]) -> String {
    match violations.first() {
        Some(v) => format!("validation failed: {}", v),
        None => "validation failed".to_string(),
    }
}

/// Broker gateway failure for a single envelope
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// `send` called before a successful `init`
    #[error("publisher gateway is not initialized")]
    NotInitialized,

    /// Broker unreachable or transport failure
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// Broker answered but refused the message
    #[error("broker rejected message (status {status}): {reason}")]
    Rejected { status: u16, reason: String },

    /// Envelope could not be encoded for the wire
    #[error("failed to encode envelope: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Encoding(err.to_string())
    }
}

/// Startup failure of a named dependency
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to initialize {dependency}: {reason}")]
pub struct InitError {
    pub dependency: String,
    pub reason: String,
}

impl InitError {
    pub fn new(dependency: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            reason: reason.into(),
        }
    }
}

/// Outcome of a failed command handling
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl HandlerError {
    /// Whether the caller can fix this by changing the request
    pub fn is_client_error(&self) -> bool {
        matches!(self, HandlerError::Validation(_))
    }
}

/// Result type alias for handler operations
pub type Result<T> = std::result::Result<T, HandlerError>;
