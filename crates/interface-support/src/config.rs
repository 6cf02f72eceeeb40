//! Endpoint configuration with validation.

use serde::{Deserialize, Serialize};

/// What a binding does with a control request it does not recognize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownControlPolicy {
    /// Not consumed; the message falls through to normal dispatch.
    #[default]
    Ignore,
    /// Treated as a protocol error, tearing the binding down.
    Reject,
}

/// Configuration shared by proxies and targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Label attached to every log event of the endpoint
    pub name: String,
    /// Handling of unrecognized control requests
    pub unknown_control_messages: UnknownControlPolicy,
    /// Cap on in-flight proxy requests (None = unbounded)
    pub max_pending_responses: Option<usize>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            name: "interface".to_string(),
            unknown_control_messages: UnknownControlPolicy::Ignore,
            max_pending_responses: None,
        }
    }
}

impl EndpointConfig {
    /// Default configuration under a different name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name cannot be empty".into()));
        }

        if self.max_pending_responses == Some(0) {
            return Err(ConfigError::InvalidLimit(
                "max_pending_responses cannot be 0".into(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
