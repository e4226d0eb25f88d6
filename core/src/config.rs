//! Client configuration
//!
//! Keys use camelCase so the same JSON document can be shared with other
//! services. Every field has a default, so partial documents are accepted.

use crate::circuit::Config as CircuitConfig;
use crate::errors::ConfigError;
use crate::metrics::MetricsConfig;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};

/// Configuration for [`ResilientClient`](crate::ResilientClient)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitConfig,
    pub metrics: MetricsConfig,
}

impl ClientConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.circuit_breaker.validate()?;
        self.metrics.validate()
    }
}
