// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ConfigError;
use std::env;

pub const DEFAULT_SOURCE: &str = "unknown";

/// Construction-time settings shared by every stream of a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Source identifier stamped on every record (usually a host or instance name)
    pub source: String,
    /// Per-stream queue capacity. 0 hands each batch directly to the worker.
    pub cached: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            cached: 0,
        }
    }
}

impl PublisherConfig {
    pub fn new(source: impl Into<String>, cached: usize) -> Self {
        Self {
            source: source.into(),
            cached,
        }
    }

    /// Create configuration from `LOGHUB_SOURCE` and `LOGHUB_CACHED`
    pub fn from_env() -> Result<Self, ConfigError> {
        let source = env::var("LOGHUB_SOURCE").unwrap_or_else(|_| DEFAULT_SOURCE.to_string());
        let cached = env::var("LOGHUB_CACHED")
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let config = Self { source, cached };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.trim().is_empty() {
            return Err(ConfigError::InvalidSource);
        }
        Ok(())
    }
}
