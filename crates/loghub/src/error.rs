// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Failure reported by a [`LogSink`](crate::sink::LogSink) for one record.
///
/// The publisher logs these and drops the record; they never reach the code
/// that issued the log call.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("record rejected by collector: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the non-blocking enqueue path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("stream queue is full")]
    Full,

    #[error("stream publisher is closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("source identifier cannot be empty")]
    InvalidSource,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry is closed")]
    Closed,

    #[error("no tokio runtime available to run stream workers")]
    NoRuntime,

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}
