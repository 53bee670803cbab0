// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Leveled logging surface bound to one stream.
//!
//! Every call renders its message up front, builds the `Level` and `Content`
//! fields and hands them to the stream publisher. Calls resolve once the batch
//! is queued; they never wait for the sink.
//!
//! The per-level methods join their parts with spaces. Positional formatting
//! goes through the `*_f!` macros, which render with `format!` before the
//! future is created.
//!
//! ```rust,ignore
//! let logger = registry.get_or_create("svc")?;
//! logger.info(&[&"boot", &"ok"]).await;      // Content: "boot ok"
//! loghub::error_f!(logger, "code={}", 42).await; // Content: "code=42"
//! ```

use std::fmt::{Display, Write};
use std::future::Future;
use std::sync::Arc;

use crate::error::PublishError;
use crate::level::Level;
use crate::observer::PublisherStats;
use crate::publisher::StreamPublisher;
use crate::record::leveled_fields;

/// Joins message parts with single spaces.
#[must_use]
pub fn join_parts(parts: &[&(dyn Display + Sync)]) -> String {
    let mut content = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            content.push(' ');
        }
        // Writing into a String cannot fail
        let _ = write!(content, "{part}");
    }
    content
}

/// Cheap to clone; every clone feeds the same stream queue.
#[derive(Debug, Clone)]
pub struct LoggerFacade {
    publisher: Arc<StreamPublisher>,
}

impl LoggerFacade {
    pub(crate) fn new(publisher: Arc<StreamPublisher>) -> Self {
        Self { publisher }
    }

    /// Stream (topic) this facade publishes to.
    #[must_use]
    pub fn name(&self) -> &str {
        self.publisher.name()
    }

    #[must_use]
    pub fn stats(&self) -> PublisherStats {
        self.publisher.stats()
    }

    /// True when both facades feed the same stream publisher.
    #[must_use]
    pub fn same_stream(&self, other: &LoggerFacade) -> bool {
        Arc::ptr_eq(&self.publisher, &other.publisher)
    }

    /// Queues one leveled message, waiting only for queue backpressure.
    pub async fn log(&self, level: Level, content: impl Into<String>) {
        self.publisher
            .enqueue(leveled_fields(level, content.into()))
            .await;
    }

    /// Queues one leveled message without waiting.
    pub fn try_log(&self, level: Level, content: impl Into<String>) -> Result<(), PublishError> {
        self.publisher
            .try_enqueue(leveled_fields(level, content.into()))
    }

    // Parts are rendered before returning so the future never borrows them.
    fn log_parts(
        &self,
        level: Level,
        parts: &[&(dyn Display + Sync)],
    ) -> impl Future<Output = ()> + Send + '_ {
        self.log(level, join_parts(parts))
    }

    pub fn trace(&self, parts: &[&(dyn Display + Sync)]) -> impl Future<Output = ()> + Send + '_ {
        self.log_parts(Level::Trace, parts)
    }

    pub fn debug(&self, parts: &[&(dyn Display + Sync)]) -> impl Future<Output = ()> + Send + '_ {
        self.log_parts(Level::Debug, parts)
    }

    pub fn info(&self, parts: &[&(dyn Display + Sync)]) -> impl Future<Output = ()> + Send + '_ {
        self.log_parts(Level::Info, parts)
    }

    pub fn warn(&self, parts: &[&(dyn Display + Sync)]) -> impl Future<Output = ()> + Send + '_ {
        self.log_parts(Level::Warn, parts)
    }

    pub fn error(&self, parts: &[&(dyn Display + Sync)]) -> impl Future<Output = ()> + Send + '_ {
        self.log_parts(Level::Error, parts)
    }

    /// Fatal is a label like any other level; it does not stop the process.
    pub fn fatal(&self, parts: &[&(dyn Display + Sync)]) -> impl Future<Output = ()> + Send + '_ {
        self.log_parts(Level::Fatal, parts)
    }
}
