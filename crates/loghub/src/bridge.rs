// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Backend for the `log` crate.
//!
//! Each record is routed to the stream named after its target (by default the
//! emitting module path). `log` calls are synchronous, so the bridge never
//! waits on a queue: when a stream is full the record is dropped and counted
//! in that stream's stats.
//!
//! Records are never routed when they are emitted from a stream worker, for
//! example by an HTTP client inside [`LogSink::submit`](crate::LogSink), nor
//! when their target is this crate's own diagnostics. Either would publish a
//! new record for every record delivered. Sinks that log from tasks they
//! spawn themselves should have those targets excluded with
//! [`LogBridge::exclude_target`].

use std::sync::Arc;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::level::Level;
use crate::publisher::on_stream_worker;
use crate::registry::PublisherRegistry;

const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

fn has_prefix(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

#[derive(Debug)]
pub struct LogBridge {
    registry: Arc<PublisherRegistry>,
    max_level: LevelFilter,
    excluded: Vec<String>,
}

impl LogBridge {
    #[must_use]
    pub fn new(registry: Arc<PublisherRegistry>) -> Self {
        Self {
            registry,
            max_level: LevelFilter::Trace,
            excluded: Vec::new(),
        }
    }

    /// Never routes records whose target is `prefix` or one of its
    /// submodules (`hyper` also covers `hyper::proto::h1`).
    #[must_use]
    pub fn exclude_target(mut self, prefix: impl Into<String>) -> Self {
        self.excluded.push(prefix.into());
        self
    }

    fn routes(&self, target: &str) -> bool {
        !has_prefix(target, OWN_TARGET)
            && !self.excluded.iter().any(|prefix| has_prefix(target, prefix))
    }

    #[must_use]
    pub fn with_max_level(mut self, max_level: LevelFilter) -> Self {
        self.max_level = max_level;
        self
    }

    /// Installs the bridge as the process-wide `log` backend.
    ///
    /// Fails if another backend was installed first.
    pub fn install(self) -> Result<(), SetLoggerError> {
        let max_level = self.max_level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for LogBridge {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata())
            || on_stream_worker()
            || !self.routes(record.target())
        {
            return;
        }
        // Closed registry: nowhere left to publish
        let Ok(logger) = self.registry.get_or_create(record.target()) else {
            return;
        };
        let _ = logger.try_log(Level::from(record.level()), record.args().to_string());
    }

    fn flush(&self) {}
}
