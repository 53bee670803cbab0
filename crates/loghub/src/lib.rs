// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # loghub
//!
//! Asynchronous, per-stream publishing of leveled log messages to a remote
//! log collection service.
//!
//! ## Architecture
//!
//! - [`registry`]: maps stream names to publishers, creates them lazily
//! - [`publisher`]: one bounded queue and one background worker per stream
//! - [`facade`]: the leveled logging surface handed to application code
//! - [`sink`]: the collaborator that actually delivers records
//! - [`bridge`]: routes records from the `log` crate into streams
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use loghub::{JsonLinesSink, PublisherConfig, PublisherRegistry};
//!
//! let registry = PublisherRegistry::open(
//!     PublisherConfig::new("web-01", 256),
//!     Arc::new(JsonLinesSink::new(tokio::io::stdout())),
//! )?;
//! let logger = registry.get_or_create("checkout")?;
//! logger.info(&[&"order", &1234, &"accepted"]).await;
//! loghub::warn_f!(logger, "payment retry attempt={}", 2).await;
//! registry.close().await;
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod macros;

pub mod bridge;
pub mod config;
pub mod error;
pub mod facade;
pub mod level;
pub mod observer;
pub mod publisher;
pub mod record;
pub mod registry;
pub mod sink;

pub use bridge::LogBridge;
pub use config::PublisherConfig;
pub use error::{ConfigError, PublishError, RegistryError, SinkError};
pub use facade::LoggerFacade;
pub use level::{Level, ParseLevelError};
pub use observer::{PublisherStats, SubmitObserver};
pub use publisher::{StreamPublisher, StreamWorker};
pub use record::{FieldPair, LogEntry, LogRecord};
pub use registry::PublisherRegistry;
pub use sink::{JsonLinesSink, LogSink};
