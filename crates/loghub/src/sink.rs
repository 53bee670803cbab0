// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The capability records are delivered to.
//!
//! A [`LogSink`] is usually a pre-authenticated client for a remote log
//! collection service. Transport, encoding and retry policy all live behind
//! this trait; stream workers only call [`LogSink::submit`] once per record
//! and treat any error as final for that record.

use std::fmt::Debug;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::SinkError;
use crate::record::LogRecord;

#[async_trait]
pub trait LogSink: Send + Sync {
    /// Records one batch. Called concurrently from every stream worker of a
    /// registry, but never concurrently for the same stream.
    async fn submit(&self, record: LogRecord) -> Result<(), SinkError>;
}

/// Writes each record as one JSON line to an async writer.
///
/// Useful for local development, for tests and for handing records to a
/// collector agent that tails a file or reads a pipe. A slow reader only
/// suspends the stream workers waiting on the writer.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> Debug for JsonLinesSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JsonLinesSink")
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> LogSink for JsonLinesSink<W> {
    async fn submit(&self, record: LogRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}
