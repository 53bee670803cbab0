// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock sinks

use async_trait::async_trait;
use loghub::record::{CONTENT_KEY, LEVEL_KEY};
use loghub::{LogRecord, LogSink, SinkError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Keeps every record it is handed, in submission order
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<LogRecord>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn records_for(&self, topic: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.topic == topic)
            .collect()
    }

    /// `(Level, Content)` of every record submitted to `topic`
    pub fn messages_for(&self, topic: &str) -> Vec<(String, String)> {
        self.records_for(topic)
            .iter()
            .map(|r| {
                (
                    r.field(LEVEL_KEY).unwrap_or_default().to_string(),
                    r.field(CONTENT_KEY).unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl LogSink for RecordingSink {
    async fn submit(&self, record: LogRecord) -> Result<(), SinkError> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

/// Fails every submission and counts the attempts
#[derive(Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

#[allow(dead_code)]
impl FailingSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogSink for FailingSink {
    async fn submit(&self, _record: LogRecord) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Transport("connection refused".to_string()))
    }
}
