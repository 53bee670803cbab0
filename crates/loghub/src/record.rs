// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Records handed to a [`LogSink`](crate::sink::LogSink).
//!
//! A record mirrors the shape remote log stores expect: a topic and a source
//! identifying the stream, and a list of entries, each an ordered set of
//! key/value pairs stamped with a Unix time in seconds. The publisher always
//! builds exactly one entry per record.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::level::Level;

/// Key of the severity field.
pub const LEVEL_KEY: &str = "Level";
/// Key of the message field.
pub const CONTENT_KEY: &str = "Content";

/// A single key/value field. Order inside an entry is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldPair {
    pub key: String,
    pub value: String,
}

impl FieldPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Builds the two fields every leveled call produces, level first.
#[must_use]
pub fn leveled_fields(level: Level, content: String) -> Vec<FieldPair> {
    vec![
        FieldPair::new(LEVEL_KEY, level.as_str()),
        FieldPair::new(CONTENT_KEY, content),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub contents: Vec<FieldPair>,
    /// Unix time in seconds.
    pub time: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub topic: String,
    pub source: String,
    pub logs: Vec<LogEntry>,
}

impl LogRecord {
    /// Wraps one batch of fields into a record carrying a single entry.
    #[must_use]
    pub fn single(topic: &str, source: &str, contents: Vec<FieldPair>, time: u32) -> Self {
        Self {
            topic: topic.to_string(),
            source: source.to_string(),
            logs: vec![LogEntry { contents, time }],
        }
    }

    /// Looks up a field of the first entry by key.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.logs
            .first()?
            .contents
            .iter()
            .find(|pair| pair.key == key)
            .map(|pair| pair.value.as_str())
    }
}

/// Current wall-clock time as Unix seconds, saturating at `u32::MAX`.
#[must_use]
pub fn unix_now() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    u32::try_from(secs).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leveled_fields_order() {
        let fields = leveled_fields(Level::Error, "disk full".to_string());
        assert_eq!(
            fields,
            vec![
                FieldPair::new("Level", "Error"),
                FieldPair::new("Content", "disk full"),
            ]
        );
    }

    #[test]
    fn test_single_record() {
        let record = LogRecord::single(
            "svc",
            "host-1",
            leveled_fields(Level::Info, "boot ok".to_string()),
            1_700_000_000,
        );
        assert_eq!(record.topic, "svc");
        assert_eq!(record.source, "host-1");
        assert_eq!(record.logs.len(), 1);
        assert_eq!(record.logs[0].time, 1_700_000_000);
        assert_eq!(record.field(LEVEL_KEY), Some("Info"));
        assert_eq!(record.field(CONTENT_KEY), Some("boot ok"));
        assert_eq!(record.field("missing"), None);
    }

    #[test]
    fn test_record_serializes_in_field_order() {
        let record = LogRecord::single(
            "svc",
            "src",
            leveled_fields(Level::Warn, "slow".to_string()),
            42,
        );
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"topic":"svc","source":"src","logs":[{"contents":[{"key":"Level","value":"Warn"},{"key":"Content","value":"slow"}],"time":42}]}"#
        );
    }

    #[test]
    fn test_unix_now_is_recent() {
        // 2023-11-14, well before any machine running these tests
        assert!(unix_now() > 1_700_000_000);
    }
}
