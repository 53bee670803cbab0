// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Visibility into what stream workers drop.
//!
//! Failures never travel back to the code issuing log calls. Operators see
//! them through the diagnostic log, through per-stream counters and through
//! an optional [`SubmitObserver`] registered on the registry.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::SinkError;

/// Notified by a stream worker every time the sink rejects a record.
///
/// Runs on the worker task, so it should return quickly.
pub trait SubmitObserver: Send + Sync {
    fn on_submit_error(&self, stream: &str, error: &SinkError);
}

impl<F> SubmitObserver for F
where
    F: Fn(&str, &SinkError) + Send + Sync,
{
    fn on_submit_error(&self, stream: &str, error: &SinkError) {
        self(stream, error);
    }
}

/// Point-in-time view of one stream's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    /// Records accepted by the sink
    pub submitted: u64,
    /// Records the sink failed to accept
    pub failed: u64,
    /// Batches discarded before reaching the worker (closed or full queue)
    pub dropped: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StreamCounters {
    submitted: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl StreamCounters {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PublisherStats {
        PublisherStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
