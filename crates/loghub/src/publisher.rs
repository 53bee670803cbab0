// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! One queue and one worker task per log stream.
//!
//! ```text
//!    ┌──────────────────┐
//!    │ StreamPublisher  │ (shared by every facade of the stream)
//!    └────────┬─────────┘
//!             │ bounded mpsc, FIFO
//!             v
//!    ┌──────────────────┐
//!    │  StreamWorker    │ (single consumer, one submission in flight)
//!    └────────┬─────────┘
//!             │ LogRecord stamped at dequeue time
//!             v
//!    ┌──────────────────┐
//!    │     LogSink      │
//!    └──────────────────┘
//! ```
//!
//! A queue capacity of 0 is a hand-off: `enqueue` returns once the worker has
//! taken the batch off the queue. Any other capacity buffers that many batches
//! and `enqueue` only waits while the buffer is full.
//!
//! Shutdown is signalled with a [`CancellationToken`]. The worker closes its
//! queue, submits everything still buffered, then exits. Batches offered after
//! that point are counted as dropped.
//!
//! Everything a worker runs, including the sink, executes inside a
//! task-local scope checked by [`on_stream_worker`]. Backends that feed
//! streams (the `log` bridge) use it to ignore records emitted while a record
//! is being delivered, which would otherwise feed the stream back into itself.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, Instrument, Span};

use crate::config::PublisherConfig;
use crate::error::PublishError;
use crate::observer::{PublisherStats, StreamCounters, SubmitObserver};
use crate::record::{unix_now, FieldPair, LogRecord};
use crate::sink::LogSink;

tokio::task_local! {
    static STREAM_WORKER: ();
}

/// True when called from a stream worker task, sink submissions included.
///
/// Tasks spawned by a sink do not inherit the marker.
#[must_use]
pub fn on_stream_worker() -> bool {
    STREAM_WORKER.try_with(|_| ()).is_ok()
}

/// A batch waiting in a stream queue.
#[derive(Debug)]
struct QueuedBatch {
    fields: Vec<FieldPair>,
    /// Fired when the worker dequeues the batch (hand-off mode only).
    handoff: Option<oneshot::Sender<()>>,
}

/// Producer side of a stream.
#[derive(Debug)]
pub struct StreamPublisher {
    name: String,
    capacity: usize,
    tx: mpsc::Sender<QueuedBatch>,
    cancel_token: CancellationToken,
    counters: Arc<StreamCounters>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StreamPublisher {
    /// Creates the publisher and its worker without starting anything.
    ///
    /// The worker must be driven with [`StreamWorker::run`]; until then
    /// enqueues wait on backpressure like they would against a busy worker.
    #[must_use]
    pub fn new(
        name: &str,
        config: &PublisherConfig,
        sink: Arc<dyn LogSink>,
        observer: Option<Arc<dyn SubmitObserver>>,
    ) -> (Self, StreamWorker) {
        // tokio channels need at least one slot; hand-off mode adds the ack
        let (tx, rx) = mpsc::channel(config.cached.max(1));
        let cancel_token = CancellationToken::new();
        let counters = Arc::new(StreamCounters::default());

        let publisher = Self {
            name: name.to_string(),
            capacity: config.cached,
            tx,
            cancel_token: cancel_token.clone(),
            counters: Arc::clone(&counters),
            worker: Mutex::new(None),
        };

        let worker = StreamWorker {
            topic: name.to_string(),
            source: config.source.clone(),
            rx,
            sink,
            observer,
            counters,
            cancel_token,
        };

        (publisher, worker)
    }

    /// Creates the publisher and runs its worker on `runtime`.
    #[must_use]
    pub fn spawn(
        name: &str,
        config: &PublisherConfig,
        sink: Arc<dyn LogSink>,
        observer: Option<Arc<dyn SubmitObserver>>,
        runtime: &Handle,
    ) -> Self {
        let span = tracing::info_span!("stream_worker", stream = %name);
        Self::spawn_in_span(name, config, sink, observer, runtime, span)
    }

    /// Like [`StreamPublisher::spawn`] with a span created by the caller.
    ///
    /// The registry creates the span before taking its write lock so no
    /// diagnostic is emitted while the lock is held.
    pub(crate) fn spawn_in_span(
        name: &str,
        config: &PublisherConfig,
        sink: Arc<dyn LogSink>,
        observer: Option<Arc<dyn SubmitObserver>>,
        runtime: &Handle,
        span: Span,
    ) -> Self {
        let (publisher, worker) = Self::new(name, config, sink, observer);
        let handle = runtime.spawn(worker.run().instrument(span));
        *publisher
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        publisher
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured queue capacity; 0 means hand-off.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled() || self.tx.is_closed()
    }

    #[must_use]
    pub fn stats(&self) -> PublisherStats {
        self.counters.snapshot()
    }

    /// Queues one batch of fields for submission.
    ///
    /// Waits only for backpressure. Nothing is reported back: a batch offered
    /// to a closed stream is dropped and counted.
    pub async fn enqueue(&self, fields: Vec<FieldPair>) {
        if self.cancel_token.is_cancelled() {
            self.drop_batch(PublishError::Closed);
            return;
        }

        if self.capacity == 0 {
            let (handoff_tx, handoff_rx) = oneshot::channel();
            let batch = QueuedBatch {
                fields,
                handoff: Some(handoff_tx),
            };
            if self.tx.send(batch).await.is_err() {
                self.drop_batch(PublishError::Closed);
                return;
            }
            // The sender half is dropped unacknowledged only if the worker is gone
            if handoff_rx.await.is_err() {
                self.drop_batch(PublishError::Closed);
            }
        } else {
            let batch = QueuedBatch {
                fields,
                handoff: None,
            };
            if self.tx.send(batch).await.is_err() {
                self.drop_batch(PublishError::Closed);
            }
        }
    }

    /// Queues one batch without waiting.
    ///
    /// In hand-off mode this needs the single slot to be free and returns
    /// before the worker has picked the batch up.
    pub fn try_enqueue(&self, fields: Vec<FieldPair>) -> Result<(), PublishError> {
        if self.cancel_token.is_cancelled() {
            self.drop_batch(PublishError::Closed);
            return Err(PublishError::Closed);
        }

        let batch = QueuedBatch {
            fields,
            handoff: None,
        };
        match self.tx.try_send(batch) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.drop_batch(PublishError::Full);
                Err(PublishError::Full)
            }
            Err(TrySendError::Closed(_)) => {
                self.drop_batch(PublishError::Closed);
                Err(PublishError::Closed)
            }
        }
    }

    /// Signals the worker to drain and stop. Does not wait.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Waits for the worker task spawned by [`StreamPublisher::spawn`] to exit.
    pub async fn join(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("LOGHUB | Stream worker for {} failed: {}", self.name, e);
            }
        }
    }

    fn drop_batch(&self, reason: PublishError) {
        self.counters.record_dropped();
        trace!("LOGHUB | Dropped batch for stream {}: {}", self.name, reason);
    }
}

/// Consumer side of a stream. Owns the receiver and submits to the sink.
pub struct StreamWorker {
    topic: String,
    source: String,
    rx: mpsc::Receiver<QueuedBatch>,
    sink: Arc<dyn LogSink>,
    observer: Option<Arc<dyn SubmitObserver>>,
    counters: Arc<StreamCounters>,
    cancel_token: CancellationToken,
}

impl StreamWorker {
    /// Runs until shutdown is signalled or every publisher handle is gone.
    ///
    /// On shutdown the queue is closed to new batches and everything already
    /// buffered is submitted before returning.
    pub async fn run(self) {
        STREAM_WORKER.scope((), self.run_loop()).await;
    }

    async fn run_loop(mut self) {
        debug!("LOGHUB | Stream worker started for {}", self.topic);

        loop {
            tokio::select! {
                batch = self.rx.recv() => {
                    match batch {
                        Some(batch) => self.publish(batch).await,
                        None => {
                            debug!("LOGHUB | All publishers for {} dropped", self.topic);
                            break;
                        }
                    }
                }
                () = self.cancel_token.cancelled() => {
                    debug!("LOGHUB | Received shutdown signal, draining stream {}", self.topic);

                    self.rx.close();
                    while let Some(batch) = self.rx.recv().await {
                        self.publish(batch).await;
                    }

                    break;
                }
            }
        }

        debug!("LOGHUB | Stream worker stopped for {}", self.topic);
    }

    async fn publish(&self, batch: QueuedBatch) {
        let QueuedBatch { fields, handoff } = batch;
        if let Some(handoff) = handoff {
            // Producer may have been cancelled mid-wait; nothing to do then
            let _ = handoff.send(());
        }

        let record = LogRecord::single(&self.topic, &self.source, fields, unix_now());

        match self.sink.submit(record).await {
            Ok(()) => self.counters.record_submitted(),
            Err(e) => {
                self.counters.record_failed();
                error!(
                    "LOGHUB | Failed to submit record for stream {}: {}",
                    self.topic, e
                );
                if let Some(observer) = &self.observer {
                    observer.on_submit_error(&self.topic, &e);
                }
            }
        }
    }
}
