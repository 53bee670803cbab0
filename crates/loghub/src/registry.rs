// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Stream name to publisher mapping.
//!
//! The registry is the only way to obtain a [`LoggerFacade`]. Publishers are
//! created lazily on the first request for a name and live until the
//! registry is closed.
//!
//! # Locking
//!
//! Lookups of existing streams only take the read lock. A miss takes the
//! write lock and checks the map again before inserting, so two callers
//! racing on a new name always end up with the same publisher and no worker
//! is ever spawned and then discarded.
//!
//! # Lifecycle
//!
//! ```rust,ignore
//! let registry = PublisherRegistry::open(config, sink)?;
//! let logger = registry.get_or_create("svc")?;
//! logger.info(&[&"boot", &"ok"]).await;
//! registry.close().await; // drains every stream and joins every worker
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::runtime::Handle;
use tracing::debug;

use crate::config::PublisherConfig;
use crate::error::RegistryError;
use crate::facade::LoggerFacade;
use crate::observer::{PublisherStats, SubmitObserver};
use crate::publisher::StreamPublisher;
use crate::sink::LogSink;

struct Streams {
    publishers: HashMap<String, Arc<StreamPublisher>>,
    closed: bool,
}

pub struct PublisherRegistry {
    config: PublisherConfig,
    sink: Arc<dyn LogSink>,
    observer: Option<Arc<dyn SubmitObserver>>,
    runtime: Handle,
    streams: RwLock<Streams>,
}

impl PublisherRegistry {
    /// Opens a registry whose workers run on the current tokio runtime.
    pub fn open(config: PublisherConfig, sink: Arc<dyn LogSink>) -> Result<Self, RegistryError> {
        let runtime = Handle::try_current().map_err(|_| RegistryError::NoRuntime)?;
        Self::open_with_runtime(config, sink, runtime)
    }

    /// Opens a registry whose workers run on `runtime`.
    ///
    /// Lets synchronous code (for example a `log` backend installed from
    /// `main` before entering the runtime) create streams.
    pub fn open_with_runtime(
        config: PublisherConfig,
        sink: Arc<dyn LogSink>,
        runtime: Handle,
    ) -> Result<Self, RegistryError> {
        config.validate()?;
        debug!(
            "LOGHUB | Opening registry source={} cached={}",
            config.source, config.cached
        );

        Ok(Self {
            config,
            sink,
            observer: None,
            runtime,
            streams: RwLock::new(Streams {
                publishers: HashMap::new(),
                closed: false,
            }),
        })
    }

    /// Registers an observer notified of every failed submission.
    ///
    /// Only streams created afterwards see it, so set it right after `open`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SubmitObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Returns the facade for `name`, creating its publisher on first use.
    ///
    /// Fails only once the registry is closed.
    pub fn get_or_create(&self, name: &str) -> Result<LoggerFacade, RegistryError> {
        {
            let streams = self.streams.read().unwrap_or_else(PoisonError::into_inner);
            if streams.closed {
                return Err(RegistryError::Closed);
            }
            if let Some(publisher) = streams.publishers.get(name) {
                return Ok(LoggerFacade::new(Arc::clone(publisher)));
            }
        }

        // Nothing may emit diagnostics under the write lock: a `log` backend
        // routed back into this registry would deadlock on it.
        let span = tracing::info_span!("stream_worker", stream = %name);
        let publisher = {
            let mut streams = self.streams.write().unwrap_or_else(PoisonError::into_inner);
            // State may have changed between the two locks
            if streams.closed {
                return Err(RegistryError::Closed);
            }
            if let Some(publisher) = streams.publishers.get(name) {
                return Ok(LoggerFacade::new(Arc::clone(publisher)));
            }

            let publisher = Arc::new(StreamPublisher::spawn_in_span(
                name,
                &self.config,
                Arc::clone(&self.sink),
                self.observer.clone(),
                &self.runtime,
                span,
            ));
            streams
                .publishers
                .insert(name.to_string(), Arc::clone(&publisher));
            publisher
        };

        debug!("LOGHUB | Created publisher for stream {}", name);
        Ok(LoggerFacade::new(publisher))
    }

    /// Returns the facade for an existing stream without creating one.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<LoggerFacade> {
        let streams = self.streams.read().unwrap_or_else(PoisonError::into_inner);
        streams
            .publishers
            .get(name)
            .map(|publisher| LoggerFacade::new(Arc::clone(publisher)))
    }

    /// Names of all streams created so far, sorted.
    #[must_use]
    pub fn stream_names(&self) -> Vec<String> {
        let streams = self.streams.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = streams.publishers.keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .publishers
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }

    /// Counters of every stream, keyed by stream name.
    #[must_use]
    pub fn stats(&self) -> BTreeMap<String, PublisherStats> {
        let streams = self.streams.read().unwrap_or_else(PoisonError::into_inner);
        streams
            .publishers
            .iter()
            .map(|(name, publisher)| (name.clone(), publisher.stats()))
            .collect()
    }

    /// Stops accepting new streams, drains every stream and waits for all
    /// workers to exit. Calling it again is a no-op.
    ///
    /// Facades still held by callers keep working as handles, but every
    /// batch they offer afterwards is dropped and counted.
    pub async fn shutdown(&self) {
        let publishers: Vec<Arc<StreamPublisher>> = {
            let mut streams = self.streams.write().unwrap_or_else(PoisonError::into_inner);
            streams.closed = true;
            streams.publishers.values().cloned().collect()
        };

        debug!("LOGHUB | Closing {} stream(s)", publishers.len());
        for publisher in &publishers {
            publisher.shutdown();
        }
        for publisher in &publishers {
            publisher.join().await;
        }
        debug!("LOGHUB | Registry closed");
    }

    /// Consuming form of [`PublisherRegistry::shutdown`].
    pub async fn close(self) {
        self.shutdown().await;
    }
}

impl std::fmt::Debug for PublisherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherRegistry")
            .field("config", &self.config)
            .field("streams", &self.stream_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::level::Level;
    use crate::record::{LogRecord, CONTENT_KEY};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        records: Mutex<Vec<LogRecord>>,
    }

    impl CollectingSink {
        fn contents_for(&self, topic: &str) -> Vec<String> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.topic == topic)
                .map(|r| r.field(CONTENT_KEY).unwrap_or_default().to_string())
                .collect()
        }
    }

    #[async_trait]
    impl LogSink for CollectingSink {
        async fn submit(&self, record: LogRecord) -> Result<(), SinkError> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl LogSink for FailingSink {
        async fn submit(&self, _record: LogRecord) -> Result<(), SinkError> {
            Err(SinkError::Transport("collector unreachable".to_string()))
        }
    }

    fn open(cached: usize, sink: Arc<dyn LogSink>) -> PublisherRegistry {
        PublisherRegistry::open(PublisherConfig::new("test-host", cached), sink)
            .expect("failed to open registry")
    }

    #[test]
    fn test_open_without_runtime_fails() {
        let result = PublisherRegistry::open(
            PublisherConfig::default(),
            Arc::new(CollectingSink::default()),
        );
        assert!(matches!(result, Err(RegistryError::NoRuntime)));
    }

    #[test]
    fn test_open_with_runtime_from_sync_code() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let sink = Arc::new(CollectingSink::default());

        // Neither call runs inside the runtime context
        let registry = PublisherRegistry::open_with_runtime(
            PublisherConfig::new("test-host", 4),
            sink.clone(),
            runtime.handle().clone(),
        )
        .unwrap();
        let logger = registry.get_or_create("sync").unwrap();
        logger.try_log(Level::Warn, "from main").unwrap();

        runtime.block_on(registry.shutdown());

        assert_eq!(sink.contents_for("sync"), vec!["from main"]);
        assert_eq!(registry.stats()["sync"].submitted, 1);
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_config() {
        let result = PublisherRegistry::open(
            PublisherConfig::new(" ", 0),
            Arc::new(CollectingSink::default()),
        );
        assert!(matches!(result, Err(RegistryError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let registry = open(0, Arc::new(CollectingSink::default()));

        let first = registry.get_or_create("svc").unwrap();
        let second = registry.get_or_create("svc").unwrap();

        assert!(first.same_stream(&second));
        assert_eq!(registry.len(), 1);
        assert_eq!(first.name(), "svc");
        registry.close().await;
    }

    #[tokio::test]
    async fn test_get_does_not_create() {
        let registry = open(0, Arc::new(CollectingSink::default()));

        assert!(registry.get("svc").is_none());
        assert!(registry.is_empty());

        let created = registry.get_or_create("svc").unwrap();
        let found = registry.get("svc").expect("stream should exist");
        assert!(created.same_stream(&found));
        registry.close().await;
    }

    #[tokio::test]
    async fn test_streams_are_isolated() {
        let sink = Arc::new(CollectingSink::default());
        let registry = open(4, sink.clone());

        let a = registry.get_or_create("a").unwrap();
        let b = registry.get_or_create("b").unwrap();
        a.log(Level::Info, "for a").await;
        b.log(Level::Info, "for b").await;
        a.log(Level::Warn, "again a").await;
        registry.shutdown().await;

        assert_eq!(sink.contents_for("a"), vec!["for a", "again a"]);
        assert_eq!(sink.contents_for("b"), vec!["for b"]);
        assert!(!a.same_stream(&b));
        assert_eq!(registry.stream_names(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_stream_names_sorted() {
        let registry = open(0, Arc::new(CollectingSink::default()));
        for name in ["zeta", "alpha", "mid"] {
            registry.get_or_create(name).unwrap();
        }
        assert_eq!(registry.stream_names(), vec!["alpha", "mid", "zeta"]);
        registry.close().await;
    }

    #[tokio::test]
    async fn test_close_drains_and_rejects_new_streams() {
        let sink = Arc::new(CollectingSink::default());
        let registry = open(64, sink.clone());

        let logger = registry.get_or_create("svc").unwrap();
        for i in 0..20 {
            logger.try_log(Level::Debug, format!("queued {i}")).unwrap();
        }
        registry.shutdown().await;

        assert_eq!(sink.contents_for("svc").len(), 20);
        assert!(registry.is_closed());
        assert!(matches!(
            registry.get_or_create("other"),
            Err(RegistryError::Closed)
        ));
        assert!(matches!(
            registry.get_or_create("svc"),
            Err(RegistryError::Closed)
        ));

        // Old facades still resolve but their batches are dropped
        logger.log(Level::Info, "after close").await;
        assert_eq!(sink.contents_for("svc").len(), 20);
        assert_eq!(registry.stats()["svc"].dropped, 1);

        // Second shutdown is a no-op
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_observer_sees_failures() {
        let failures = Arc::new(AtomicUsize::new(0));
        let observer: Arc<dyn SubmitObserver> = {
            let failures = Arc::clone(&failures);
            Arc::new(move |stream: &str, _error: &SinkError| {
                assert_eq!(stream, "svc");
                failures.fetch_add(1, Ordering::SeqCst);
            })
        };
        let registry = open(0, Arc::new(FailingSink)).with_observer(observer);

        let logger = registry.get_or_create("svc").unwrap();
        logger.log(Level::Error, "one").await;
        logger.log(Level::Error, "two").await;
        registry.shutdown().await;

        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert_eq!(
            registry.stats()["svc"],
            PublisherStats {
                submitted: 0,
                failed: 2,
                dropped: 0,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_creates_one_publisher() {
        let sink = Arc::new(CollectingSink::default());
        let registry = Arc::new(open(0, sink.clone()));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.get_or_create("x").unwrap()
            }));
        }

        let mut facades = Vec::new();
        for task in tasks {
            facades.push(task.await.unwrap());
        }

        assert_eq!(registry.len(), 1);
        assert!(facades.iter().all(|f| f.same_stream(&facades[0])));

        for (i, facade) in facades.iter().enumerate() {
            facade.log(Level::Info, format!("via facade {i}")).await;
        }
        registry.shutdown().await;

        let expected: Vec<String> = (0..16).map(|i| format!("via facade {i}")).collect();
        assert_eq!(sink.contents_for("x"), expected);
        assert_eq!(registry.stats()["x"].submitted, 16);
    }

    #[tokio::test]
    async fn test_debug_format() {
        let registry = open(0, Arc::new(CollectingSink::default()));
        registry.get_or_create("svc").unwrap();

        let debug_str = format!("{:?}", registry);
        assert!(debug_str.contains("PublisherRegistry"));
        assert!(debug_str.contains("svc"));
        registry.close().await;
    }
}
