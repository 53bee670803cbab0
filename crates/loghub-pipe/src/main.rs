// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, future::Future, sync::Arc};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    signal,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use loghub::{JsonLinesSink, Level, LoggerFacade, PublisherConfig, PublisherRegistry};

const DEFAULT_STREAM: &str = "pipe";
const DEFAULT_LOG_LEVEL: &str = "info";

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOGHUB_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

    let env_filter = EnvFilter::try_new(&log_level).unwrap_or_else(|_| {
        eprintln!("LOGHUB | Invalid LOGHUB_LOG_LEVEL '{log_level}', using {DEFAULT_LOG_LEVEL}");
        EnvFilter::new(DEFAULT_LOG_LEVEL)
    });

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("LOGHUB | Failed to install diagnostic logger: {e}");
    }

    debug!("Logging subsystem enabled");

    let config = match PublisherConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("LOGHUB | Invalid configuration: {}", e);
            return;
        }
    };
    let stream = env::var("LOGHUB_STREAM")
        .ok()
        .filter(|val| !val.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_STREAM.to_string());

    let sink = Arc::new(JsonLinesSink::new(tokio::io::stdout()));
    let registry = match PublisherRegistry::open(config, sink) {
        Ok(registry) => registry,
        Err(e) => {
            error!("LOGHUB | Failed to open registry: {}", e);
            return;
        }
    };
    let logger = match registry.get_or_create(&stream) {
        Ok(logger) => logger,
        Err(e) => {
            error!("LOGHUB | Failed to create stream {}: {}", stream, e);
            return;
        }
    };
    info!("LOGHUB | Publishing stdin to stream {}", stream);

    let interrupted = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("LOGHUB | Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("LOGHUB | Interrupted, flushing queued lines");
    };
    let published = pump(BufReader::new(tokio::io::stdin()), &logger, interrupted).await;
    debug!("LOGHUB | Read {} line(s) from stdin", published);

    tokio::select! {
        () = registry.shutdown() => {}
        _ = signal::ctrl_c() => {
            warn!("LOGHUB | Interrupted again, exiting without flushing");
            return;
        }
    }
    let stats = logger.stats();
    info!(
        "LOGHUB | Done submitted={} failed={} dropped={}",
        stats.submitted, stats.failed, stats.dropped
    );
}

/// Publishes every line of `input` until it ends or `interrupted` resolves.
///
/// The interrupt is also watched while a line waits on backpressure, so a
/// stuck sink cannot hide it. Returns the number of lines queued.
async fn pump<R, F>(input: R, logger: &LoggerFacade, interrupted: F) -> usize
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let mut lines = input.lines();
    tokio::pin!(interrupted);
    let mut published = 0;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            () = &mut interrupted => break,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("LOGHUB | Failed to read stdin: {}", e);
                break;
            }
        };
        let Some((level, content)) = parse_line(&line) else {
            continue;
        };

        tokio::select! {
            () = logger.log(level, content) => published += 1,
            () = &mut interrupted => break,
        }
    }

    published
}

/// Splits an optional leading level word off a line.
///
/// Lines without a recognized level are published whole at Info. Blank lines
/// yield `None`.
fn parse_line(line: &str) -> Option<(Level, &str)> {
    let line = line.trim_end();
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return None;
    }

    let (word, rest) = trimmed
        .split_once(char::is_whitespace)
        .unwrap_or((trimmed, ""));
    match word.parse::<Level>() {
        Ok(level) => Some((level, rest.trim_start())),
        Err(_) => Some((Level::Info, line)),
    }
}
