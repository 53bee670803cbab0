// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Format-string variants of the leveled calls.
//!
//! Each macro takes a [`LoggerFacade`](crate::LoggerFacade) expression and
//! `format!` arguments, and evaluates to the enqueue future:
//!
//! ```rust,ignore
//! loghub::warn_f!(logger, "slow request path={} took={}ms", path, ms).await;
//! ```
//!
//! The message is rendered into a `String` first, so no formatting temporary
//! is held across the `.await` and the future can run on any task.

#[macro_export]
macro_rules! log_f {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, ::std::format!($($arg)+))
    };
}

#[macro_export]
macro_rules! trace_f {
    ($logger:expr, $($arg:tt)+) => { $crate::log_f!($logger, $crate::Level::Trace, $($arg)+) };
}

#[macro_export]
macro_rules! debug_f {
    ($logger:expr, $($arg:tt)+) => { $crate::log_f!($logger, $crate::Level::Debug, $($arg)+) };
}

#[macro_export]
macro_rules! info_f {
    ($logger:expr, $($arg:tt)+) => { $crate::log_f!($logger, $crate::Level::Info, $($arg)+) };
}

#[macro_export]
macro_rules! warn_f {
    ($logger:expr, $($arg:tt)+) => { $crate::log_f!($logger, $crate::Level::Warn, $($arg)+) };
}

#[macro_export]
macro_rules! error_f {
    ($logger:expr, $($arg:tt)+) => { $crate::log_f!($logger, $crate::Level::Error, $($arg)+) };
}

#[macro_export]
macro_rules! fatal_f {
    ($logger:expr, $($arg:tt)+) => { $crate::log_f!($logger, $crate::Level::Fatal, $($arg)+) };
}
