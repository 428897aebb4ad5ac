// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Error handling conventions for the runtime.
//!
//! The scheduler itself has no recoverable error path: a corrupted queue, an invalid status
//! at dispatch, or a double join are all programming errors, and [`fail`] turns them into a
//! process-terminating panic with a file:line:message, mirroring `panic()` in the original
//! C runtime's `lang_items.h`.
//!
//! [`RuntimeError`] covers the small number of conditions that a caller can reasonably react
//! to instead: calling into a runtime that has already been shut down.

use core::fmt;
use std::panic::Location;

/// Fail the process with a file:line-annotated message.
///
/// Used for invariant violations the scheduler detects internally (corrupted queues, an
/// invalid task status at dispatch, a missing-from-expected-queue task). These are bugs, not
/// recoverable errors, so this never returns.
#[track_caller]
#[cold]
pub(crate) fn fail(msg: impl fmt::Display) -> ! {
    let loc = Location::caller();
    tracing::error!(file = loc.file(), line = loc.line(), "{msg}");
    panic!("{}:{}: {msg}", loc.file(), loc.line());
}

/// Errors a caller of the embedding API can recover from.
#[derive(Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum RuntimeError {
    /// `start` or `sem_create` was called after the owning [`crate::Runtime`] was dropped.
    AlreadyShutdown,
    /// The configuration passed to [`crate::Runtime::init`] was invalid.
    Config(ConfigErrorKind),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::AlreadyShutdown => f.write_str("runtime has already been shut down"),
            RuntimeError::Config(kind) => write!(f, "invalid runtime configuration: {kind}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Why a [`crate::RuntimeConfig`] was rejected.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[non_exhaustive]
pub enum ConfigErrorKind {
    /// Worker count was below 2. Worker 0 is always Main, which never runs a scheduler loop
    /// (spec §4.10), so at least one more worker is needed for any `start`ed task to run.
    TooFewWorkers,
    /// Task stack size was below [`fiber::stack::MIN_STACK_SIZE`].
    StackTooSmall,
    /// Local run queue capacity was zero.
    ZeroQueueCapacity,
}

impl fmt::Display for ConfigErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigErrorKind::TooFewWorkers => f.write_str("worker count must be at least 2"),
            ConfigErrorKind::StackTooSmall => f.write_str("task stack size is below the minimum"),
            ConfigErrorKind::ZeroQueueCapacity => {
                f.write_str("local queue capacity must be at least 1")
            }
        }
    }
}
