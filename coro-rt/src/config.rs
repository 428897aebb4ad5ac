// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Runtime configuration.
//!
//! The original C runtime fixed its three tunables (`M`, `STACK_SIZE`, queue capacity) as
//! preprocessor constants. This crate generalizes them into a [`RuntimeConfig`], built with
//! the same builder pattern the teacher's `TaskBuilder` uses, while keeping the constants'
//! defaults identical to the original: 16 workers, 16 KiB task stacks, a 256-slot local
//! run queue.

pub use crate::error::ConfigErrorKind as ConfigError;
use fiber::stack::MIN_STACK_SIZE;

/// Default number of worker OS threads (`M`), matching the original's `#define M 16`.
pub const DEFAULT_WORKERS: usize = 16;
/// Default per-task stack size in bytes, matching the original's `#define STACK_SIZE (16 * 1024)`.
pub const DEFAULT_TASK_STACK_SIZE: usize = 16 * 1024;
/// Default local run queue capacity, matching the original's `#define CO_QUEUE_SIZE 256`.
pub const DEFAULT_LOCAL_QUEUE_CAPACITY: usize = 256;

/// Tunable parameters for a [`crate::Runtime`].
///
/// Construct with [`RuntimeConfig::builder`] or use [`RuntimeConfig::default`] to get the
/// original runtime's fixed constants.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RuntimeConfig {
    pub(crate) workers: usize,
    pub(crate) task_stack_size: usize,
    pub(crate) local_queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            workers: DEFAULT_WORKERS,
            task_stack_size: DEFAULT_TASK_STACK_SIZE,
            local_queue_capacity: DEFAULT_LOCAL_QUEUE_CAPACITY,
        }
    }
}

impl RuntimeConfig {
    /// Start building a non-default configuration.
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Number of worker OS threads (`M` in the G-M-P model).
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Per-task stack size, in bytes.
    pub fn task_stack_size(&self) -> usize {
        self.task_stack_size
    }

    /// Capacity of each worker's local run queue.
    pub fn local_queue_capacity(&self) -> usize {
        self.local_queue_capacity
    }
}

/// Builder for [`RuntimeConfig`], mirroring the teacher's `TaskBuilder` conventions: each
/// setter takes `self` by value and returns `Self`, and `build` validates and reports all
/// failures as a [`ConfigError`].
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfigBuilder {
    workers: usize,
    task_stack_size: usize,
    local_queue_capacity: usize,
}

impl Default for RuntimeConfigBuilder {
    fn default() -> Self {
        let defaults = RuntimeConfig::default();
        RuntimeConfigBuilder {
            workers: defaults.workers,
            task_stack_size: defaults.task_stack_size,
            local_queue_capacity: defaults.local_queue_capacity,
        }
    }
}

impl RuntimeConfigBuilder {
    /// Set the number of worker OS threads.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the per-task stack size, in bytes.
    pub fn task_stack_size(mut self, bytes: usize) -> Self {
        self.task_stack_size = bytes;
        self
    }

    /// Set the capacity of each worker's local run queue.
    pub fn local_queue_capacity(mut self, capacity: usize) -> Self {
        self.local_queue_capacity = capacity;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<RuntimeConfig, ConfigError> {
        // Worker 0 is always Main and never runs `run_worker` (spec §4.10); fewer than 2
        // workers means no OS thread ever dispatches a `start`ed task, matching the original's
        // `M >= 16` floor in spirit if not in exact value.
        if self.workers < 2 {
            return Err(ConfigError::TooFewWorkers);
        }
        if self.task_stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::StackTooSmall);
        }
        if self.local_queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(RuntimeConfig {
            workers: self.workers,
            task_stack_size: self.task_stack_size,
            local_queue_capacity: self.local_queue_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_original_constants() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.workers(), 16);
        assert_eq!(cfg.task_stack_size(), 16 * 1024);
        assert_eq!(cfg.local_queue_capacity(), 256);
    }

    #[test]
    fn rejects_zero_workers() {
        let err = RuntimeConfig::builder().workers(0).build().unwrap_err();
        assert_eq!(err, ConfigError::TooFewWorkers);
    }

    #[test]
    fn rejects_single_worker() {
        // Worker 0 is Main; one worker means zero OS threads ever run `run_worker`, so a
        // `start`ed task would never be dispatched and `wait` would block forever.
        let err = RuntimeConfig::builder().workers(1).build().unwrap_err();
        assert_eq!(err, ConfigError::TooFewWorkers);
    }

    #[test]
    fn rejects_tiny_stack() {
        let err = RuntimeConfig::builder()
            .task_stack_size(64)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::StackTooSmall);
    }

    #[test]
    fn rejects_zero_queue_capacity() {
        let err = RuntimeConfig::builder()
            .local_queue_capacity(0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroQueueCapacity);
    }

    #[test]
    fn builder_round_trips_custom_values() {
        let cfg = RuntimeConfig::builder()
            .workers(24)
            .task_stack_size(32 * 1024)
            .local_queue_capacity(128)
            .build()
            .unwrap();
        assert_eq!(cfg.workers(), 24);
        assert_eq!(cfg.task_stack_size(), 32 * 1024);
        assert_eq!(cfg.local_queue_capacity(), 128);
    }
}
