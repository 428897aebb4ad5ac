// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The worker OS thread (`M`).
//!
//! There is no `g0` struct here the way the original C runtime has one: `g0` existed purely
//! to give the scheduler loop itself a `co_context` to `longjmp` back to once a task
//! suspends. The `fiber` crate's `resume`/`suspend` pair already returns control to whichever
//! Rust call frame invoked `resume` — which *is* the scheduler loop, running on the worker
//! thread's own native stack — so there is nothing left for a separate scheduler coroutine to
//! model.

use std::thread::JoinHandle;

use crate::scheduler::{self, WorkerContext};

/// A single worker OS thread and the join handle used to wait for it at shutdown.
pub(crate) struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(id: usize, ctx: WorkerContext) -> std::io::Result<Self> {
        let handle = std::thread::Builder::new()
            .name(format!("coro-worker-{id}"))
            .spawn(move || scheduler::run_worker(ctx))?;
        Ok(Worker {
            id,
            handle: Some(handle),
        })
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Block until this worker's scheduler loop observes the exit signal and returns.
    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(worker = self.id, "worker thread panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.join();
    }
}
