// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A user-space cooperative coroutine runtime modeled after the G-M-P scheduling
//! architecture: lightweight stackful tasks (`G`) multiplexed over a fixed pool of worker
//! threads (`M`), each holding a processor context (`P`) with a local run queue.
//!
//! ```no_run
//! let rt = coro_rt::Runtime::init(coro_rt::RuntimeConfig::default());
//! let h = rt.start("greeter", || println!("hello from a coroutine")).unwrap();
//! rt.wait(h);
//! ```
//!
//! See the module docs on [`scheduler`] for the scheduling algorithm and [`task`] for the
//! lifecycle of a single coroutine.

mod config;
mod error;
mod processor;
mod queue;
pub mod scheduler;
mod semaphore;
pub mod task;
mod worker;

mod runtime;
mod sync;

pub use config::{ConfigError, RuntimeConfig, RuntimeConfigBuilder};
pub use error::RuntimeError;
pub use runtime::{
    sem_create, sem_destroy, sem_post, sem_wait, start, wait, yield_now, Runtime,
};
pub use semaphore::SemaphoreHandle;
pub use task::TaskHandle;
