// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Shared setup for the demo binaries. None of this is part of the runtime itself — each demo
//! is a small program exercising `coro_rt` the way the original C test suite's `test_*.c`
//! files exercised `co.h`.

use tracing_subscriber::EnvFilter;

/// Install a `tracing_subscriber::fmt` subscriber driven by `RUST_LOG`, defaulting to `info`
/// when unset. Call once at the top of `main`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_thread_names(true)
        .init();
}
