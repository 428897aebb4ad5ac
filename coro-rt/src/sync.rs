// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A binary semaphore used to park and wake the Main coroutine.
//!
//! Main is not a task dispatched by any worker's scheduler loop; it is the embedder's own OS
//! thread, running on its own stack from the moment [`crate::Runtime::init`] returns. It
//! therefore cannot suspend by jumping back into a scheduler trampoline the way a task can
//! (§4.4 of the original): there is no trampoline to jump back into. Instead, blocking Main
//! (from `wait` or `sem_wait`) parks the OS thread on this semaphore, and the scheduler wakes
//! it with [`MainPark::post`] exactly where the original calls `sem_post(&co_main_sem)`.

use std::sync::{Condvar, Mutex};

/// A classic binary semaphore (count clamped to 0/1), built on `std::sync::{Mutex, Condvar}`
/// rather than a platform `sem_t` — the teacher repo and the rest of the pack reach for the
/// standard library's own primitives here rather than an OS semaphore binding.
#[derive(Debug)]
pub(crate) struct MainPark {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl MainPark {
    pub(crate) fn new() -> Self {
        MainPark {
            signaled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Block the calling (Main) thread until [`MainPark::post`] is called.
    ///
    /// If a post already arrived before this call, returns immediately — mirrors `sem_wait`
    /// semantics rather than a plain condvar wait, so a wakeup delivered just before Main
    /// parks is never lost.
    pub(crate) fn wait(&self) {
        let mut signaled = self.signaled.lock().unwrap_or_else(|e| e.into_inner());
        while !*signaled {
            signaled = self
                .condvar
                .wait(signaled)
                .unwrap_or_else(|e| e.into_inner());
        }
        *signaled = false;
    }

    /// Wake the Main thread currently (or about to be) blocked in [`MainPark::wait`].
    pub(crate) fn post(&self) {
        let mut signaled = self.signaled.lock().unwrap_or_else(|e| e.into_inner());
        *signaled = true;
        self.condvar.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::MainPark;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn post_before_wait_is_not_lost() {
        let park = MainPark::new();
        park.post();
        park.wait();
    }

    #[test]
    fn wait_blocks_until_posted() {
        let park = Arc::new(MainPark::new());
        let park2 = park.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            park2.post();
        });
        park.wait();
        handle.join().unwrap();
    }
}
