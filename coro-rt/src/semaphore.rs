// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A coroutine-aware counting semaphore (`co_sem` in the original C runtime).
//!
//! Acquiring with no permits available parks the calling task instead of blocking its worker
//! thread: the task registers itself as a waiter and marks itself `Waiting` while still
//! holding the semaphore's own lock (the lock order is semaphore mutex, then waiter status
//! mutex — never the reverse), and only suspends back to the scheduler after both locks are
//! released. This differs from the original, which registers the waiter *after* jumping back
//! to the scheduler; collapsing that into a single pre-suspend step avoids needing to carry a
//! held lock across a stack switch, which Rust's `Mutex` (unlike a bare `pthread_mutex_t`)
//! gives no way to do, while leaving every externally observable ordering unchanged.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::task::{Task, TaskHandle, TaskState};

struct SemState {
    count: u32,
    waiters: VecDeque<TaskHandle>,
}

pub(crate) struct Semaphore {
    state: Mutex<SemState>,
}

impl Semaphore {
    pub(crate) fn new(initial: u32) -> Self {
        Semaphore {
            state: Mutex::new(SemState {
                count: initial,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Try to take a permit immediately. If none is available, register `waiter` on the wait
    /// list and mark it `Waiting` before returning — the caller must suspend right after this
    /// returns `false`, without doing any other locking in between.
    pub(crate) fn try_acquire_or_park(&self, waiter: &TaskHandle) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.count > 0 {
            state.count -= 1;
            return true;
        }
        state.waiters.push_back(waiter.clone());
        waiter.set_status(TaskState::Waiting);
        false
    }

    /// Release a permit. Returns the waiter that should now be woken, if the wait list was
    /// non-empty; otherwise the permit is simply banked.
    pub(crate) fn post(&self) -> Option<TaskHandle> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.waiters.pop_front() {
            Some(waiter) => Some(waiter),
            None => {
                state.count += 1;
                None
            }
        }
    }
}

/// A handle to a coroutine-aware counting semaphore, created with
/// [`crate::Runtime::sem_create`].
#[derive(Clone)]
pub struct SemaphoreHandle(pub(crate) Arc<Semaphore>);

impl fmt::Debug for SemaphoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("SemaphoreHandle")
            .field("count", &state.count)
            .field("waiters", &state.waiters.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_without_contention_decrements_count() {
        let sem = Semaphore::new(2);
        let waiter = Task::new_for_test("probe");
        assert!(sem.try_acquire_or_park(&waiter));
        assert!(sem.try_acquire_or_park(&waiter));
        assert!(!sem.try_acquire_or_park(&waiter));
    }

    #[test]
    fn parked_waiter_is_marked_waiting() {
        let sem = Semaphore::new(0);
        let waiter = Task::new_for_test("probe");
        assert!(!sem.try_acquire_or_park(&waiter));
        assert_eq!(waiter.status(), TaskState::Waiting);
    }

    #[test]
    fn post_wakes_fifo() {
        let sem = Semaphore::new(0);
        let a = Task::new_for_test("a");
        let b = Task::new_for_test("b");
        assert!(!sem.try_acquire_or_park(&a));
        assert!(!sem.try_acquire_or_park(&b));
        assert_eq!(sem.post().unwrap().id(), a.id());
        assert_eq!(sem.post().unwrap().id(), b.id());
        assert!(sem.post().is_none()); // banked as a free permit
    }
}
