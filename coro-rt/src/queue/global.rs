// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The overflow queue shared by every worker (`mutex_queue` / `global_queue` in the original
//! C runtime): an unbounded FIFO protected by a single mutex, used both as the landing spot
//! for tasks a local queue spills when it's over-full and as the source processors pull from
//! when their own queue runs dry.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::task::TaskHandle;

#[derive(Debug, Default)]
pub(crate) struct GlobalQueue {
    inner: Mutex<VecDeque<TaskHandle>>,
}

impl GlobalQueue {
    pub(crate) fn new() -> Self {
        GlobalQueue::default()
    }

    pub(crate) fn push_back(&self, task: TaskHandle) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).push_back(task);
    }

    pub(crate) fn pop_front(&self) -> Option<TaskHandle> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::GlobalQueue;
    use crate::task::{Task, TaskHandle};

    fn handle(name: &str) -> TaskHandle {
        Task::new_for_test(name)
    }

    #[test]
    fn fifo_order() {
        let q = GlobalQueue::new();
        assert!(q.is_empty());
        q.push_back(handle("a"));
        q.push_back(handle("b"));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop_front().unwrap().name(), "a");
        assert_eq!(q.pop_front().unwrap().name(), "b");
        assert!(q.pop_front().is_none());
    }
}
