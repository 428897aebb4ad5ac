// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The processor context (`P`): each worker thread owns exactly one, holding its local run
//! queue and the bookkeeping needed to balance it against the shared global queue.
//!
//! Unlike the original C runtime's `struct p`, there is no `to_be_waited` / `blocked_sem`
//! scratch field here: those existed only to pass a target across the stack switch from a
//! blocking call to the scheduler's handling of it. This crate's `wait`/`sem_wait` register
//! the task as a waiter *before* suspending (see `semaphore.rs`), so by the time the
//! scheduler observes the suspend it has nothing left to do but move on — see `scheduler.rs`.

use crate::queue::global::GlobalQueue;
use crate::queue::ring::RingQueue;
use crate::task::TaskHandle;

pub(crate) struct Processor {
    /// Tasks ready to run, local to this processor. The ring queue from §4.1.
    running: RingQueue<TaskHandle>,
    /// Every task created (`start`) by this processor's worker thread, recorded exactly once
    /// via [`Processor::track_new`] regardless of how many times it is later pushed/popped
    /// between the local and global queues. Kept until shutdown for debug listing and final
    /// teardown.
    all: Vec<TaskHandle>,
    /// Tasks that have exited while owned by this processor.
    dead: Vec<TaskHandle>,
}

impl Processor {
    pub(crate) fn new(local_queue_capacity: usize) -> Self {
        Processor {
            running: RingQueue::with_capacity(local_queue_capacity),
            all: Vec::new(),
            dead: Vec::new(),
        }
    }

    /// Target occupancy for the local queue: evenly dividing live tasks across workers,
    /// capped just under the queue's hard capacity. Matches the original's
    /// `MIN((co_num + M_NUM - 1) / M_NUM, RUN_QUEUE_SIZE - 1)`.
    fn target_size(&self, live_tasks: usize, workers: usize) -> usize {
        let per_worker = live_tasks.div_ceil(workers);
        per_worker.min(self.running.max_len())
    }

    /// Record a newly created task in this processor's bookkeeping list. Called exactly once
    /// per task, at creation (`co_start`'s `queue_push(&p_current->all_queue, g)` in the
    /// original) — never from `push`/`pop`, which merely move an already-tracked task between
    /// the local and global queues on yield, rebalance, or wakeup.
    pub(crate) fn track_new(&mut self, task: TaskHandle) {
        self.all.push(task);
    }

    pub(crate) fn track_dead(&mut self, task: TaskHandle) {
        self.dead.push(task);
    }

    /// Push a task onto the local queue, spilling the overflow to `global` first if the queue
    /// is more than twice its target occupancy.
    pub(crate) fn push(
        &mut self,
        global: &GlobalQueue,
        live_tasks: usize,
        workers: usize,
        task: TaskHandle,
    ) {
        let target = self.target_size(live_tasks, workers);
        let mut size = self.running.len();
        if target != 0 && size > target * 2 {
            while size > target - 1 {
                let Some(overflow) = self.running.pop_front() else {
                    break;
                };
                global.push_back(overflow);
                size -= 1;
            }
        }
        if !self.running.push_back(task) {
            crate::error::fail("local run queue is still full after spilling overflow");
        }
    }

    /// Pop the next task to run, topping up from `global` first if the queue has dropped
    /// under half its target occupancy.
    pub(crate) fn pop(
        &mut self,
        global: &GlobalQueue,
        live_tasks: usize,
        workers: usize,
    ) -> Option<TaskHandle> {
        let target = self.target_size(live_tasks, workers);
        let mut size = self.running.len();
        if size < target.div_ceil(2) {
            while size < target {
                let Some(pulled) = global.pop_front() else {
                    break;
                };
                // best-effort: if the local queue is somehow already full, stop pulling
                // rather than drop a task global.pop_front() already committed to handing us.
                if !self.running.push_back(pulled) {
                    break;
                }
                size += 1;
            }
        }
        self.running.pop_front()
    }

    /// Snapshot of the names currently in the local run queue, for tests and debugging.
    pub(crate) fn debug_running_names(&self) -> Vec<&str> {
        self.running.iter().map(|t| t.name()).collect()
    }

    pub(crate) fn local_len(&self) -> usize {
        self.running.len()
    }
}

impl Drop for Processor {
    /// Best-effort teardown (spec §4.10): a worker's `all` queue is the only thing still
    /// holding a strong reference to tasks this processor ever ran, so dropping it is what
    /// finally releases any the embedder never joined. Surface that as a warning rather than
    /// silently leaking diagnostics, since it almost always indicates a missing `wait`.
    fn drop(&mut self) {
        let outstanding = self.all.iter().filter(|t| !t.is_dead()).count();
        if outstanding > 0 {
            tracing::warn!(
                outstanding,
                "processor dropped with live tasks still tracked; the embedder should have \
                 joined them before shutdown"
            );
        }
        tracing::trace!(exited = self.dead.len(), "processor tore down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    fn task(name: &str) -> TaskHandle {
        Task::new_for_test(name)
    }

    #[test]
    fn push_pop_round_trips_without_global() {
        let global = GlobalQueue::new();
        let mut p = Processor::new(256);
        p.push(&global, 1, 16, task("a"));
        assert_eq!(p.local_len(), 1);
        assert_eq!(p.pop(&global, 1, 16).unwrap().name(), "a");
        assert!(global.is_empty());
    }

    #[test]
    fn overfull_local_queue_spills_to_global() {
        let global = GlobalQueue::new();
        // small local capacity, large live_tasks/workers ratio to force target_size small
        let mut p = Processor::new(8);
        for i in 0..7 {
            p.push(&global, 7, 1, task(&format!("t{i}")));
        }
        // target_size = ceil(7/1)=7, capped to max_len=7 -> not over 2x, so no spill yet
        assert!(global.is_empty());
        // drop live_tasks so the target shrinks and the existing backlog looks overfull
        p.push(&global, 1, 1, task("overflow"));
        assert!(!global.is_empty(), "expected overflow to spill once the target shrinks");
    }

    #[test]
    fn underfull_local_queue_pulls_from_global() {
        let global = GlobalQueue::new();
        global.push_back(task("from-global"));
        let mut p = Processor::new(256);
        let popped = p.pop(&global, 16, 16);
        assert_eq!(popped.unwrap().name(), "from-global");
    }

    #[test]
    fn debug_running_names_reflects_fifo_order() {
        let global = GlobalQueue::new();
        let mut p = Processor::new(256);
        p.push(&global, 1, 16, task("a"));
        p.push(&global, 1, 16, task("b"));
        p.push(&global, 1, 16, task("c"));
        assert_eq!(p.debug_running_names(), vec!["a", "b", "c"]);
        p.pop(&global, 1, 16);
        assert_eq!(p.debug_running_names(), vec!["b", "c"]);
    }
}
