// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The per-worker scheduler loop (spec §4.6): a small state machine keyed on the
//! [`crate::task::Reason`] a task's fiber hands back when it suspends instead of running to
//! completion.
//!
//! Workers `1..workers()` each run one instance of [`run_worker`], looping
//! pop-dispatch-handle until the runtime's shutdown flag is observed. Worker 0 is the
//! embedder's own OS thread — Main — and never runs this loop (spec §4.10); `Runtime::start`
//! and `Runtime::sem_post` fall back to the global queue whenever there is no [`Processor`] for
//! the calling thread, which [`push_from_here`] below decides by checking [`CURRENT_PROCESSOR`].
//!
//! Unlike the original C runtime, `WAIT` and `SEM_WAIT` need no handling here at all: both
//! `Runtime::wait`'s worker path and `Semaphore::try_acquire_or_park` register the suspending
//! task as a waiter and flip its status to `Waiting` *before* calling `suspend`, so by the time
//! the long-jump returns control to this loop there is nothing left to do but schedule the next
//! task. This also resolves the "WAIT handler returns early when the target is already dead"
//! bug spec §9 calls out: that check now happens synchronously, before ever suspending, so a
//! dead target simply never causes a suspend in the first place.

use std::cell::Cell;
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use fiber::FiberResult;

use crate::processor::Processor;
use crate::runtime::Shared;
use crate::task::{self, Reason, TaskHandle, TaskState};

/// Everything a worker OS thread needs to run its scheduler loop.
pub(crate) struct WorkerContext {
    pub(crate) id: usize,
    pub(crate) shared: Arc<Shared>,
}

thread_local! {
    /// Raw pointer to the `Processor` owned by whichever worker loop is running on this OS
    /// thread, or null on Main's thread (which never calls [`run_worker`]). Set for the
    /// lifetime of the loop below; only that same thread ever dereferences it, mirroring the
    /// single-dispatcher discipline `task.rs` documents for `Task::suspend_ptr`.
    static CURRENT_PROCESSOR: Cell<*mut Processor> = const { Cell::new(ptr::null_mut()) };
}

/// Push `task` onto the calling thread's local queue if it is a worker currently running
/// [`run_worker`], or onto the global queue otherwise (i.e. called from Main) — the fallback
/// spec §4.3 ("if called from worker 0 ... published to the global queue") and §4.9's
/// `sem_post` both rely on. Used to re-enqueue a task that already exists (a semaphore wakeup);
/// for a brand-new task, use [`publish_new_task`] instead so it is tracked exactly once.
pub(crate) fn push_from_here(shared: &Shared, task: TaskHandle) {
    with_current_processor(shared, task, None);
}

/// Like [`push_from_here`], but also records `task` in the calling processor's `all`
/// bookkeeping list — the one-time "this task now exists" registration `co_start` performs in
/// the original (spec §4.3), as opposed to every later re-enqueue between the local and global
/// queues. Called exactly once per task, by [`crate::runtime::start_on`].
pub(crate) fn publish_new_task(shared: &Shared, task: TaskHandle) {
    with_current_processor(shared, task.clone(), Some(task));
}

fn with_current_processor(shared: &Shared, task: TaskHandle, track_as_new: Option<TaskHandle>) {
    let live = shared.live_tasks.load(Ordering::Acquire);
    let workers = shared.config.workers();
    let ptr = CURRENT_PROCESSOR.with(Cell::get);
    if ptr.is_null() {
        shared.global.push_back(task);
    } else {
        // SAFETY: non-null only while the owning worker thread is inside `run_worker`, which
        // holds the pointee behind a local `&mut Processor` for the whole loop and clears this
        // cell before the local goes out of scope. No other thread ever reads or writes it.
        let processor = unsafe { &mut *ptr };
        if let Some(new_task) = track_as_new {
            processor.track_new(new_task);
        }
        processor.push(&shared.global, live, workers, task);
    }
}

/// Run one worker's scheduler loop until shutdown. Blocks the calling OS thread for its
/// entire lifetime; [`crate::worker::Worker::spawn`] runs this as the thread's entry point.
pub(crate) fn run_worker(ctx: WorkerContext) {
    let span =
        tracing::trace_span!("worker", worker.id = ctx.id, worker.name = "co_run_coroutine");
    let _enter = span.enter();
    tracing::trace!("worker started");

    let mut processor = Processor::new(ctx.shared.config.local_queue_capacity());
    CURRENT_PROCESSOR.with(|cell| cell.set(&mut processor));
    crate::runtime::set_current_shared(Some(Arc::clone(&ctx.shared)));

    loop {
        // Shutdown is only observed at this SCHEDULE boundary, matching spec §5.
        if ctx.shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        let live = ctx.shared.live_tasks.load(Ordering::Acquire);
        let workers = ctx.shared.config.workers();
        match processor.pop(&ctx.shared.global, live, workers) {
            Some(task) => dispatch(&ctx, &mut processor, task),
            // Nothing ready: spin back per spec §4.6. A bare `yield_now` keeps an idle worker
            // from pegging a core while other workers (or Main) still have work to hand it.
            None => std::thread::yield_now(),
        }
    }

    CURRENT_PROCESSOR.with(|cell| cell.set(ptr::null_mut()));
    crate::runtime::set_current_shared(None);
    tracing::trace!("worker stopped");
}

/// Dispatch one task and apply the scheduler transition for whatever reason it suspends with,
/// or run the EXIT transition if it returns. Matches spec §4.6.
fn dispatch(ctx: &WorkerContext, processor: &mut Processor, handle: TaskHandle) {
    // Only the worker currently dispatching a task may move it NEW -> RUNNING (spec §3's
    // invariant); WAITING and DEAD are both bugs here and `Task::dispatch` panics on them.
    if handle.status() == TaskState::New {
        handle.set_status(TaskState::Running);
    }

    task::set_current(Some(handle.clone()));
    let span = handle.span().clone();
    let result = span.in_scope(|| handle.dispatch());
    task::set_current(None);

    match result {
        FiberResult::Yield(reason) => match reason {
            Reason::Yield => {
                let live = ctx.shared.live_tasks.load(Ordering::Acquire);
                let workers = ctx.shared.config.workers();
                processor.push(&ctx.shared.global, live, workers, handle);
            }
            Reason::Wait | Reason::SemWait => {
                // Already parked by the caller before it suspended; see the module docs.
            }
        },
        FiberResult::Return(()) => exit(ctx, processor, handle),
    }
}

/// The EXIT transition (spec §4.6): release the task's stack, mark it DEAD, and wake every
/// waiter FIFO.
fn exit(ctx: &WorkerContext, processor: &mut Processor, handle: TaskHandle) {
    handle.release_fiber();
    processor.track_dead(handle.clone());
    handle.set_status(TaskState::Dead);
    ctx.shared.live_tasks.fetch_sub(1, Ordering::Release);
    tracing::trace!(task.name = handle.name(), task.id = handle.id(), "task exited");

    for waiter in handle.take_waiters() {
        waiter.set_status(TaskState::Running);
        if waiter.ptr_eq(&ctx.shared.main_task) {
            ctx.shared.main_park.post();
        } else {
            // Always the global queue here, never this processor's local one: the waiter may
            // have been dispatched by (and migrated away from) any worker, so there is no
            // "this processor" to prefer — matches spec §4.6's EXIT handler.
            ctx.shared.global.push_back(waiter);
        }
    }
}
