// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Tasks: the `G` in the G-M-P model.
//!
//! A [`Task`] pairs a name and a lifecycle status with a stackful [`fiber::Fiber`] that
//! executes the task's body. The fiber's `Yield` type is [`Reason`]: three ways a task can
//! hand control back to the scheduler without having finished (`co_trap_id` in the original
//! C runtime, minus `CO_SCHEDULE` and `CO_EXIT` — scheduling is not a suspend reason, and
//! exit is represented by the fiber simply returning rather than yielding).
//!
//! Every dispatch happens on whatever worker OS thread is currently running the scheduler
//! loop, which may differ resume to resume. Two pieces of thread-local-ish state make that
//! transparent to a task's own code:
//!
//! - [`current`] / [`set_current`]: a `thread_local!` the scheduler updates immediately
//!   before every `resume`, so free functions like `Runtime::yield_now` can find "the task
//!   running on this OS thread right now" regardless of which worker that is.
//! - [`Task::record_suspend`]: each task caches a raw pointer to its own [`fiber::Suspend`]
//!   the first time it is dispatched. The pointer stays valid for the task's entire lifetime
//!   (the `Suspend` lives at a fixed location on the task's own stack, which never moves,
//!   even though the OS thread resuming it does), so after the first dispatch a task can
//!   suspend itself without needing a fresh reference from the caller.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use fiber::stack::DefaultFiberStack;
use fiber::{Fiber, FiberResult, Suspend};
use tracing::Span;

use crate::error::fail;

/// Why a task suspended without finishing.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum Reason {
    /// Cooperative yield: the task wants to run again, just not right now.
    Yield,
    /// Blocked on another task's completion (`Runtime::wait`).
    Wait,
    /// Blocked on a semaphore with no permits available (`Runtime::sem_wait`).
    SemWait,
}

type TaskFiber = Fiber<(), Reason, (), (), DefaultFiberStack>;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum TaskState {
    New,
    Running,
    Waiting,
    Dead,
}

/// `status` and `waiters` are guarded by one lock, not two — exactly as the original's single
/// `status_mutex` guards both `co->status` and `co->waiters`. Splitting them would let a
/// waiter register itself in the gap between another thread checking "is this task dead" and
/// that thread draining the waiters list, reintroducing the race the single lock prevents.
pub(crate) struct TaskInner {
    pub(crate) status: TaskState,
    /// Other tasks (or Main) blocked in `Runtime::wait` on this task's completion, FIFO.
    pub(crate) waiters: Vec<TaskHandle>,
}

/// A single lightweight task (`G`).
pub(crate) struct Task {
    id: u64,
    name: String,
    inner: Mutex<TaskInner>,
    fiber: Mutex<Option<TaskFiber>>,
    suspend_ptr: Cell<*const Suspend<(), Reason>>,
    span: Span,
}

// SAFETY: a `Task`'s fiber is only ever touched by the single worker thread that currently
// holds it for dispatch, a property the scheduler enforces through `status`: a task is handed
// to at most one worker at a time, and ownership transfers only while `status` is locked. The
// raw `Suspend` pointer is likewise only read or written by whichever thread is dispatching
// the task at that moment. No two threads ever observe a `Task`'s interior concurrently.
unsafe impl Send for Task {}
// SAFETY: see the `Send` impl above; the same single-dispatcher protocol makes shared
// references safe to hand across threads too (only `Arc`-refcount bookkeeping and the
// `Mutex`/`Cell` accesses themselves are ever concurrent, and those are independently sound).
unsafe impl Sync for Task {}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.inner.lock().unwrap_or_else(|e| e.into_inner()).status)
            .finish_non_exhaustive()
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl Task {
    pub(crate) fn new(
        name: impl Into<String>,
        stack_size: usize,
        func: impl FnOnce() + 'static,
    ) -> std::io::Result<TaskHandle> {
        let name = name.into();
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let span = tracing::trace_span!("task", task.name = %name, task.id = id);
        let stack = DefaultFiberStack::new(stack_size)?;

        let arc = Arc::new_cyclic(|weak: &Weak<Task>| {
            let weak_for_body = weak.clone();
            let fiber = Fiber::with_stack(stack, move |(), suspend, _local: &()| {
                // The task is guaranteed to still be alive here: the scheduler holds a strong
                // `TaskHandle` for the entire time a fiber can be dispatched.
                let task = weak_for_body
                    .upgrade()
                    .unwrap_or_else(|| fail("task dispatched after being dropped"));
                task.record_suspend(suspend);
                func();
            });

            Task {
                id,
                name,
                inner: Mutex::new(TaskInner {
                    status: TaskState::New,
                    waiters: Vec::new(),
                }),
                fiber: Mutex::new(Some(fiber)),
                suspend_ptr: Cell::new(ptr::null()),
                span,
            }
        });

        Ok(TaskHandle(arc))
    }

    /// Build a task with no executable body, for queue and list bookkeeping tests that only
    /// need identity and a name, never a real dispatch.
    #[cfg(test)]
    pub(crate) fn new_for_test(name: &str) -> TaskHandle {
        Task::new(name, fiber::stack::MIN_STACK_SIZE, || {})
            .expect("allocating a minimal test stack should never fail")
    }

    /// Build a sentinel task identifying the Main coroutine. Main is never dispatched through
    /// the scheduler trampoline (it blocks on [`crate::sync::MainPark`] instead), so unlike a
    /// real `G` it owns no fiber and no stack — it exists purely so `wait`/`sem_wait`/`sem_post`
    /// can register and identify it the same way they do any other waiter.
    pub(crate) fn new_sentinel(name: impl Into<String>) -> TaskHandle {
        let name = name.into();
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let span = tracing::trace_span!("task", task.name = %name, task.id = id);
        let arc = Arc::new(Task {
            id,
            name,
            inner: Mutex::new(TaskInner {
                status: TaskState::Running,
                waiters: Vec::new(),
            }),
            fiber: Mutex::new(None),
            suspend_ptr: Cell::new(ptr::null()),
            span,
        });
        TaskHandle(arc)
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn span(&self) -> &Span {
        &self.span
    }

    fn record_suspend(&self, suspend: &Suspend<(), Reason>) {
        self.suspend_ptr.set(ptr::from_ref(suspend));
    }

    /// Suspend the calling task with the given reason, returning control to whichever worker
    /// most recently called `resume` on it. Must only be called from within the task's own
    /// fiber body (i.e. via [`current`]), after it has been dispatched at least once.
    pub(crate) fn suspend(&self, reason: Reason) {
        let ptr = self.suspend_ptr.get();
        if ptr.is_null() {
            fail("task attempted to suspend before its first dispatch");
        }
        // SAFETY: `ptr` was captured from a live `&Suspend` inside this task's own fiber body
        // and the fiber (and therefore the referent) stays alive for as long as the task does;
        // we are on that same fiber's stack right now, since only the running task can reach
        // this code path.
        unsafe { &*ptr }.suspend(reason);
    }

    /// Dispatch this task on the calling (worker) thread: runs it if new, resumes it if it
    /// was previously suspended. Panics if the task's status is neither.
    pub(crate) fn dispatch(&self) -> FiberResult<Reason, ()> {
        let status = self.status();
        let mut slot = self.fiber.lock().unwrap_or_else(|e| e.into_inner());
        let fiber = slot
            .as_mut()
            .unwrap_or_else(|| fail("dispatched a task with no fiber (already exited)"));
        match status {
            TaskState::New | TaskState::Running => fiber.resume(()),
            TaskState::Waiting => fail("dispatched a task that is still marked WAITING"),
            TaskState::Dead => fail("dispatched a task that is already DEAD"),
        }
    }

    /// Drop the completed fiber and its stack, mirroring `free(co->stack)` in the original.
    pub(crate) fn release_fiber(&self) {
        *self.fiber.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Lock the combined status/waiters guard (`co->status_mutex` in the original).
    pub(crate) fn lock(&self) -> std::sync::MutexGuard<'_, TaskInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn status(&self) -> TaskState {
        self.lock().status
    }

    pub(crate) fn set_status(&self, status: TaskState) {
        self.lock().status = status;
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.status() == TaskState::Dead
    }

    /// Take every waiter off this task's list, for the EXIT transition's drain.
    pub(crate) fn take_waiters(&self) -> Vec<TaskHandle> {
        std::mem::take(&mut self.lock().waiters)
    }

    /// Attempt to register `waiter` as blocked on this task's completion.
    ///
    /// Returns `false` without touching `waiter` if this task is already `Dead` — the caller
    /// must treat that as "already complete" rather than suspend. Otherwise appends `waiter`
    /// to this task's waiter list and marks `waiter` itself `Waiting`, matching the lock order
    /// from spec §5: this task's status mutex, then the waiter's.
    pub(crate) fn register_waiter(&self, waiter: &TaskHandle) -> bool {
        let mut target = self.lock();
        if target.status == TaskState::Dead {
            return false;
        }
        target.waiters.push(waiter.clone());
        // Mark the waiter `Waiting` while still holding the target's status mutex, not after
        // releasing it: otherwise a concurrent `exit()` on the target could take this lock,
        // drain `waiters` (finding the one just pushed), and set it back to `Running` before
        // this call gets around to marking it `Waiting` — clobbering that wakeup and leaving
        // the waiter suspended while already queued to run.
        waiter.set_status(TaskState::Waiting);
        drop(target);
        true
    }
}

/// A handle to a spawned task, returned by [`crate::Runtime::start`] and passed to
/// [`crate::Runtime::wait`].
#[derive(Clone)]
pub struct TaskHandle(pub(crate) Arc<Task>);

impl TaskHandle {
    /// The name the task was started with.
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// The task's runtime-assigned identifier, unique for the lifetime of the process.
    pub fn id(&self) -> u64 {
        self.0.id()
    }

    pub(crate) fn ptr_eq(&self, other: &TaskHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn status(&self) -> TaskState {
        self.0.status()
    }

    pub(crate) fn set_status(&self, status: TaskState) {
        self.0.set_status(status);
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.0.is_dead()
    }

    pub(crate) fn suspend(&self, reason: Reason) {
        self.0.suspend(reason);
    }

    pub(crate) fn dispatch(&self) -> FiberResult<Reason, ()> {
        self.0.dispatch()
    }

    pub(crate) fn release_fiber(&self) {
        self.0.release_fiber();
    }

    pub(crate) fn take_waiters(&self) -> Vec<TaskHandle> {
        self.0.take_waiters()
    }

    pub(crate) fn register_waiter(&self, waiter: &TaskHandle) -> bool {
        self.0.register_waiter(waiter)
    }

    pub(crate) fn span(&self) -> &Span {
        self.0.span()
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for TaskHandle {}

thread_local! {
    static CURRENT: RefCell<Option<TaskHandle>> = const { RefCell::new(None) };
}

/// Record which task the calling OS thread is about to dispatch. Called by the scheduler
/// loop immediately before every `Task::dispatch`.
pub(crate) fn set_current(task: Option<TaskHandle>) {
    CURRENT.with(|cell| *cell.borrow_mut() = task);
}

/// The task currently running on this OS thread, if any.
///
/// `None` when called from outside any task body — e.g. from Main before it has suspended,
/// or from code running on a worker's `g0` scheduler stack itself.
pub(crate) fn current() -> Option<TaskHandle> {
    CURRENT.with(|cell| cell.borrow().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_starts_in_new_state() {
        let handle = Task::new_for_test("probe");
        assert_eq!(handle.0.status(), TaskState::New);
    }

    #[test]
    fn distinct_tasks_have_distinct_ids() {
        let a = Task::new_for_test("a");
        let b = Task::new_for_test("b");
        assert_ne!(a.id(), b.id());
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
    }

    #[test]
    fn current_task_defaults_to_none() {
        assert!(current().is_none());
        let handle = Task::new_for_test("probe");
        set_current(Some(handle.clone()));
        assert!(current().unwrap().ptr_eq(&handle));
        set_current(None);
        assert!(current().is_none());
    }
}
