// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Runtime bootstrap, teardown, and the embedding API (spec §4.10, §6).
//!
//! [`Runtime::init`] is the only constructor: it spins up `config.workers() - 1` worker OS
//! threads (worker 0 is the calling thread itself, which becomes Main rather than running a
//! scheduler loop — see `scheduler`'s module docs) and returns a handle to the shared state
//! every one of them, plus Main, reaches into. Dropping the `Runtime` is teardown: it raises the
//! shutdown flag and then lets `Vec<Worker>`'s own `Drop` join every thread, matching spec
//! §4.10's "set the shutdown atomic flag; join worker threads".
//!
//! The original C API (`co_start`, `co_yield`, `co_wait`, `co_sem_wait`, `co_sem_post`, ...) is a
//! set of free functions operating on a single implicit scheduler, callable from anywhere —
//! including from inside a task's own body, which has no way to hold a reference back to
//! whatever called `co_start` in the first place. This module's free functions (
//! [`start`], [`yield_now`], [`wait`], [`sem_create`], [`sem_wait`], [`sem_post`],
//! [`sem_destroy`]) give Rust code spawned by [`Runtime::start`] that same ambient access: each
//! thread a task can run on — every worker, plus Main's own thread from the moment it calls
//! [`Runtime::init`] — carries a `thread_local!` reference to the [`Shared`] state it belongs
//! to, the same way `scheduler::run_worker` carries a thread-local pointer to its own
//! [`crate::processor::Processor`]. [`Runtime`]'s inherent methods are thin wrappers around the
//! exact same logic, for callers (typically Main) that already hold a `&Runtime`.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::error::{fail, RuntimeError};
use crate::queue::global::GlobalQueue;
use crate::scheduler::{self, WorkerContext};
use crate::semaphore::{Semaphore, SemaphoreHandle};
use crate::sync::MainPark;
use crate::task::{self, Task, TaskHandle, TaskState};
use crate::worker::Worker;

/// State every worker thread and Main share: the overflow queue, the live-task counter, the
/// shutdown flag, the configuration they were all started with, and the two pieces of state
/// that make Main's blocking calls work without participating in the scheduler trampoline.
pub(crate) struct Shared {
    pub(crate) global: GlobalQueue,
    pub(crate) live_tasks: AtomicUsize,
    pub(crate) shutdown: AtomicBool,
    pub(crate) config: RuntimeConfig,
    pub(crate) main_park: MainPark,
    /// Sentinel identifying the Main coroutine as a waiter, so `wait`/`sem_wait`/`sem_post` can
    /// treat it like any other task without it ever being dispatched by a worker.
    pub(crate) main_task: TaskHandle,
}

thread_local! {
    /// The runtime this OS thread currently belongs to, if any: set on Main's thread by
    /// [`Runtime::init`] and on each worker thread by `scheduler::run_worker`, cleared when
    /// either tears down. Lets the free functions below resolve "the enclosing runtime" the
    /// same way [`task::current`] resolves "the enclosing task".
    static CURRENT_SHARED: RefCell<Option<Arc<Shared>>> = const { RefCell::new(None) };
}

pub(crate) fn set_current_shared(shared: Option<Arc<Shared>>) {
    CURRENT_SHARED.with(|cell| *cell.borrow_mut() = shared);
}

fn with_current<R>(f: impl FnOnce(&Arc<Shared>) -> R) -> R {
    CURRENT_SHARED.with(|cell| {
        let guard = cell.borrow();
        let shared = guard
            .as_ref()
            .unwrap_or_else(|| fail("called from a thread with no running coro-rt runtime"));
        f(shared)
    })
}

/// A running coroutine runtime: the G-M-P scheduler core described in spec §2-§4, embeddable
/// in ordinary Rust programs via [`Runtime::start`], [`Runtime::yield_now`], [`Runtime::wait`]
/// and the `sem_*` family.
///
/// ```no_run
/// let rt = coro_rt::Runtime::init(coro_rt::RuntimeConfig::default());
/// let h = rt.start("greeter", || println!("hello from a coroutine")).unwrap();
/// rt.wait(h);
/// ```
pub struct Runtime {
    shared: Arc<Shared>,
    // Held only for their `Drop` impls, which join each worker thread at teardown.
    workers: Vec<Worker>,
}

impl Runtime {
    /// Initialize the runtime. Must be called before any other entry point.
    ///
    /// # Panics
    ///
    /// Panics if a worker OS thread cannot be spawned — an unrecoverable bootstrap failure, in
    /// the same category as the allocation failures spec §7 treats as fatal.
    pub fn init(config: RuntimeConfig) -> Runtime {
        let main_task = Task::new_sentinel("co_main");
        let shared = Arc::new(Shared {
            global: GlobalQueue::new(),
            live_tasks: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            config,
            main_park: MainPark::new(),
            main_task,
        });

        // Worker 0 is the calling thread (Main); only workers 1..workers() get a real OS
        // thread and scheduler loop (spec §4.10).
        let workers = (1..config.workers())
            .map(|id| {
                Worker::spawn(id, WorkerContext { id, shared: Arc::clone(&shared) })
                    .unwrap_or_else(|e| fail(format!("failed to spawn worker {id}: {e}")))
            })
            .collect();

        set_current_shared(Some(Arc::clone(&shared)));
        tracing::info!(workers = config.workers(), "runtime initialized");
        Runtime { shared, workers }
    }

    /// The configuration this runtime was initialized with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    /// Spawn a new task (`G`). It is not executed until some worker's scheduler loop dispatches
    /// it; if `start` is called from Main the task is published to the global queue, otherwise
    /// it lands on the calling task's worker's local queue (spec §4.3).
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or the task's stack cannot be allocated (spec §4.3, §7).
    pub fn start(
        &self,
        name: impl Into<String>,
        func: impl FnOnce() + Send + 'static,
    ) -> Result<TaskHandle, RuntimeError> {
        start_on(&self.shared, name, func)
    }

    /// Cooperative reschedule point (spec §4.4). A no-op when called from Main, which never
    /// participates in the scheduler trampoline.
    pub fn yield_now(&self) {
        yield_now_impl()
    }

    /// Block the caller until `handle`'s task completes (spec §4.5). Returns immediately if the
    /// target is already dead.
    ///
    /// There is no `NULL`/"main handle" misuse case to guard against here, unlike the original
    /// C API: [`TaskHandle`] is never optional, and the sentinel identifying Main is private to
    /// this crate, so a caller can never construct or obtain one to pass back in. Multiple
    /// waiters on the same task are also safe to register (each is simply woken at EXIT) — the
    /// original's single-joiner restriction existed only because it freed the joined record
    /// inline in `wait`, which this crate's `Arc`-backed `TaskHandle` has no equivalent of: the
    /// record is freed exactly when its last handle is dropped, including by however many
    /// joiners are still holding a clone.
    pub fn wait(&self, handle: TaskHandle) {
        wait_on(&self.shared, handle)
    }

    /// Create a counting semaphore with `initial` permits available (spec §4.9).
    pub fn sem_create(&self, initial: u32) -> Result<SemaphoreHandle, RuntimeError> {
        sem_create_on(&self.shared, initial)
    }

    /// Acquire a permit, blocking the caller (task or Main) until one is available.
    pub fn sem_wait(&self, sem: &SemaphoreHandle) {
        sem_wait_on(&self.shared, sem)
    }

    /// Release a permit, waking the longest-waiting blocked task if any (FIFO, spec §4.9).
    pub fn sem_post(&self, sem: &SemaphoreHandle) {
        sem_post_on(&self.shared, sem)
    }

    /// Destroy a semaphore (spec §4.9, §6). `SemaphoreHandle` is `Arc`-backed, so the only
    /// "leak" the original warns about — forgetting to destroy one — cannot happen here; this
    /// exists purely so callers ported from the embedding API have a direct equivalent to call.
    pub fn sem_destroy(&self, sem: SemaphoreHandle) {
        drop(sem);
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        tracing::info!("runtime shutting down");
        self.shared.shutdown.store(true, Ordering::Release);
        // `self.workers` drops right after this function returns; each `Worker`'s own `Drop`
        // joins its thread, which only returns once that thread's scheduler loop observes the
        // flag we just set.
        set_current_shared(None);
    }
}

fn start_on(
    shared: &Arc<Shared>,
    name: impl Into<String>,
    func: impl FnOnce() + Send + 'static,
) -> Result<TaskHandle, RuntimeError> {
    if shared.shutdown.load(Ordering::Acquire) {
        return Err(RuntimeError::AlreadyShutdown);
    }
    let name = name.into();
    if name.is_empty() {
        fail("task name must not be empty");
    }
    let handle = Task::new(name, shared.config.task_stack_size(), func)
        .unwrap_or_else(|e| fail(format!("failed to allocate task stack: {e}")));
    shared.live_tasks.fetch_add(1, Ordering::Release);
    scheduler::publish_new_task(shared, handle.clone());
    Ok(handle)
}

fn yield_now_impl() {
    if let Some(current) = task::current() {
        current.suspend(task::Reason::Yield);
    }
}

fn wait_on(shared: &Arc<Shared>, handle: TaskHandle) {
    match task::current() {
        Some(current) => {
            if handle.register_waiter(&current) {
                current.suspend(task::Reason::Wait);
            }
        }
        None => {
            if handle.register_waiter(&shared.main_task) {
                shared.main_park.wait();
            }
        }
    }
}

fn sem_create_on(shared: &Arc<Shared>, initial: u32) -> Result<SemaphoreHandle, RuntimeError> {
    if shared.shutdown.load(Ordering::Acquire) {
        return Err(RuntimeError::AlreadyShutdown);
    }
    Ok(SemaphoreHandle(Arc::new(Semaphore::new(initial))))
}

fn sem_wait_on(shared: &Arc<Shared>, sem: &SemaphoreHandle) {
    match task::current() {
        Some(current) => {
            if !sem.0.try_acquire_or_park(&current) {
                current.suspend(task::Reason::SemWait);
            }
        }
        None => {
            if !sem.0.try_acquire_or_park(&shared.main_task) {
                shared.main_park.wait();
            }
        }
    }
}

fn sem_post_on(shared: &Arc<Shared>, sem: &SemaphoreHandle) {
    if let Some(waiter) = sem.0.post() {
        waiter.set_status(TaskState::Running);
        if waiter.ptr_eq(&shared.main_task) {
            shared.main_park.post();
        } else {
            scheduler::push_from_here(shared, waiter);
        }
    }
}

/// Spawn a new task from within another task's body (spec §4.3). Equivalent to
/// [`Runtime::start`], resolved against whichever runtime owns the OS thread this is called
/// from.
///
/// # Panics
///
/// Panics if called from a thread with no running runtime — i.e. not Main and not a worker.
pub fn start(
    name: impl Into<String>,
    func: impl FnOnce() + Send + 'static,
) -> Result<TaskHandle, RuntimeError> {
    with_current(|shared| start_on(shared, name, func))
}

/// Cooperative reschedule point, callable from within a task's own body (spec §4.4).
pub fn yield_now() {
    yield_now_impl()
}

/// Block the calling task until `handle`'s task completes, callable from within a task's own
/// body (spec §4.5).
pub fn wait(handle: TaskHandle) {
    with_current(|shared| wait_on(shared, handle))
}

/// Create a counting semaphore, callable from within a task's own body (spec §4.9).
pub fn sem_create(initial: u32) -> Result<SemaphoreHandle, RuntimeError> {
    with_current(|shared| sem_create_on(shared, initial))
}

/// Acquire a permit, callable from within a task's own body (spec §4.9).
pub fn sem_wait(sem: &SemaphoreHandle) {
    with_current(|shared| sem_wait_on(shared, sem))
}

/// Release a permit, callable from within a task's own body (spec §4.9).
pub fn sem_post(sem: &SemaphoreHandle) {
    with_current(|shared| sem_post_on(shared, sem))
}

/// Destroy a semaphore, callable from within a task's own body (spec §4.9, §6).
pub fn sem_destroy(sem: SemaphoreHandle) {
    drop(sem);
}
