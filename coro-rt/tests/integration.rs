// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The concrete scenarios from spec §8, asserted directly against [`coro_rt::Runtime`] rather
//! than by running the `demos` binaries and scraping their stdout.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use coro_rt::{Runtime, RuntimeConfig};

/// Scenario 1: N=10000 tasks, each summing `i*i` over a disjoint 10-integer block, yielding
/// every 10 iterations. The collected total must equal the closed form
/// `sum_{i=1..100000} i^2`.
#[test]
fn massive_sum_matches_closed_form() {
    const N: usize = 10_000;
    const RANGE: i64 = 10;

    let rt = Runtime::init(RuntimeConfig::default());
    let results = Arc::new((0..N).map(|_| AtomicI64::new(0)).collect::<Vec<_>>());

    let handles = (0..N)
        .map(|i| {
            let results = Arc::clone(&results);
            let start = i as i64 * RANGE + 1;
            let end = (i as i64 + 1) * RANGE;
            rt.start(format!("sum-{i}"), move || {
                let mut sum: i64 = 0;
                for k in start..=end {
                    sum += k * k;
                    if k % 10 == 0 {
                        coro_rt::yield_now();
                    }
                }
                results[i].store(sum, Ordering::Relaxed);
            })
            .unwrap()
        })
        .collect::<Vec<_>>();

    for h in handles {
        rt.wait(h);
    }

    let total: i64 = results.iter().map(|r| r.load(Ordering::Relaxed)).sum();
    assert_eq!(total, 333_338_333_350_000);
}

/// Scenario 2: a 512x512 matrix partitioned across 16 tasks; after joining all of them, every
/// transposed entry must match its source.
#[test]
fn matrix_transpose_round_trips() {
    const SIZE: usize = 512;
    const TASKS: usize = 16;

    let a: Arc<Vec<i32>> = Arc::new((0..SIZE * SIZE).map(|v| i32::try_from(v).unwrap()).collect());
    let b: Arc<Vec<AtomicI32>> = Arc::new((0..SIZE * SIZE).map(|_| AtomicI32::new(0)).collect());

    let rt = Runtime::init(RuntimeConfig::default());
    let rows_per_task = SIZE / TASKS;

    let handles = (0..TASKS)
        .map(|t| {
            let a = Arc::clone(&a);
            let b = Arc::clone(&b);
            let row_start = t * rows_per_task;
            let row_end = row_start + rows_per_task;
            rt.start(format!("transpose-{t}"), move || {
                for i in row_start..row_end {
                    for j in 0..SIZE {
                        b[j * SIZE + i].store(a[i * SIZE + j], Ordering::Relaxed);
                        if (i * SIZE + j) % 50_000 == 0 {
                            coro_rt::yield_now();
                        }
                    }
                }
            })
            .unwrap()
        })
        .collect::<Vec<_>>();

    for h in handles {
        rt.wait(h);
    }

    for i in 0..SIZE {
        for j in 0..SIZE {
            assert_eq!(b[j * SIZE + i].load(Ordering::Relaxed), a[i * SIZE + j]);
        }
    }
}

/// Scenario 3: a bounded buffer of size 10 shared by 40 producers (10 items each) and 40
/// consumers, synchronized with the three-semaphore discipline; total produced must equal
/// total consumed and the buffer must be empty at the end. Scaled down from the spec's
/// 400x400 to keep the test fast; the synchronization discipline is scale-independent.
#[test]
fn producer_consumer_drains_exactly() {
    const BUF_SIZE: u32 = 10;
    const N_PRODUCE: usize = 10;
    const N_PRODUCER: usize = 40;
    const N_CONSUMER: usize = 40;

    let rt = Runtime::init(RuntimeConfig::default());
    let buffer = Arc::new(Mutex::new(VecDeque::<i64>::new()));
    let sem_empty = rt.sem_create(BUF_SIZE).unwrap();
    let sem_full = rt.sem_create(0).unwrap();
    let sem_mutex = rt.sem_create(1).unwrap();

    let mut handles = Vec::with_capacity(N_PRODUCER + N_CONSUMER);
    for id in 0..N_PRODUCER {
        let buffer = Arc::clone(&buffer);
        let (e, f, m) = (sem_empty.clone(), sem_full.clone(), sem_mutex.clone());
        handles.push(
            rt.start(format!("producer-{id}"), move || {
                for i in 0..N_PRODUCE {
                    coro_rt::sem_wait(&e);
                    coro_rt::sem_wait(&m);
                    buffer.lock().unwrap().push_back((id * 1000 + i) as i64);
                    coro_rt::sem_post(&m);
                    coro_rt::sem_post(&f);
                    coro_rt::yield_now();
                }
            })
            .unwrap(),
        );
    }

    let consumes_per_task = N_PRODUCE * N_PRODUCER / N_CONSUMER;
    let consumed_total = Arc::new(AtomicI64::new(0));
    for id in 0..N_CONSUMER {
        let buffer = Arc::clone(&buffer);
        let consumed_total = Arc::clone(&consumed_total);
        let (e, f, m) = (sem_empty.clone(), sem_full.clone(), sem_mutex.clone());
        handles.push(
            rt.start(format!("consumer-{id}"), move || {
                for _ in 0..consumes_per_task {
                    coro_rt::sem_wait(&f);
                    coro_rt::sem_wait(&m);
                    let popped = buffer.lock().unwrap().pop_front();
                    coro_rt::sem_post(&m);
                    coro_rt::sem_post(&e);
                    if popped.is_some() {
                        consumed_total.fetch_add(1, Ordering::Relaxed);
                    }
                    coro_rt::yield_now();
                }
            })
            .unwrap(),
        );
    }

    for h in handles {
        rt.wait(h);
    }

    rt.sem_destroy(sem_empty);
    rt.sem_destroy(sem_full);
    rt.sem_destroy(sem_mutex);

    assert_eq!(consumed_total.load(Ordering::Relaxed), (N_PRODUCE * N_PRODUCER) as i64);
    assert!(buffer.lock().unwrap().is_empty());
}

/// Scenario 4: two tasks each increment a shared counter 10 times under `sem_create(1)`; the
/// final counter must be 20 and no two increments may observe the same pre-increment value
/// (i.e. the semaphore actually excluded concurrent access).
#[test]
fn semaphore_enforces_mutual_exclusion() {
    let rt = Runtime::init(RuntimeConfig::default());
    let counter = Arc::new(Mutex::new(0i32));
    let observed = Arc::new(Mutex::new(Vec::<i32>::new()));
    let sem = rt.sem_create(1).unwrap();

    let handles = [1, 2]
        .into_iter()
        .map(|id| {
            let counter = Arc::clone(&counter);
            let observed = Arc::clone(&observed);
            let sem = sem.clone();
            rt.start(format!("counter-{id}"), move || {
                for _ in 0..10 {
                    coro_rt::sem_wait(&sem);
                    let value = {
                        let mut guard = counter.lock().unwrap();
                        let before = *guard;
                        *guard += 1;
                        before
                    };
                    observed.lock().unwrap().push(value);
                    coro_rt::sem_post(&sem);
                    coro_rt::yield_now();
                }
            })
            .unwrap()
        })
        .collect::<Vec<_>>();

    for h in handles {
        rt.wait(h);
    }
    rt.sem_destroy(sem);

    assert_eq!(*counter.lock().unwrap(), 20);
    let mut seen = observed.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..20).collect::<Vec<_>>(), "every pre-increment value must be distinct");
}

/// Scenario 5: 1000 tasks with strictly increasing workload all complete and are joinable.
#[test]
fn unbalanced_load_all_complete() {
    const N: usize = 1000;

    let rt = Runtime::init(RuntimeConfig::default());
    let finished = Arc::new(AtomicI64::new(0));

    let handles = (0..N)
        .map(|id| {
            let finished = Arc::clone(&finished);
            let workload = (id + 1) * 200;
            rt.start(format!("unbalanced-{id}"), move || {
                let mut dummy: i64 = 0;
                for i in 0..workload {
                    dummy += (i % 7) as i64;
                    if i % 50 == 0 {
                        coro_rt::yield_now();
                    }
                }
                std::hint::black_box(dummy);
                finished.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap()
        })
        .collect::<Vec<_>>();

    for h in handles {
        rt.wait(h);
    }

    assert_eq!(finished.load(Ordering::Relaxed), N as i64);
}

/// Scenario 6: calling `yield_now` from Main is a no-op that returns immediately.
#[test]
fn yield_from_main_is_a_no_op() {
    let rt = Runtime::init(RuntimeConfig::default());
    coro_rt::yield_now();
    rt.yield_now();
}

/// Multiple joiners on the same task are each woken once the target exits (see DESIGN.md's
/// Open Question resolution: unlike the original C API, `wait` does not free the target's
/// record, so concurrent joiners are safe).
#[test]
fn multiple_waiters_all_observe_completion() {
    let rt = Runtime::init(RuntimeConfig::default());
    let target = rt.start("target", || coro_rt::yield_now()).unwrap();

    let joined = Arc::new(AtomicI64::new(0));
    let handles = (0..4)
        .map(|_| {
            let target = target.clone();
            let joined = Arc::clone(&joined);
            rt.start("joiner", move || {
                coro_rt::wait(target);
                joined.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap()
        })
        .collect::<Vec<_>>();

    for h in handles {
        rt.wait(h);
    }
    assert_eq!(joined.load(Ordering::Relaxed), 4);
}

/// `wait` on a task that has already finished by the time Main gets around to joining it
/// returns immediately rather than blocking forever.
#[test]
fn wait_on_already_dead_task_returns_immediately() {
    let rt = Runtime::init(RuntimeConfig::default());
    let done = Arc::new(AtomicI64::new(0));
    let done_writer = Arc::clone(&done);
    let handle = rt
        .start("quick", move || done_writer.fetch_add(1, Ordering::Release))
        .unwrap();

    // Busy-wait on Main's own thread until the task has actually exited, so `wait` below
    // exercises the "already DEAD" fast path rather than the suspend/wake path.
    while done.load(Ordering::Acquire) == 0 {
        std::thread::yield_now();
    }
    rt.wait(handle);
}
