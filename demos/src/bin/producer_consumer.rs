// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Classic bounded-buffer producer/consumer, synchronized with three coroutine semaphores:
//! `sem_empty`/`sem_full` count free/occupied slots, `sem_mutex` guards the buffer itself. The
//! buffer is still backed by a real `Mutex` since worker threads genuinely run in parallel —
//! `sem_mutex` already serializes every access to it, so that inner lock is never contended.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use coro_rt::{Runtime, RuntimeConfig, SemaphoreHandle};

const BUF_SIZE: u32 = 10;
const N_PRODUCE: usize = 100;
const N_PRODUCER: usize = 400;
const N_CONSUMER: usize = 400;

fn main() {
    demos::init_tracing();

    let rt = Runtime::init(RuntimeConfig::default());
    let buffer = Arc::new(Mutex::new(VecDeque::<i64>::new()));
    let sem_empty = rt.sem_create(BUF_SIZE).unwrap();
    let sem_full = rt.sem_create(0).unwrap();
    let sem_mutex = rt.sem_create(1).unwrap();

    let mut handles = Vec::with_capacity(N_PRODUCER + N_CONSUMER);

    for id in 0..N_PRODUCER {
        let buffer = Arc::clone(&buffer);
        let sem_empty = sem_empty.clone();
        let sem_full = sem_full.clone();
        let sem_mutex = sem_mutex.clone();
        handles.push(
            rt.start(format!("producer-{id}"), move || {
                produce(id, &buffer, &sem_empty, &sem_full, &sem_mutex);
            })
            .unwrap(),
        );
    }

    let consumes_per_task = N_PRODUCE * N_PRODUCER / N_CONSUMER;
    for id in 0..N_CONSUMER {
        let buffer = Arc::clone(&buffer);
        let sem_empty = sem_empty.clone();
        let sem_full = sem_full.clone();
        let sem_mutex = sem_mutex.clone();
        handles.push(
            rt.start(format!("consumer-{id}"), move || {
                consume(consumes_per_task, &buffer, &sem_empty, &sem_full, &sem_mutex);
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

    println!("Finished. Final buffer count = {}", buffer.lock().unwrap().len());
}

fn produce(
    id: usize,
    buffer: &Mutex<VecDeque<i64>>,
    sem_empty: &SemaphoreHandle,
    sem_full: &SemaphoreHandle,
    sem_mutex: &SemaphoreHandle,
) {
    for i in 0..N_PRODUCE {
        coro_rt::sem_wait(sem_empty);
        coro_rt::sem_wait(sem_mutex);

        let val = (id * 1000 + i) as i64;
        buffer.lock().unwrap().push_back(val);

        coro_rt::sem_post(sem_mutex);
        coro_rt::sem_post(sem_full);
        coro_rt::yield_now();
    }
}

fn consume(
    iterations: usize,
    buffer: &Mutex<VecDeque<i64>>,
    sem_empty: &SemaphoreHandle,
    sem_full: &SemaphoreHandle,
    sem_mutex: &SemaphoreHandle,
) {
    for _ in 0..iterations {
        coro_rt::sem_wait(sem_full);
        coro_rt::sem_wait(sem_mutex);

        let _val = buffer.lock().unwrap().pop_front();

        coro_rt::sem_post(sem_mutex);
        coro_rt::sem_post(sem_empty);
        coro_rt::yield_now();
    }
}
