// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Two tasks incrementing a shared counter under a binary semaphore, ten times each. Prints
//! each observed value on the way in, then the final count (always 20, since the semaphore
//! serializes every increment).

use std::sync::{Arc, Mutex};

use coro_rt::{Runtime, RuntimeConfig};

fn main() {
    demos::init_tracing();

    let rt = Runtime::init(RuntimeConfig::default());
    let counter = Arc::new(Mutex::new(0i32));
    let sem = rt.sem_create(1).unwrap();

    let mut handles = Vec::with_capacity(2);
    for id in [1, 2] {
        let counter = Arc::clone(&counter);
        let sem = sem.clone();
        handles.push(
            rt.start(format!("counter-{id}"), move || {
                for _ in 0..10 {
                    coro_rt::sem_wait(&sem);
                    let value = {
                        let mut guard = counter.lock().unwrap();
                        let observed = *guard;
                        *guard += 1;
                        observed
                    };
                    println!("task {id}: counter = {value}");
                    coro_rt::sem_post(&sem);
                    coro_rt::yield_now();
                }
                println!("task {id} done");
            })
            .unwrap(),
        );
    }

    for h in handles {
        rt.wait(h);
    }

    rt.sem_destroy(sem);
    println!("final counter = {}", *counter.lock().unwrap());
}
