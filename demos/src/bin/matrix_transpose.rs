// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Transposes a 512x512 matrix with 16 tasks, each owning a disjoint band of rows, yielding
//! periodically. `B` is written through `AtomicI32` cells since the bands are disjoint but
//! genuinely run in parallel across worker threads, not just cooperatively interleaved.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use coro_rt::{Runtime, RuntimeConfig};

const SIZE: usize = 512;
const N: usize = 16;

fn main() {
    demos::init_tracing();

    let a: Arc<Vec<i32>> = Arc::new((0..SIZE * SIZE).map(|v| i32::try_from(v).unwrap()).collect());
    let b: Arc<Vec<AtomicI32>> =
        Arc::new((0..SIZE * SIZE).map(|_| AtomicI32::new(0)).collect());

    let rt = Runtime::init(RuntimeConfig::default());
    let rows_per_task = SIZE / N;

    let handles = (0..N)
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

    println!("Matrix transpose done.");

    let passed = (0..SIZE).all(|i| {
        (0..SIZE).all(|j| b[j * SIZE + i].load(Ordering::Relaxed) == a[i * SIZE + j])
    });
    println!("Transpose {}", if passed { "PASSED" } else { "FAILED" });
}
