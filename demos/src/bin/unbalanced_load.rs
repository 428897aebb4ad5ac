// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! 1000 tasks with strictly increasing workload (task `i` does `(i+1) * 100_000` units of
//! busywork, yielding every 10000 units), exercising the local/global rebalancing policy under
//! a badly skewed load rather than the uniform one `massive_sum` and `matrix_transpose` give it.

use std::time::Instant;

use coro_rt::{Runtime, RuntimeConfig};

const N: usize = 1000;

fn main() {
    demos::init_tracing();

    let rt = Runtime::init(RuntimeConfig::default());
    let start = Instant::now();

    let handles = (0..N)
        .map(|id| {
            let workload = (id + 1) * 100_000;
            rt.start(format!("unbalanced-{id}"), move || {
                let mut dummy: i64 = 0;
                for i in 0..workload {
                    dummy += (i % 7) as i64;
                    if i % 10_000 == 0 {
                        coro_rt::yield_now();
                    }
                }
                std::hint::black_box(dummy);
                println!("Coroutine {id} finished, workload {workload}");
            })
            .unwrap()
        })
        .collect::<Vec<_>>();

    for h in handles {
        rt.wait(h);
    }

    println!("All unbalanced coroutines completed.");
    println!("Time: {:.6} s", start.elapsed().as_secs_f64());
}
