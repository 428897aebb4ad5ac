// Copyright 2025 the crate authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Sums `i^2` over 10000 disjoint 10-integer blocks, one task per block, yielding every 10
//! iterations. Each task writes its partial sum into its own slot of a shared results array;
//! Main sums them after joining every task.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use coro_rt::{Runtime, RuntimeConfig};

const N: usize = 10_000;
const RANGE: i64 = 10;

fn main() {
    demos::init_tracing();

    let rt = Runtime::init(RuntimeConfig::default());
    let results = Arc::new((0..N).map(|_| AtomicI64::new(0)).collect::<Vec<_>>());

    let handles = (0..N)
        .map(|i| {
            let results = Arc::clone(&results);
            let start = i as i64 * RANGE + 1;
            let end = (i as i64 + 1) * RANGE;
            rt.start(format!("massive-{i}"), move || {
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
    println!("Total sum = {total}");
}
