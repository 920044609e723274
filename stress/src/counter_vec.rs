/*
    Measures CounterVec::with_label_values(..).inc() over 1000 series: three labels with ten
    values each, picked at random on every call.

    cargo run --release --bin counter_vec -- [threads]
*/

use lazy_static::lazy_static;
use prometheus_counter::{Collector, CounterOpts, CounterVec};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::cell::RefCell;

mod throughput;

lazy_static! {
    static ref LABEL_VALUES: [&'static str; 10] = [
        "value1", "value2", "value3", "value4", "value5", "value6", "value7", "value8", "value9",
        "value10"
    ];
    static ref COUNTER_VEC: CounterVec = CounterVec::new(
        CounterOpts::new("stress_vec_total", "help"),
        &["label1", "label2", "label3"]
    )
    .expect("valid counter vec options");
}

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

fn main() {
    throughput::test_throughput(test_counter_vec);
    println!("Series: {}", COUNTER_VEC.collect().data_points.len());
}

fn test_counter_vec() {
    let len = LABEL_VALUES.len();
    let rands = CURRENT_RNG.with_borrow_mut(|rng| {
        [
            rng.random_range(0..len),
            rng.random_range(0..len),
            rng.random_range(0..len),
        ]
    });

    // each label has 10 possible values, so there are 1000 possible combinations (series)
    COUNTER_VEC
        .with_label_values(&[
            LABEL_VALUES[rands[0]],
            LABEL_VALUES[rands[1]],
            LABEL_VALUES[rands[2]],
        ])
        .inc();
}
