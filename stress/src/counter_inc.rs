/*
    Measures Counter::inc on one counter shared by every thread. Every call lands in the
    integer register.

    cargo run --release --bin counter_inc -- [threads]
*/

use lazy_static::lazy_static;
use prometheus_counter::{Counter, CounterOpts};

mod throughput;

lazy_static! {
    static ref COUNTER: Counter = Counter::new(CounterOpts::new("stress_inc_total", "help"))
        .expect("valid counter options");
}

fn main() {
    throughput::test_throughput(test_counter_inc);
    println!("Final value: {}", COUNTER.get());
}

fn test_counter_inc() {
    COUNTER.inc();
}
