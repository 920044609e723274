/*
    Measures Counter::add with fractional increments on one counter shared by every thread.
    Every call goes through the compare-and-swap loop on the float register.

    cargo run --release --bin counter_add -- [threads]
*/

use lazy_static::lazy_static;
use prometheus_counter::{Counter, CounterOpts};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::cell::RefCell;

mod throughput;

lazy_static! {
    static ref COUNTER: Counter = Counter::new(CounterOpts::new("stress_add_total", "help"))
        .expect("valid counter options");
}

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

fn main() {
    throughput::test_throughput(test_counter_add);
    println!("Final value: {}", COUNTER.get());
}

fn test_counter_add() {
    let v = CURRENT_RNG.with_borrow_mut(|rng| rng.random_range(0.0..1.0));
    COUNTER.add(v);
}
