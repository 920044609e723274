use std::thread;

use prometheus_counter::{Collector, Counter, CounterOpts, CounterVec, Labels, Metric};

const THREADS: usize = 64;

fn counter(name: &str) -> Counter {
    Counter::new(CounterOpts::new(name, "help")).unwrap()
}

#[test]
fn concurrent_inc_loses_at_most_one_per_thread() {
    let counter = counter("inc_total");
    let per_thread = 1_000_000 / THREADS as u64;

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..per_thread {
                    counter.inc();
                }
            });
        }
    });

    let expected = (per_thread * THREADS as u64) as f64;
    let value = counter.get();
    assert!(
        value <= expected && value >= expected - THREADS as f64,
        "{value} not within {THREADS} of {expected}"
    );
}

#[test]
fn concurrent_inc_and_fractional_add_sum_exactly() {
    let counter = counter("mixed_total");
    let per_thread = 10_000;

    thread::scope(|s| {
        for t in 0..8 {
            let counter = counter.clone();
            s.spawn(move || {
                for _ in 0..per_thread {
                    if t % 2 == 0 {
                        counter.inc();
                    } else {
                        counter.add(0.25);
                    }
                }
            });
        }
    });

    assert_eq!(counter.get(), 4.0 * per_thread as f64 * 1.25);
}

#[test]
fn value_never_decreases_under_concurrent_updates() {
    let counter = counter("monotonic_total");

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for i in 0..20_000 {
                    if i % 3 == 0 {
                        counter.inc();
                    } else {
                        counter.add(1.5);
                    }
                }
            });
        }

        s.spawn(|| {
            let mut last = 0.0;
            for _ in 0..20_000 {
                let value = counter.get();
                assert!(value >= last, "{value} < {last}");
                last = value;
            }
        });
    });
}

#[test]
fn family_counts_every_update_across_views() {
    let vec = CounterVec::new(
        CounterOpts::new("requests_total", "help").with_subsystem("http"),
        &["method", "code"],
    )
    .unwrap();
    let methods = ["GET", "PUT", "POST", "DELETE"];
    let per_thread = 5_000;

    thread::scope(|s| {
        for (t, method) in methods.iter().enumerate() {
            let curried = vec.must_curry_with(&Labels::from([("method", *method)]));
            let vec = &vec;
            s.spawn(move || {
                for i in 0..per_thread {
                    let code = if i % 2 == 0 { "200" } else { "500" };
                    if t % 2 == 0 {
                        curried.with_label_values(&[code]).inc();
                    } else {
                        vec.with(&Labels::from([("method", *method), ("code", code)]))
                            .inc();
                    }
                }
            });
        }
    });

    let family = vec.collect();
    assert_eq!(family.name, "http_requests_total");
    assert_eq!(family.data_points.len(), methods.len() * 2);
    let total: f64 = family.data_points.iter().map(|p| p.value).sum();
    assert_eq!(total, (methods.len() * per_thread) as f64);

    let gets = vec.with_label_values(&["GET", "200"]);
    assert_eq!(gets.get(), (per_thread / 2) as f64);
}

#[test]
fn handles_survive_concurrent_delete() {
    let vec = CounterVec::new(CounterOpts::new("jobs_total", "help"), &["queue"]).unwrap();
    let handle = vec.with_label_values(&["default"]);

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..10_000 {
                handle.inc();
            }
        });
        s.spawn(|| {
            for _ in 0..100 {
                vec.delete_label_values(&["default"]);
                vec.with_label_values(&["default"]);
            }
        });
    });

    // The deleted handle kept counting on its own.
    assert_eq!(handle.get(), 10_000.0);
    assert_eq!(vec.collect().data_points.len(), 1);
}

#[test]
fn exemplar_exported_with_value() {
    let counter = counter("exemplar_total");
    counter.add_with_exemplar(3.0, Some(&Labels::from([("trace_id", "abc")])));

    let point = counter.write();
    let exemplar = point.exemplar.unwrap();
    assert_eq!(point.value, 3.0);
    assert_eq!(exemplar.value, 3.0);
    assert_eq!(exemplar.labels[0].name, "trace_id");
}
