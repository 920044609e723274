use num_format::{Locale, ToFormattedString};
use std::env;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SLIDING_WINDOW_SIZE: u64 = 2; // In seconds
const BATCH_SIZE: u64 = 1000;

static STOP: AtomicBool = AtomicBool::new(false);

// One cache line per worker so the counts do not contend with each other.
#[repr(C)]
#[derive(Default)]
struct WorkerStats {
    count: AtomicU64,
    padding: [u64; 15],
}

/// Runs `func` in a loop on every worker thread until Ctrl-C, printing the combined number of
/// calls per second every few seconds.
///
/// The number of worker threads defaults to the number of physical cores and can be passed as
/// the first command line argument.
pub fn test_throughput<F>(func: F)
where
    F: Fn() + Sync + Send + 'static,
{
    ctrlc::set_handler(move || {
        STOP.store(true, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let num_threads = match env::args().nth(1) {
        Some(arg) => match arg.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                eprintln!("Invalid thread count {arg:?}, using the number of physical cores");
                num_cpus::get_physical()
            }
        },
        None => num_cpus::get_physical(),
    };
    println!("Number of threads: {}", num_threads);

    let func = Arc::new(func);
    let worker_stats: Arc<Vec<WorkerStats>> =
        Arc::new((0..num_threads).map(|_| WorkerStats::default()).collect());

    let monitor_stats = Arc::clone(&worker_stats);
    let monitor = thread::spawn(move || {
        let mut start_time = Instant::now();
        let mut total_count_old: u64 = 0;
        loop {
            let elapsed = start_time.elapsed().as_secs();
            if elapsed >= SLIDING_WINDOW_SIZE {
                let total_count: u64 = monitor_stats
                    .iter()
                    .map(|stats| stats.count.load(Ordering::Relaxed))
                    .sum();
                let current_count = total_count - total_count_old;
                total_count_old = total_count;
                let throughput = current_count / elapsed;
                println!(
                    "Throughput: {} iterations/sec",
                    throughput.to_formatted_string(&Locale::en)
                );
                start_time = Instant::now();
            }

            if STOP.load(Ordering::SeqCst) {
                break;
            }

            thread::sleep(Duration::from_millis(500));
        }
    });

    let workers: Vec<_> = (0..num_threads)
        .map(|thread_index| {
            let worker_stats = Arc::clone(&worker_stats);
            let func = Arc::clone(&func);
            thread::spawn(move || loop {
                for _ in 0..BATCH_SIZE {
                    func();
                }
                worker_stats[thread_index]
                    .count
                    .fetch_add(BATCH_SIZE, Ordering::Relaxed);
                if STOP.load(Ordering::SeqCst) {
                    break;
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker thread panicked");
    }
    monitor.join().expect("monitor thread panicked");
}
