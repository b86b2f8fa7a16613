//! Work queue example: several workers pulling jobs from one shared queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use try_mpmc::Queue;

fn main() {
    println!("Work Queue Example\n");

    const NUM_WORKERS: usize = 4;
    const NUM_JOBS: usize = 20;

    let jobs = Arc::new(Queue::new(128));
    let results = Arc::new(Queue::new(128));
    let done = Arc::new(AtomicUsize::new(0));

    let jobs_tx = jobs.clone();
    let producer = thread::spawn(move || {
        for i in 0..NUM_JOBS {
            let mut job = format!("Job-{:02}", i);
            loop {
                match jobs_tx.try_enqueue(job) {
                    Ok(()) => break,
                    Err(e) => {
                        job = e.0;
                        std::hint::spin_loop();
                    }
                }
            }
            println!("Enqueued: Job-{:02}", i);
            thread::sleep(Duration::from_millis(50));
        }
        println!("All jobs enqueued!");
    });

    let mut workers = vec![];
    for worker_id in 0..NUM_WORKERS {
        let jobs_rx = jobs.clone();
        let results_tx = results.clone();
        let done = done.clone();

        workers.push(thread::spawn(move || {
            let mut processed = 0;
            loop {
                match jobs_rx.try_dequeue() {
                    Ok(job) => {
                        println!("Worker {} processing: {}", worker_id, job);

                        thread::sleep(Duration::from_millis(200));

                        let mut result = format!("{} -> completed by worker {}", job, worker_id);
                        loop {
                            match results_tx.try_enqueue(result) {
                                Ok(()) => break,
                                Err(e) => {
                                    result = e.0;
                                    std::hint::spin_loop();
                                }
                            }
                        }

                        processed += 1;
                        done.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(_) => {
                        if done.load(Ordering::Relaxed) >= NUM_JOBS {
                            break;
                        }
                        thread::sleep(Duration::from_millis(10));
                    }
                }
            }
            println!("Worker {} finished ({} jobs)", worker_id, processed);
        }));
    }

    let results_rx = results.clone();
    let collector = thread::spawn(move || {
        let mut collected = 0;
        while collected < NUM_JOBS {
            match results_rx.try_dequeue() {
                Ok(result) => {
                    println!("Result: {}", result);
                    collected += 1;
                }
                Err(_) => std::hint::spin_loop(),
            }
        }
        println!("All results collected!");
    });

    producer.join().unwrap();
    for worker in workers {
        worker.join().unwrap();
    }
    collector.join().unwrap();

    println!("\nWork queue example completed!");
}
