//! Simple usage example

use std::sync::Arc;
use std::thread;
use try_mpmc::Queue;

fn main() {
    println!("try_mpmc - Simple Example\n");

    // Create a queue with 16 slots
    let queue = Arc::new(Queue::new(16));

    let producer_queue = queue.clone();
    let consumer_queue = queue.clone();

    let producer = thread::spawn(move || {
        for i in 0..10 {
            let mut message = format!("Message {}", i);
            println!("Sending: {}", message);

            // The queue never retries internally; the caller spins.
            loop {
                match producer_queue.try_enqueue(message) {
                    Ok(()) => break,
                    Err(e) => {
                        message = e.0;
                        std::hint::spin_loop();
                    }
                }
            }

            // Small delay to make output readable
            thread::sleep(std::time::Duration::from_millis(100));
        }
        println!("Producer finished!");
    });

    let consumer = thread::spawn(move || {
        for _ in 0..10 {
            loop {
                match consumer_queue.try_dequeue() {
                    Ok(message) => {
                        println!("Received: {}", message);
                        break;
                    }
                    Err(_) => std::hint::spin_loop(),
                }
            }
        }
        println!("Consumer finished!");
    });

    producer.join().unwrap();
    consumer.join().unwrap();

    println!("\nExample completed successfully!");
}
