//! Create 128 threads in 8 back-to-back batches of 16.
//!
//! A 10 ms sleep between batches lets earlier threads make progress while
//! later ones are still being created. Every batch counter must end at 16
//! and the total at 128.

use std::ffi::c_void;
use std::ptr;
use std::time::Duration;

use portable_atomic::{AtomicU32, Ordering};

const TOTAL_THREADS: usize = 128;
const BATCH_SIZE: usize = 16;
const NUM_BATCHES: usize = TOTAL_THREADS / BATCH_SIZE;

static COMPLETED: AtomicU32 = AtomicU32::new(0);
static BATCH_COMPLETED: [AtomicU32; NUM_BATCHES] = [const { AtomicU32::new(0) }; NUM_BATCHES];

fn worker(arg: *mut c_void) -> *mut c_void {
    let thread_num = arg as usize;
    let batch_num = thread_num / BATCH_SIZE;

    let mut sum: u64 = 0;
    for i in 0..10_000u64 {
        sum += i;
        if i % 1000 == 0 {
            // Burn some cycles so the timer gets a chance to preempt.
            std::hint::black_box(&sum);
        }
    }

    let batch_count = BATCH_COMPLETED[batch_num].fetch_add(1, Ordering::SeqCst) + 1;
    let total = COMPLETED.fetch_add(1, Ordering::SeqCst) + 1;
    println!(
        "thread {} (batch {}) completed (sum={}, batch_count={}, total={})",
        thread_num, batch_num, sum, batch_count, total
    );

    thread_num as *mut c_void
}

fn main() {
    env_logger::init();

    println!(
        "creating {} threads in {} batches of {}...",
        TOTAL_THREADS, NUM_BATCHES, BATCH_SIZE
    );

    for batch in 0..NUM_BATCHES {
        println!(
            "=== creating batch {} (threads {}-{}) ===",
            batch,
            batch * BATCH_SIZE,
            (batch + 1) * BATCH_SIZE - 1
        );

        for i in 0..BATCH_SIZE {
            let thread_idx = batch * BATCH_SIZE + i;
            uthreads::create(worker, thread_idx as *mut c_void)
                .unwrap_or_else(|e| panic!("failed to create thread {}: {}", thread_idx, e));
        }

        std::thread::sleep(Duration::from_millis(10));
    }

    println!("=== all {} threads created ===", TOTAL_THREADS);
    println!("batch completion so far:");
    for (batch, counter) in BATCH_COMPLETED.iter().enumerate() {
        println!(
            "  batch {}: {}/{} threads completed",
            batch,
            counter.load(Ordering::SeqCst),
            BATCH_SIZE
        );
    }
    println!(
        "total so far: {}/{}",
        COMPLETED.load(Ordering::SeqCst),
        TOTAL_THREADS
    );

    // Let the stragglers finish; the last exit ends the process.
    uthreads::exit(ptr::null_mut())
}
