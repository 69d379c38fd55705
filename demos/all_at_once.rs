//! Create 128 threads in one tight sequence.
//!
//! Each thread reports its id and a computed sum, then returns through the
//! wrapper. The main thread exits through the runtime, so the process
//! terminates with code 0 once the last worker finishes.

use std::ffi::c_void;
use std::ptr;

use portable_atomic::{AtomicU32, Ordering};

const NUM_THREADS: usize = 128;

static COMPLETED: AtomicU32 = AtomicU32::new(0);

fn worker(arg: *mut c_void) -> *mut c_void {
    let thread_num = arg as usize;

    let mut sum: u64 = 0;
    for i in 0..1000u64 {
        sum += i;
    }

    let total = COMPLETED.fetch_add(1, Ordering::SeqCst) + 1;
    println!(
        "thread {} completed (sum={}, total_completed={})",
        thread_num, sum, total
    );

    thread_num as *mut c_void
}

fn main() {
    env_logger::init();

    println!("creating {} threads all at once...", NUM_THREADS);

    for i in 0..NUM_THREADS {
        uthreads::create(worker, i as *mut c_void)
            .unwrap_or_else(|e| panic!("failed to create thread {}: {}", i, e));
    }

    println!("all {} threads created", NUM_THREADS);
    println!("main thread exiting; workers keep the process alive");

    // Exiting through the runtime lets the workers run to completion; the
    // last one to exit ends the process with code 0.
    uthreads::exit(ptr::null_mut())
}
