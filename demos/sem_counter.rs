//! Binary semaphore guarding a deliberately non-atomic counter.
//!
//! Four threads each perform 1000 read-modify-write increments under the
//! semaphore. Without the guard the preemption timer would tear the
//! read/write pairs apart; with it the final count is exactly 4000.

use std::ffi::c_void;

use portable_atomic::{AtomicU64, Ordering};

const WORKERS: usize = 4;
const INCREMENTS: u64 = 1000;

static COUNTER: AtomicU64 = AtomicU64::new(0);

// One global handle, set up before any worker starts.
static SEM: std::sync::OnceLock<uthreads::Semaphore> = std::sync::OnceLock::new();

fn worker(_arg: *mut c_void) -> *mut c_void {
    let sem = *SEM.get().expect("semaphore initialized in main");
    for _ in 0..INCREMENTS {
        sem.wait().expect("wait");
        // Torn read-modify-write on purpose: only the semaphore makes it
        // atomic with respect to preemption.
        let v = COUNTER.load(Ordering::Relaxed);
        std::hint::black_box(v);
        COUNTER.store(v + 1, Ordering::Relaxed);
        sem.post().expect("post");
    }
    std::ptr::null_mut()
}

fn main() {
    env_logger::init();

    let sem = uthreads::Semaphore::new(1).expect("semaphore");
    SEM.set(sem).expect("set once");

    let mut workers = Vec::with_capacity(WORKERS);
    for _ in 0..WORKERS {
        workers.push(uthreads::create(worker, std::ptr::null_mut()).expect("create"));
    }

    for tid in workers {
        let value = uthreads::join(tid).expect("join");
        println!("joined worker {} (returned {:?})", tid, value);
    }

    let total = COUNTER.load(Ordering::SeqCst);
    println!("final counter: {}", total);
    assert_eq!(total, WORKERS as u64 * INCREMENTS);

    sem.destroy().expect("destroy");
    println!("PASS");
}
