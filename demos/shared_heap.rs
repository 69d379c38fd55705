//! Two threads sharing a heap array and the data segment.
//!
//! One thread writes both cells and exits; the other busy-waits on the
//! first cell, then overwrites the second. The main thread observes the
//! final value within ten seconds. Exercises heap and data-segment sharing
//! plus timer preemption of the busy-wait loop.

use std::ffi::c_void;
use std::ptr;
use std::time::{Duration, Instant};

use portable_atomic::{AtomicI32, Ordering};

static DATA_SEG_VAR: AtomicI32 = AtomicI32::new(1);

fn writer(arg: *mut c_void) -> *mut c_void {
    let arr = arg as *mut i32;
    println!("writer: thread {}", uthreads::current());
    DATA_SEG_VAR.fetch_add(1, Ordering::SeqCst);
    unsafe {
        arr.write(1);
        arr.add(1).write(1);
    }
    uthreads::exit(ptr::null_mut())
}

fn watcher(arg: *mut c_void) -> *mut c_void {
    let arr = arg as *mut i32;
    while unsafe { arr.read_volatile() } == 0 {
        // Busy-wait; the timer preempts this loop.
    }
    assert_eq!(DATA_SEG_VAR.load(Ordering::SeqCst), 2);
    println!("watcher: saw the write, data segment = {}", DATA_SEG_VAR.load(Ordering::SeqCst));
    unsafe {
        arr.add(1).write(2);
    }
    uthreads::exit(ptr::null_mut())
}

fn main() {
    env_logger::init();

    let arr = Box::into_raw(Box::new([0i32; 2])) as *mut i32;

    let t1 = uthreads::create(watcher, arr as *mut c_void).expect("create watcher");
    let t2 = uthreads::create(writer, arr as *mut c_void).expect("create writer");
    assert_ne!(t1, t2);

    let deadline = Instant::now() + Duration::from_secs(10);
    while unsafe { arr.add(1).read_volatile() } != 2 {
        if Instant::now() >= deadline {
            println!("FAILED");
            std::process::exit(1);
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    drop(unsafe { Box::from_raw(arr as *mut [i32; 2]) });
    println!("PASS");
}
