//! The join error matrix.
//!
//! A join on an already-exited thread returns immediately with its value;
//! a second join on the same handle is AlreadyJoined; joining yourself is
//! WouldDeadlock; joining a handle that never existed is NoSuchThread.

use std::ffi::c_void;
use std::ptr;
use std::time::Duration;

use uthreads::{JoinError, ThreadId};

fn quick_worker(arg: *mut c_void) -> *mut c_void {
    // Return the argument doubled through the wrapper.
    ((arg as usize) * 2) as *mut c_void
}

fn self_joiner(_arg: *mut c_void) -> *mut c_void {
    let me = uthreads::current();
    assert_eq!(uthreads::join(me), Err(JoinError::WouldDeadlock));
    ptr::null_mut()
}

fn main() {
    env_logger::init();

    let tid = uthreads::create(quick_worker, 21 as *mut c_void).expect("create");

    // Give the worker ample time to finish so the first join takes the
    // no-blocking path.
    std::thread::sleep(Duration::from_millis(200));

    let value = uthreads::join(tid).expect("first join");
    assert_eq!(value as usize, 42);
    println!("first join delivered {}", value as usize);

    assert_eq!(uthreads::join(tid), Err(JoinError::AlreadyJoined));
    println!("second join: AlreadyJoined (errno {})", JoinError::AlreadyJoined.errno());

    assert_eq!(
        uthreads::join(ThreadId::from_raw(9999)),
        Err(JoinError::NoSuchThread)
    );
    println!("unknown handle: NoSuchThread (errno {})", JoinError::NoSuchThread.errno());

    // Self-join from a spawned thread; also shows a blocking join of a
    // still-running target from main.
    let tid = uthreads::create(self_joiner, ptr::null_mut()).expect("create self joiner");
    uthreads::join(tid).expect("join self joiner");
    println!("self join: WouldDeadlock (errno {})", JoinError::WouldDeadlock.errno());

    // And the closure-based spawn delivers its return value the same way.
    let tid = uthreads::spawn(|| 7 as *mut c_void).expect("spawn");
    let value = uthreads::join(tid).expect("join spawned");
    assert_eq!(value as usize, 7);

    println!("PASS");
}
