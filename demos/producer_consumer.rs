//! Producer/consumer over a single-slot buffer.
//!
//! Classic two-semaphore handoff: `empty` starts at 1, `full` at 0. Five
//! items flow through the slot and must be consumed in production order.

use std::ffi::c_void;
use std::ptr;
use std::sync::OnceLock;

use portable_atomic::{AtomicUsize, Ordering};

const ITEMS: usize = 5;

static SLOT: AtomicUsize = AtomicUsize::new(0);
static EMPTY: OnceLock<uthreads::Semaphore> = OnceLock::new();
static FULL: OnceLock<uthreads::Semaphore> = OnceLock::new();

static CONSUMED: [AtomicUsize; ITEMS] = [const { AtomicUsize::new(0) }; ITEMS];
static CONSUMED_COUNT: AtomicUsize = AtomicUsize::new(0);

fn producer(_arg: *mut c_void) -> *mut c_void {
    let empty = *EMPTY.get().unwrap();
    let full = *FULL.get().unwrap();
    for item in 1..=ITEMS {
        empty.wait().expect("producer wait");
        SLOT.store(item, Ordering::SeqCst);
        println!("produced {}", item);
        full.post().expect("producer post");
    }
    ptr::null_mut()
}

fn consumer(_arg: *mut c_void) -> *mut c_void {
    let empty = *EMPTY.get().unwrap();
    let full = *FULL.get().unwrap();
    for _ in 0..ITEMS {
        full.wait().expect("consumer wait");
        let item = SLOT.load(Ordering::SeqCst);
        let index = CONSUMED_COUNT.fetch_add(1, Ordering::SeqCst);
        CONSUMED[index].store(item, Ordering::SeqCst);
        println!("consumed {}", item);
        empty.post().expect("consumer post");
    }
    ptr::null_mut()
}

fn main() {
    env_logger::init();

    EMPTY.set(uthreads::Semaphore::new(1).expect("empty")).unwrap();
    FULL.set(uthreads::Semaphore::new(0).expect("full")).unwrap();

    let p = uthreads::create(producer, ptr::null_mut()).expect("create producer");
    let c = uthreads::create(consumer, ptr::null_mut()).expect("create consumer");

    uthreads::join(p).expect("join producer");
    uthreads::join(c).expect("join consumer");

    let sequence: Vec<usize> = CONSUMED
        .iter()
        .map(|cell| cell.load(Ordering::SeqCst))
        .collect();
    println!("consumption order: {:?}", sequence);
    assert_eq!(sequence, vec![1, 2, 3, 4, 5]);

    EMPTY.get().unwrap().destroy().expect("destroy empty");
    FULL.get().unwrap().destroy().expect("destroy full");
    println!("PASS");
}
