//! Unit tests for the runtime's table operations.
//!
//! These drive a local `Runtime` instance directly, so no signal handler is
//! installed and nothing ever jumps stacks.

use core::ffi::c_void;
use core::ptr;

use crate::errors::SpawnError;
use crate::runtime::Runtime;
use crate::thread::{ThreadId, ThreadState, MAX_THREADS};

fn entry_stub(_arg: *mut c_void) -> *mut c_void {
    ptr::null_mut()
}

extern "C" fn wrapper_stub() -> ! {
    unreachable!("forged contexts are never restored in unit tests")
}

fn runtime_with_primary() -> Box<Runtime> {
    let mut rt = Box::new(Runtime::new());
    rt.adopt_primary();
    rt
}

#[test]
fn adopt_primary_makes_slot_zero_the_running_thread() {
    let rt = runtime_with_primary();
    assert!(rt.initialized);
    assert_eq!(rt.num_threads, 1);
    assert_eq!(rt.current, 0);
    assert_eq!(rt.threads[0].id, ThreadId::from_raw(0));
    assert_eq!(rt.threads[0].status, ThreadState::Running);
    assert!(rt.threads[0].stack.is_none());
}

#[test]
fn create_fills_the_record_and_forges_its_context() {
    let mut rt = runtime_with_primary();
    let arg = 0x1234 as *mut c_void;

    let id = rt.create_thread(entry_stub, arg, wrapper_stub).unwrap();

    assert_eq!(id, ThreadId::from_raw(1));
    let tcb = &rt.threads[1];
    assert_eq!(tcb.status, ThreadState::Ready);
    assert_eq!(tcb.arg, arg);
    assert!(tcb.entry.is_some());
    assert!(tcb.stack.is_some());
    assert!(tcb.return_value.is_null());
    assert!(tcb.joined_by.is_none());
    assert!(!tcb.joined);

    // The forged context enters the wrapper on the owned stack.
    assert_eq!(tcb.context.rip, wrapper_stub as usize as u64);
    assert_eq!(tcb.context.rsp % 16, 8);
    let stack = tcb.stack.as_ref().unwrap();
    assert!(tcb.context.rsp as usize > stack.base() as usize);
    assert!((tcb.context.rsp as usize) < stack.top() as usize);
}

#[test]
fn thread_ids_are_dense_and_never_reused() {
    let mut rt = runtime_with_primary();
    let mut seen = std::collections::BTreeSet::new();
    seen.insert(rt.threads[0].id);

    for expected in 1..20 {
        let id = rt
            .create_thread(entry_stub, ptr::null_mut(), wrapper_stub)
            .unwrap();
        assert_eq!(id.as_raw(), expected);
        assert!(seen.insert(id), "id {} issued twice", id);
    }

    // Reclaiming a slot does not recycle its id: the slot counter only
    // grows.
    rt.threads[5].status = ThreadState::Exited;
    rt.reclaim(5);
    let id = rt
        .create_thread(entry_stub, ptr::null_mut(), wrapper_stub)
        .unwrap();
    assert_eq!(id.as_raw(), 20);
}

#[test]
fn create_fails_when_the_table_is_full() {
    let mut rt = runtime_with_primary();
    for _ in 1..MAX_THREADS {
        rt.create_thread(entry_stub, ptr::null_mut(), wrapper_stub)
            .unwrap();
    }
    assert_eq!(
        rt.create_thread(entry_stub, ptr::null_mut(), wrapper_stub),
        Err(SpawnError::TooManyThreads)
    );
    assert_eq!(rt.num_threads, MAX_THREADS);
}

#[test]
fn reclaim_delivers_the_return_value_and_clears_the_slot() {
    let mut rt = runtime_with_primary();
    rt.create_thread(entry_stub, ptr::null_mut(), wrapper_stub)
        .unwrap();

    // Simulate the thread having exited with a value.
    let value = 0xBEEF as *mut c_void;
    rt.threads[1].status = ThreadState::Exited;
    rt.threads[1].entry = None;
    rt.threads[1].return_value = value;

    let delivered = rt.reclaim(1);

    assert_eq!(delivered, value);
    let tcb = &rt.threads[1];
    assert!(tcb.joined);
    assert!(tcb.stack.is_none());
    assert!(tcb.return_value.is_null());
    assert!(tcb.joined_by.is_none());
    assert_eq!(tcb.status, ThreadState::Exited);
    assert_eq!(tcb.id, ThreadId::from_raw(1));
}

#[test]
fn reset_tables_wipes_threads_and_semaphores() {
    let mut rt = runtime_with_primary();
    for _ in 1..4 {
        rt.create_thread(entry_stub, ptr::null_mut(), wrapper_stub)
            .unwrap();
    }
    rt.sems.insert(3).unwrap();
    rt.sems.insert(0).unwrap();

    rt.reset_tables();

    assert_eq!(rt.num_threads, 0);
    assert_eq!(rt.current, 0);
    assert_eq!(rt.sems.len(), 0);
    for tcb in rt.threads.iter().take(4) {
        assert_eq!(tcb.status, ThreadState::Exited);
        assert!(tcb.stack.is_none());
        assert!(tcb.joined);
    }
}

#[test]
fn cleanup_is_a_noop_before_initialization() {
    let mut rt = Box::new(Runtime::new());
    rt.cleanup();
    assert!(!rt.initialized);
    assert_eq!(rt.num_threads, 0);
}

#[test]
fn cleanup_is_idempotent() {
    let mut rt = runtime_with_primary();
    rt.create_thread(entry_stub, ptr::null_mut(), wrapper_stub)
        .unwrap();
    rt.cleanup();
    assert!(!rt.initialized);
    rt.cleanup();
    assert!(!rt.initialized);
    assert_eq!(rt.num_threads, 0);
}

#[test]
fn exited_records_keep_their_value_until_joined() {
    // Invariant: an Exited record holds no entry but an intact return
    // value until a successful join takes it.
    let mut rt = runtime_with_primary();
    rt.create_thread(entry_stub, ptr::null_mut(), wrapper_stub)
        .unwrap();
    rt.threads[1].status = ThreadState::Exited;
    rt.threads[1].entry = None;
    rt.threads[1].arg = ptr::null_mut();
    rt.threads[1].return_value = 7 as *mut c_void;

    assert!(rt.threads[1].entry.is_none());
    assert_eq!(rt.threads[1].return_value as usize, 7);

    rt.reclaim(1);
    assert!(rt.threads[1].return_value.is_null());
}
