//! The POSIX-shaped thread operations: create, exit, current, join.

use core::ffi::c_void;
use core::ptr;

use crate::arch::save_context;
use crate::errors::{JoinError, SpawnError};
use crate::gate;
use crate::runtime;
use crate::thread::{ThreadId, ThreadState};

/// A thread entry point: one opaque argument in, one opaque result out.
pub type Entry = fn(*mut c_void) -> *mut c_void;

/// Create a new thread that runs `entry(arg)`.
///
/// The first call initializes the runtime: the caller becomes the primary
/// thread and the 50 ms preemption timer starts ticking. From then on
/// control may switch to another thread between any two instructions
/// outside a critical section.
pub fn create(entry: Entry, arg: *mut c_void) -> Result<ThreadId, SpawnError> {
    gate::enter_critical();
    let result = unsafe {
        runtime::with(|rt| {
            runtime::ensure_initialized(rt);
            rt.create_thread(entry, arg, thread_wrapper)
        })
    };
    if let Ok(id) = result {
        log::trace!("created thread {}", id);
    }
    gate::leave_critical();
    result
}

/// Create a thread from a closure; its return value becomes the thread's
/// return value, delivered to a joiner.
pub fn spawn<F>(f: F) -> Result<ThreadId, SpawnError>
where
    F: FnOnce() -> *mut c_void + Send + 'static,
{
    fn trampoline<F>(arg: *mut c_void) -> *mut c_void
    where
        F: FnOnce() -> *mut c_void + Send + 'static,
    {
        let f = unsafe { Box::from_raw(arg.cast::<F>()) };
        f()
    }

    let boxed = Box::into_raw(Box::new(f));
    match create(trampoline::<F>, boxed.cast::<c_void>()) {
        Ok(id) => Ok(id),
        Err(e) => {
            // The thread never existed; take the closure back.
            drop(unsafe { Box::from_raw(boxed) });
            Err(e)
        }
    }
}

/// True entry of every spawned thread.
///
/// Jumped into with the gate closed: the entry and argument are consumed
/// while it still is, then an empty mask opens the world before user code
/// runs. An ordinary return from the entry becomes an explicit [`exit`].
pub(crate) extern "C" fn thread_wrapper() -> ! {
    let (entry, arg) = unsafe {
        runtime::with(|rt| {
            let slot = rt.current;
            let tcb = &mut rt.threads[slot];
            (tcb.entry.take(), tcb.arg)
        })
    };
    gate::clear_mask();
    let value = match entry {
        Some(f) => f(arg),
        None => ptr::null_mut(),
    };
    exit(value)
}

/// Terminate the calling thread with `value` as its return value.
///
/// Wakes a blocked joiner if one is recorded. When this was the last live
/// thread, global cleanup runs and the process terminates with code 0.
/// The thread's stack is not freed here; it stays with the zombie until a
/// joiner or cleanup reclaims it, since this code is still running on it.
pub fn exit(value: *mut c_void) -> ! {
    gate::enter_critical();
    let initialized = unsafe { runtime::with(|rt| rt.initialized) };
    if !initialized {
        // No runtime ever started: a lone primary thread exiting is just
        // the process exiting.
        std::process::exit(0);
    }
    unsafe {
        runtime::with(|rt| {
            let slot = rt.current;
            let tcb = &mut rt.threads[slot];
            tcb.return_value = value;
            tcb.status = ThreadState::Exited;
            tcb.entry = None;
            tcb.arg = ptr::null_mut();
            // joined_by stays set until the woken joiner reclaims the slot,
            // so a second join attempted in between still fails.
            if let Some(joiner) = tcb.joined_by {
                rt.threads[joiner].status = ThreadState::Ready;
            }
        });
        runtime::schedule_and_jump()
    }
}

/// Identifier of the calling thread.
///
/// Reads the record's id field, so handles compare stably against the
/// values [`create`] returned. Before the runtime initializes, the caller
/// is the primary thread.
pub fn current() -> ThreadId {
    gate::enter_critical();
    let id = unsafe {
        runtime::with(|rt| {
            if rt.initialized {
                rt.threads[rt.current].id
            } else {
                ThreadId(0)
            }
        })
    };
    gate::leave_critical();
    id
}

enum JoinStep {
    Reclaim,
    Block(*mut crate::arch::Context),
}

/// Wait for `target` to exit and collect its return value.
///
/// An already-exited target is reclaimed immediately without blocking;
/// otherwise the caller blocks until the target's exit wakes it. Either
/// way the target's stack is freed and its slot marked joined, so a second
/// join on the same handle fails with [`JoinError::AlreadyJoined`].
pub fn join(target: ThreadId) -> Result<*mut c_void, JoinError> {
    let slot = target.0;
    gate::enter_critical();

    let step = unsafe {
        runtime::with(|rt| {
            if slot >= rt.num_threads {
                return Err(JoinError::NoSuchThread);
            }
            if rt.threads[slot].joined {
                return Err(JoinError::AlreadyJoined);
            }
            if slot == rt.current {
                return Err(JoinError::WouldDeadlock);
            }
            if rt.threads[slot].joined_by.is_some() {
                // Single-occupancy: one blocked joiner per target.
                return Err(JoinError::AlreadyJoined);
            }
            if rt.threads[slot].status == ThreadState::Exited {
                return Ok(JoinStep::Reclaim);
            }
            let caller = rt.current;
            rt.threads[slot].joined_by = Some(caller);
            rt.threads[caller].status = ThreadState::Blocked;
            Ok(JoinStep::Block(
                &mut rt.threads[caller].context as *mut crate::arch::Context,
            ))
        })
    };

    match step {
        Err(e) => {
            gate::leave_critical();
            Err(e)
        }
        Ok(JoinStep::Reclaim) => {
            let value = unsafe { runtime::with(|rt| rt.reclaim(slot)) };
            log::trace!("joined thread {} without blocking", target);
            gate::leave_critical();
            Ok(value)
        }
        Ok(JoinStep::Block(ctx)) => {
            unsafe {
                if save_context(ctx) == 0 {
                    runtime::schedule_and_jump()
                }
            }
            // Resumed: the target exited and readied us. The jump left the
            // gate closed, so the reclaim is already protected.
            let value = unsafe { runtime::with(|rt| rt.reclaim(slot)) };
            log::trace!("joined thread {}", target);
            gate::leave_critical();
            Ok(value)
        }
    }
}
