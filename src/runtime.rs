//! The runtime aggregate: thread table, semaphore directory, scheduler
//! glue, the preemption handler, and global init/cleanup.
//!
//! All of this state is shared between the API operations and the SIGALRM
//! handler on one OS thread. The signal mask is the only lock: [`with`]
//! hands out the global `Runtime` and must only be called with the gate
//! closed, which is also exactly when the handler cannot run. No allocation
//! ever happens on the handler path.

use core::cell::UnsafeCell;
use core::ffi::c_void;
use core::mem;
use core::ptr;

use crate::arch::{fabricate, restore_context, save_context, Context};
use crate::errors::SpawnError;
use crate::gate;
use crate::mem::Stack;
use crate::platform_timer::{self, SavedSignal};
use crate::sched::{pick_next, Decision};
use crate::sem::SemTable;
use crate::thread::{Entry, Tcb, ThreadId, ThreadState, MAX_THREADS};

pub(crate) struct Runtime {
    pub(crate) threads: [Tcb; MAX_THREADS],
    /// High-water mark of allocated slots; nothing at or beyond this index
    /// is ever inspected.
    pub(crate) num_threads: usize,
    /// Slot of the one Running record.
    pub(crate) current: usize,
    pub(crate) sems: SemTable,
    pub(crate) initialized: bool,
    saved_signal: Option<SavedSignal>,
}

impl Runtime {
    pub(crate) const fn new() -> Self {
        Self {
            threads: [Tcb::VACANT; MAX_THREADS],
            num_threads: 0,
            current: 0,
            sems: SemTable::new(),
            initialized: false,
            saved_signal: None,
        }
    }

    /// Record the caller as slot 0, the Running primary thread. It runs on
    /// the original process stack, so it owns none.
    pub(crate) fn adopt_primary(&mut self) {
        let primary = &mut self.threads[0];
        primary.id = ThreadId(0);
        primary.stack = None;
        primary.status = ThreadState::Running;
        self.num_threads = 1;
        self.current = 0;
        self.initialized = true;
    }

    /// Allocate the next slot and forge its context to enter `wrapper` on a
    /// fresh stack.
    pub(crate) fn create_thread(
        &mut self,
        entry: Entry,
        arg: *mut c_void,
        wrapper: extern "C" fn() -> !,
    ) -> Result<ThreadId, SpawnError> {
        if self.num_threads == MAX_THREADS {
            return Err(SpawnError::TooManyThreads);
        }
        let slot = self.num_threads;
        self.num_threads += 1;

        let Some(stack) = Stack::allocate() else {
            self.num_threads -= 1;
            return Err(SpawnError::OutOfMemory);
        };

        let tcb = &mut self.threads[slot];
        tcb.id = ThreadId(slot);
        tcb.status = ThreadState::Ready;
        tcb.entry = Some(entry);
        tcb.arg = arg;
        tcb.return_value = ptr::null_mut();
        tcb.joined_by = None;
        tcb.joined = false;
        fabricate(&mut tcb.context, stack.top(), wrapper);
        tcb.stack = Some(stack);

        Ok(ThreadId(slot))
    }

    /// Reclaim an exited slot for its joiner: deliver the return value,
    /// free the stack, clear the record.
    pub(crate) fn reclaim(&mut self, slot: usize) -> *mut c_void {
        let tcb = &mut self.threads[slot];
        debug_assert_eq!(tcb.status, ThreadState::Exited);
        let value = tcb.return_value;
        tcb.stack = None;
        tcb.return_value = ptr::null_mut();
        tcb.entry = None;
        tcb.arg = ptr::null_mut();
        tcb.joined_by = None;
        tcb.joined = true;
        value
    }

    /// Wipe both tables. Every owned stack is freed except the running
    /// slot's, which is the stack this very code executes on; that one is
    /// leaked to the OS instead.
    pub(crate) fn reset_tables(&mut self) {
        let current = self.current;
        for (slot, tcb) in self.threads.iter_mut().enumerate().take(self.num_threads) {
            if slot == current {
                mem::forget(tcb.stack.take());
            }
            tcb.reset();
            tcb.joined = true;
        }
        self.sems.clear();
        self.num_threads = 0;
        self.current = 0;
    }

    /// Global cleanup: stop the timer, wipe the tables, hand SIGALRM back
    /// exactly as it was found. Idempotent.
    pub(crate) fn cleanup(&mut self) {
        if !self.initialized {
            return;
        }
        self.initialized = false;
        platform_timer::cancel();
        log::debug!(
            "runtime shutting down: {} threads, {} live semaphores, {} preemption ticks",
            self.num_threads,
            self.sems.len(),
            platform_timer::preemption_ticks()
        );
        self.reset_tables();
        if let Some(saved) = self.saved_signal.take() {
            unsafe {
                platform_timer::restore(&saved);
            }
        }
    }
}

struct RuntimeCell(UnsafeCell<Runtime>);

// One OS thread, and access is serialized by the signal mask (see `with`).
unsafe impl Sync for RuntimeCell {}

static RUNTIME: RuntimeCell = RuntimeCell(UnsafeCell::new(Runtime::new()));

/// Run `f` against the global runtime.
///
/// # Safety
///
/// The gate must be closed for the duration of the call (the API operations
/// close it explicitly; the handler runs with SIGALRM in its `sa_mask`).
/// That is what guarantees the `&mut` is unique.
pub(crate) unsafe fn with<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    debug_assert!(gate::is_closed(), "runtime access requires the gate");
    unsafe { f(&mut *RUNTIME.0.get()) }
}

/// First-use initialization: adopt the caller as the primary thread,
/// install the preemption handler, arm the timer, register cleanup for
/// normal process termination. Must run under the gate.
pub(crate) fn ensure_initialized(rt: &mut Runtime) {
    if rt.initialized {
        return;
    }
    rt.adopt_primary();
    unsafe {
        rt.saved_signal = Some(platform_timer::install(preemption_handler));
        libc::atexit(cleanup_at_exit);
    }
    platform_timer::arm();
    log::debug!(
        "runtime initialized: preemption every {} ms",
        platform_timer::TIMER_INTERVAL_MS
    );
}

extern "C" fn cleanup_at_exit() {
    gate::enter_critical();
    unsafe {
        with(|rt| rt.cleanup());
    }
    // cleanup restored the pre-init mask; if it had already run, the gate
    // simply stays closed on the way out of the process.
}

enum Jump {
    To(*const Context),
    Finished,
    Deadlocked,
}

/// Pick a successor for the current thread and jump into it. The jump
/// happens with the gate still closed; every resume point re-opens it
/// (wrapper, the resumed arms of join/wait, or sigreturn for a thread
/// parked in the handler).
///
/// # Safety
///
/// Must be called under the gate, after the caller's context has either
/// been saved or become irrelevant (exit). Never returns to the caller.
pub(crate) unsafe fn schedule_and_jump() -> ! {
    let jump = unsafe {
        with(|rt| match pick_next(&rt.threads, rt.num_threads, rt.current) {
            Decision::Run(slot) => {
                rt.threads[slot].status = ThreadState::Running;
                rt.current = slot;
                Jump::To(&rt.threads[slot].context as *const Context)
            }
            Decision::AllExited => {
                rt.cleanup();
                Jump::Finished
            }
            Decision::Stuck => Jump::Deadlocked,
        })
    };
    match jump {
        Jump::To(next) => unsafe { restore_context(next, 1) },
        Jump::Finished => std::process::exit(0),
        Jump::Deadlocked => {
            // Unreachable from the handler: it demotes the interrupted
            // thread to Ready first, so selection there always succeeds.
            log::error!("deadlock: every live thread is blocked");
            std::process::abort();
        }
    }
}

/// The preemption signal handler. Entered with SIGALRM blocked (sa_mask).
///
/// Direct path: save the interrupted thread, demote it Running → Ready,
/// jump to its successor. Resumed path: just return; unwinding through
/// sigreturn reinstates the interrupted frame's registers and signal mask.
pub(crate) extern "C" fn preemption_handler(_signo: libc::c_int) {
    platform_timer::note_tick();
    let interrupted = unsafe { with(|rt| &mut rt.threads[rt.current].context as *mut Context) };
    if unsafe { save_context(interrupted) } == 0 {
        unsafe {
            with(|rt| {
                let slot = rt.current;
                if rt.threads[slot].status == ThreadState::Running {
                    rt.threads[slot].status = ThreadState::Ready;
                }
            });
            schedule_and_jump()
        }
    }
}
