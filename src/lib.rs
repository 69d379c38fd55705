#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! Preemptive user-space threads multiplexed onto a single OS thread.
//!
//! This library supplies a POSIX-shaped thread API (create, exit, current,
//! join) and counting semaphores from inside one process. The kernel is
//! never asked for additional schedulable entities: every thread runs on
//! the OS thread that executed program start, and concurrency comes from a
//! 50 ms `SIGALRM` interval timer whose handler drives a round-robin
//! scheduler over hand-switched stacks.
//!
//! # Target Platform
//!
//! - **Architecture**: x86-64, System-V ABI
//! - **Environment**: Unix-like host (signals, `setitimer`)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::ffi::c_void;
//!
//! fn worker(arg: *mut c_void) -> *mut c_void {
//!     let n = arg as usize;
//!     (n * 2) as *mut c_void
//! }
//!
//! let tid = uthreads::create(worker, 21 as *mut c_void).expect("create failed");
//! let doubled = uthreads::join(tid).expect("join failed");
//! assert_eq!(doubled as usize, 42);
//! ```
//!
//! # Architecture
//!
//! The library is organized around a few pieces:
//! - x86-64 context save/restore with hand-forged contexts for new threads
//! - a signal-mask gate protecting every table mutation from the handler
//! - a fixed-capacity thread table with a round-robin chooser
//! - FIFO semaphore queues that block and wake through the same scheduler
//! - a global cleanup that restores `SIGALRM` exactly as it was found

pub mod arch;
pub mod errors;
pub mod gate;
pub mod mem;
pub mod platform_timer;
mod runtime;
pub mod sched;
pub mod sem;
pub mod thread;

#[cfg(test)]
mod tests;

// ============================================================================
// Public API
// ============================================================================

// Thread operations and types
pub use thread::{create, current, exit, join, spawn, Entry, ThreadId, ThreadState, MAX_THREADS};

// Semaphores
pub use sem::{Semaphore, MAX_SEMAPHORES, SEM_VALUE_MAX};

// User-visible critical sections
pub use gate::{lock, unlock};

// Errors
pub use errors::{JoinError, SemError, SpawnError, UthreadError, UthreadResult};

// Diagnostics
pub use platform_timer::preemption_ticks;

// Stack geometry
pub use mem::STACK_SIZE;
