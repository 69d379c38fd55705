//! Round-robin selection over the thread table.

use crate::thread::{Tcb, ThreadState};

/// Outcome of one scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run the thread in this slot next.
    Run(usize),
    /// Every allocated slot has exited; the process is done.
    AllExited,
    /// Nothing is ready, not everything has exited, and the interrupted
    /// thread is no longer eligible: every live thread is blocked.
    Stuck,
}

/// Choose the successor of `current`.
///
/// Scans circularly once starting at the slot after `current`; the first
/// Ready slot wins, which bounds starvation to one full revolution of the
/// table. When no slot is Ready the table is inspected for the two terminal
/// shapes: all exited, or the original thread still eligible (Running or
/// Ready) to simply continue. Anything else means every live thread is
/// blocked.
pub fn pick_next(threads: &[Tcb], num_threads: usize, current: usize) -> Decision {
    debug_assert!(num_threads > 0 && current < num_threads);

    let mut slot = current;
    for _ in 0..num_threads {
        slot = (slot + 1) % num_threads;
        if threads[slot].status == ThreadState::Ready {
            return Decision::Run(slot);
        }
    }

    if threads[..num_threads]
        .iter()
        .all(|t| t.status == ThreadState::Exited)
    {
        return Decision::AllExited;
    }

    if threads[current].is_runnable() {
        Decision::Run(current)
    } else {
        Decision::Stuck
    }
}
