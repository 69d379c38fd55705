//! The critical-section gate: blocking and unblocking the preemption signal.
//!
//! Every mutation of the thread table, the semaphore directory, or the
//! global counters happens between `enter_critical` and
//! `leave_critical`. The gate is binary: it manipulates the process
//! signal mask directly and keeps no depth count, so pairing is the
//! caller's responsibility and nesting is not supported.

use core::mem;
use core::ptr;

use portable_atomic::{AtomicBool, Ordering};

/// Tracks the user-visible gate so misuse of [`lock`]/[`unlock`] trips a
/// debug assertion instead of silently corrupting the pairing.
static USER_GATE_HELD: AtomicBool = AtomicBool::new(false);

fn alarm_set() -> libc::sigset_t {
    unsafe {
        let mut set: libc::sigset_t = mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGALRM);
        set
    }
}

/// Block the preemption signal.
pub(crate) fn enter_critical() {
    let set = alarm_set();
    unsafe {
        libc::sigprocmask(libc::SIG_BLOCK, &set, ptr::null_mut());
    }
}

/// Unblock the preemption signal; a pending preemption is delivered
/// immediately after.
pub(crate) fn leave_critical() {
    let set = alarm_set();
    unsafe {
        libc::sigprocmask(libc::SIG_UNBLOCK, &set, ptr::null_mut());
    }
}

/// Install an empty signal mask. Used by the thread wrapper, whose first
/// duty is to open the gate a fresh thread was jumped into holding.
pub(crate) fn clear_mask() {
    unsafe {
        let mut set: libc::sigset_t = mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigprocmask(libc::SIG_SETMASK, &set, ptr::null_mut());
    }
}

/// Whether SIGALRM is currently blocked, i.e. the gate is closed.
pub(crate) fn is_closed() -> bool {
    unsafe {
        let mut current: libc::sigset_t = mem::zeroed();
        libc::sigprocmask(libc::SIG_BLOCK, ptr::null(), &mut current);
        libc::sigismember(&current, libc::SIGALRM) == 1
    }
}

/// Begin a user-level critical section: no preemption occurs until
/// [`unlock`].
///
/// The gate is binary. `lock` inside an already-locked section is a usage
/// error (caught by a debug assertion), and calling runtime operations such
/// as [`crate::create`] or [`crate::join`] between `lock` and `unlock` ends
/// the critical section early, because those operations release the gate on
/// their way out.
pub fn lock() {
    let was_held = USER_GATE_HELD.swap(true, Ordering::AcqRel);
    debug_assert!(!was_held, "critical sections do not nest");
    enter_critical();
}

/// End a user-level critical section started by [`lock`].
pub fn unlock() {
    let was_held = USER_GATE_HELD.swap(false, Ordering::AcqRel);
    debug_assert!(was_held, "unlock without a matching lock");
    leave_critical();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_blocks_and_unblocks_sigalrm() {
        assert!(!is_closed());
        enter_critical();
        assert!(is_closed());
        leave_critical();
        assert!(!is_closed());
    }

    #[test]
    fn clear_mask_opens_the_gate() {
        enter_critical();
        assert!(is_closed());
        clear_mask();
        assert!(!is_closed());
    }
}
