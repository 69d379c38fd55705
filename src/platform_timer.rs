//! The preemption signal and its interval timer.
//!
//! Preemption is a periodic SIGALRM from `setitimer(ITIMER_REAL)`. This
//! module owns the raw plumbing: installing the handler with the previous
//! disposition and mask saved for bit-for-bit restoration, arming and
//! cancelling the timer, and counting delivered ticks.

use core::mem;
use core::ptr;

use portable_atomic::{AtomicU64, Ordering};

/// Preemption period, both the initial expiry and the recurring interval.
pub(crate) const TIMER_INTERVAL_MS: u64 = 50;

static PREEMPTION_TICKS: AtomicU64 = AtomicU64::new(0);

/// Record one delivered preemption tick.
///
/// Called from the signal handler; a single atomic increment is
/// async-signal-safe.
pub(crate) fn note_tick() {
    PREEMPTION_TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Total preemption ticks delivered since the runtime initialized.
pub fn preemption_ticks() -> u64 {
    PREEMPTION_TICKS.load(Ordering::Relaxed)
}

/// The SIGALRM state as it was before the runtime took over.
pub(crate) struct SavedSignal {
    action: libc::sigaction,
    mask: libc::sigset_t,
}

/// Install `handler` for SIGALRM and return the previous signal state.
///
/// The handler is configured with SIGALRM in `sa_mask`, so the handler body
/// always runs with the gate closed.
///
/// # Safety
///
/// `handler` must be async-signal-safe and must remain valid for the life
/// of the process.
pub(crate) unsafe fn install(handler: extern "C" fn(libc::c_int)) -> SavedSignal {
    unsafe {
        let mut mask: libc::sigset_t = mem::zeroed();
        libc::sigprocmask(libc::SIG_BLOCK, ptr::null(), &mut mask);

        let mut action: libc::sigaction = mem::zeroed();
        action.sa_sigaction = handler as usize;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaddset(&mut action.sa_mask, libc::SIGALRM);

        let mut previous: libc::sigaction = mem::zeroed();
        libc::sigaction(libc::SIGALRM, &action, &mut previous);

        SavedSignal {
            action: previous,
            mask,
        }
    }
}

/// Restore the SIGALRM disposition and the signal mask saved by
/// `install`. The timer must already be cancelled.
///
/// # Safety
///
/// `saved` must come from [`install`] on this process.
pub(crate) unsafe fn restore(saved: &SavedSignal) {
    unsafe {
        // A tick generated before the timer was cancelled may still be
        // pending while the gate is closed. SIG_IGN discards it; otherwise
        // restoring a default disposition could kill the process on unmask.
        let mut ignore: libc::sigaction = mem::zeroed();
        ignore.sa_sigaction = libc::SIG_IGN;
        libc::sigemptyset(&mut ignore.sa_mask);
        libc::sigaction(libc::SIGALRM, &ignore, ptr::null_mut());

        libc::sigaction(libc::SIGALRM, &saved.action, ptr::null_mut());
        libc::sigprocmask(libc::SIG_SETMASK, &saved.mask, ptr::null_mut());
    }
}

fn interval() -> libc::itimerval {
    let period = libc::timeval {
        tv_sec: 0,
        tv_usec: (TIMER_INTERVAL_MS * 1000) as libc::suseconds_t,
    };
    libc::itimerval {
        it_interval: period,
        it_value: period,
    }
}

/// Arm the recurring preemption timer.
pub(crate) fn arm() {
    let timer = interval();
    unsafe {
        libc::setitimer(libc::ITIMER_REAL, &timer, ptr::null_mut());
    }
}

/// Cancel the preemption timer: both the pending expiry and the recurring
/// interval are zeroed.
pub(crate) fn cancel() {
    let timer: libc::itimerval = unsafe { mem::zeroed() };
    unsafe {
        libc::setitimer(libc::ITIMER_REAL, &timer, ptr::null_mut());
    }
}
