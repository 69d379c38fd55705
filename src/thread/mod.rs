//! Thread control records and the public thread API.

use core::ffi::c_void;
use core::fmt;
use core::ptr;

use crate::arch::Context;
use crate::mem::Stack;

pub mod api;

pub use api::{create, current, exit, join, spawn, Entry};

/// Maximum number of threads over the life of the process. Slots are never
/// reused, so this bounds creations, not concurrency.
pub const MAX_THREADS: usize = 150;

/// Identifier of a thread: the dense index of its table slot, handed out
/// once and never recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub(crate) usize);

impl ThreadId {
    /// Reconstruct an id from its raw value, e.g. one carried through
    /// foreign code. No validation happens here; operations on a value that
    /// never named a thread fail with `NoSuchThread`.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw slot index behind this id.
    pub fn as_raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of one thread slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    Ready = 0,
    Running = 1,
    Blocked = 2,
    Exited = 3,
}

/// One thread control record.
///
/// Fields are mutated only under the critical-section gate; the signal
/// handler and the API operations share these records on one OS thread.
pub struct Tcb {
    pub id: ThreadId,
    /// Owned stack; `None` for the primary thread (slot 0 runs on the
    /// original process stack) and after a joiner reclaims the slot.
    pub stack: Option<Stack>,
    pub context: Context,
    pub status: ThreadState,
    /// Entry point and argument; consumed when the thread first runs.
    pub entry: Option<Entry>,
    pub arg: *mut c_void,
    /// Written by `exit`, read by the successful joiner.
    pub return_value: *mut c_void,
    /// Slot of the thread currently blocked joining this one.
    pub joined_by: Option<usize>,
    /// True once a join completed or cleanup reclaimed the zombie.
    pub joined: bool,
}

impl Tcb {
    /// An untouched slot, as the table is born and as cleanup leaves it.
    pub const VACANT: Tcb = Tcb {
        id: ThreadId(0),
        stack: None,
        context: Context::new(),
        status: ThreadState::Exited,
        entry: None,
        arg: ptr::null_mut(),
        return_value: ptr::null_mut(),
        joined_by: None,
        joined: false,
    };

    pub fn is_runnable(&self) -> bool {
        matches!(self.status, ThreadState::Ready | ThreadState::Running)
    }

    /// Return the slot to its vacant state, dropping the stack if one is
    /// still owned. The id survives: ids are never reissued.
    pub fn reset(&mut self) {
        self.stack = None;
        self.context = Context::new();
        self.status = ThreadState::Exited;
        self.entry = None;
        self.arg = ptr::null_mut();
        self.return_value = ptr::null_mut();
        self.joined_by = None;
        self.joined = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_id_round_trips_raw_value() {
        let id = ThreadId::from_raw(42);
        assert_eq!(id.as_raw(), 42);
        assert_eq!(format!("{}", id), "42");
    }

    #[test]
    fn vacant_slot_is_terminal_and_empty() {
        let tcb = Tcb::VACANT;
        assert_eq!(tcb.status, ThreadState::Exited);
        assert!(!tcb.is_runnable());
        assert!(tcb.stack.is_none());
        assert!(tcb.entry.is_none());
        assert!(tcb.joined_by.is_none());
        assert!(!tcb.joined);
    }

    #[test]
    fn reset_clears_everything_but_the_id() {
        let mut tcb = Tcb::VACANT;
        tcb.id = ThreadId(7);
        tcb.status = ThreadState::Blocked;
        tcb.stack = Stack::allocate();
        tcb.joined_by = Some(3);
        tcb.joined = true;

        tcb.reset();

        assert_eq!(tcb.id, ThreadId(7));
        assert_eq!(tcb.status, ThreadState::Exited);
        assert!(tcb.stack.is_none());
        assert!(tcb.joined_by.is_none());
        assert!(!tcb.joined);
    }
}
