//! Error types for the threading runtime.
//!
//! Every fallible operation reports through a return value; nothing is
//! retried internally and nothing panics. Each layer has its own error enum,
//! and [`UthreadError`] folds them together for callers that funnel several
//! operations through one `Result`.

use core::fmt;

/// Result type for runtime operations.
pub type UthreadResult<T> = Result<T, UthreadError>;

/// Umbrella error for all runtime operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UthreadError {
    /// Thread creation errors
    Spawn(SpawnError),
    /// Thread joining errors
    Join(JoinError),
    /// Semaphore errors
    Sem(SemError),
}

/// Errors that can occur while creating a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// The thread table is full.
    TooManyThreads,
    /// Stack allocation failed.
    OutOfMemory,
}

/// Errors that can occur while joining a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// No thread was ever created with the given id.
    NoSuchThread,
    /// The target was already reclaimed by an earlier join, or another
    /// thread is already blocked joining it.
    AlreadyJoined,
    /// The caller asked to join itself.
    WouldDeadlock,
}

impl JoinError {
    /// The POSIX errno this error corresponds to.
    pub fn errno(self) -> i32 {
        match self {
            JoinError::NoSuchThread => libc::ESRCH,
            JoinError::AlreadyJoined => libc::EINVAL,
            JoinError::WouldDeadlock => libc::EDEADLK,
        }
    }
}

/// Errors that can occur on semaphore operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemError {
    /// The requested initial value is at or above the maximum.
    ValueTooLarge(u32),
    /// The semaphore directory is full.
    OutOfSemaphores,
    /// The handle was never initialized or was already destroyed.
    Uninitialized,
    /// A post with no waiter would push the value past the maximum.
    Overflow,
}

impl fmt::Display for UthreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UthreadError::Spawn(e) => write!(f, "thread creation error: {}", e),
            UthreadError::Join(e) => write!(f, "thread join error: {}", e),
            UthreadError::Sem(e) => write!(f, "semaphore error: {}", e),
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::TooManyThreads => write!(f, "maximum number of threads reached"),
            SpawnError::OutOfMemory => write!(f, "stack allocation failed"),
        }
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::NoSuchThread => write!(f, "no such thread"),
            JoinError::AlreadyJoined => write!(f, "thread already joined"),
            JoinError::WouldDeadlock => write!(f, "joining self would deadlock"),
        }
    }
}

impl fmt::Display for SemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemError::ValueTooLarge(v) => write!(f, "semaphore value too large: {}", v),
            SemError::OutOfSemaphores => write!(f, "semaphore directory full"),
            SemError::Uninitialized => write!(f, "semaphore not initialized"),
            SemError::Overflow => write!(f, "semaphore value would overflow"),
        }
    }
}

impl std::error::Error for UthreadError {}
impl std::error::Error for SpawnError {}
impl std::error::Error for JoinError {}
impl std::error::Error for SemError {}

impl From<SpawnError> for UthreadError {
    fn from(error: SpawnError) -> Self {
        UthreadError::Spawn(error)
    }
}

impl From<JoinError> for UthreadError {
    fn from(error: JoinError) -> Self {
        UthreadError::Join(error)
    }
}

impl From<SemError> for UthreadError {
    fn from(error: SemError) -> Self {
        UthreadError::Sem(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_errors_map_to_posix_codes() {
        assert_eq!(JoinError::NoSuchThread.errno(), libc::ESRCH);
        assert_eq!(JoinError::AlreadyJoined.errno(), libc::EINVAL);
        assert_eq!(JoinError::WouldDeadlock.errno(), libc::EDEADLK);
    }

    #[test]
    fn umbrella_conversions() {
        let e: UthreadError = SpawnError::TooManyThreads.into();
        assert_eq!(e, UthreadError::Spawn(SpawnError::TooManyThreads));
        let e: UthreadError = JoinError::NoSuchThread.into();
        assert_eq!(e, UthreadError::Join(JoinError::NoSuchThread));
        let e: UthreadError = SemError::Overflow.into();
        assert_eq!(e, UthreadError::Sem(SemError::Overflow));
    }

    #[test]
    fn display_is_human_readable() {
        let msg = format!("{}", UthreadError::Sem(SemError::ValueTooLarge(70000)));
        assert!(msg.contains("70000"));
    }
}
