//! Counting semaphores with FIFO blocking queues.
//!
//! A [`Semaphore`] is a small copyable handle over a unique key in a fixed
//! insertion-ordered directory. Keys are never reissued, so a handle left
//! over from a destroyed semaphore keeps failing with `Uninitialized`
//! instead of silently aliasing a newer one.

use std::collections::VecDeque;

use crate::arch::{save_context, Context};
use crate::errors::SemError;
use crate::gate;
use crate::runtime;
use crate::thread::ThreadState;

/// Capacity of the semaphore directory.
pub const MAX_SEMAPHORES: usize = 128;

/// Exclusive upper bound on a semaphore's value.
pub const SEM_VALUE_MAX: u32 = 65536;

const INITIAL_QUEUE_CAPACITY: usize = 16;

/// Handle to one counting semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Semaphore {
    key: u64,
}

pub(crate) struct SemRecord {
    pub(crate) value: u32,
    /// Slots of threads blocked in wait, oldest first.
    pub(crate) queue: VecDeque<usize>,
}

/// The (handle → record) directory. Insertion-ordered; removal preserves
/// the relative order of the remaining entries.
pub(crate) struct SemTable {
    entries: Vec<(u64, SemRecord)>,
    next_key: u64,
}

impl SemTable {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_key: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn insert(&mut self, value: u32) -> Result<u64, SemError> {
        if value >= SEM_VALUE_MAX {
            return Err(SemError::ValueTooLarge(value));
        }
        if self.entries.len() == MAX_SEMAPHORES {
            return Err(SemError::OutOfSemaphores);
        }
        let key = self.next_key;
        self.next_key += 1;
        self.entries.push((
            key,
            SemRecord {
                value,
                queue: VecDeque::with_capacity(INITIAL_QUEUE_CAPACITY),
            },
        ));
        Ok(key)
    }

    pub(crate) fn get_mut(&mut self, key: u64) -> Option<&mut SemRecord> {
        self.entries
            .iter_mut()
            .find(|(k, _)| *k == key)
            .map(|(_, record)| record)
    }

    pub(crate) fn remove(&mut self, key: u64) -> Result<(), SemError> {
        let position = self
            .entries
            .iter()
            .position(|(k, _)| *k == key)
            .ok_or(SemError::Uninitialized)?;
        self.entries.remove(position);
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

enum WaitStep {
    Acquired,
    Block(*mut Context),
}

impl Semaphore {
    /// Create a semaphore with the given initial value.
    ///
    /// Semaphores are process-local; there is no shared mode.
    pub fn new(value: u32) -> Result<Self, SemError> {
        gate::enter_critical();
        let key = unsafe { runtime::with(|rt| rt.sems.insert(value)) };
        gate::leave_critical();
        let key = key?;
        log::trace!("semaphore {} initialized with value {}", key, value);
        Ok(Self { key })
    }

    /// Decrement the semaphore, blocking while its value is zero.
    ///
    /// Blocked waiters are resumed in FIFO order. A post that wakes this
    /// waiter hands the slot over directly, so the resumed path does not
    /// touch the value.
    pub fn wait(self) -> Result<(), SemError> {
        gate::enter_critical();

        let step = unsafe {
            runtime::with(|rt| {
                let blocks = match rt.sems.get_mut(self.key) {
                    None => return Err(SemError::Uninitialized),
                    Some(record) => {
                        if record.value > 0 {
                            record.value -= 1;
                            false
                        } else {
                            true
                        }
                    }
                };
                if !blocks {
                    return Ok(WaitStep::Acquired);
                }
                // Blocking needs somewhere to schedule to; first use of the
                // runtime adopts the caller as the primary thread.
                runtime::ensure_initialized(rt);
                let caller = rt.current;
                if let Some(record) = rt.sems.get_mut(self.key) {
                    record.queue.push_back(caller);
                }
                rt.threads[caller].status = ThreadState::Blocked;
                Ok(WaitStep::Block(
                    &mut rt.threads[caller].context as *mut Context,
                ))
            })
        };

        match step {
            Err(e) => {
                gate::leave_critical();
                Err(e)
            }
            Ok(WaitStep::Acquired) => {
                gate::leave_critical();
                Ok(())
            }
            Ok(WaitStep::Block(ctx)) => {
                unsafe {
                    if save_context(ctx) == 0 {
                        runtime::schedule_and_jump()
                    }
                }
                // Resumed by a post; the jump left the gate closed.
                gate::leave_critical();
                Ok(())
            }
        }
    }

    /// Increment the semaphore or wake its oldest waiter.
    ///
    /// Never yields: a woken thread becomes Ready and runs when the
    /// scheduler reaches it.
    pub fn post(self) -> Result<(), SemError> {
        gate::enter_critical();
        let result = unsafe {
            runtime::with(|rt| {
                let record = match rt.sems.get_mut(self.key) {
                    None => return Err(SemError::Uninitialized),
                    Some(record) => record,
                };
                if let Some(slot) = record.queue.pop_front() {
                    rt.threads[slot].status = ThreadState::Ready;
                    Ok(())
                } else if record.value < SEM_VALUE_MAX - 1 {
                    record.value += 1;
                    Ok(())
                } else {
                    Err(SemError::Overflow)
                }
            })
        };
        gate::leave_critical();
        result
    }

    /// Destroy the semaphore and remove it from the directory.
    ///
    /// Threads still blocked on it stay blocked; destroying a semaphore
    /// with waiters is a usage error, as it is in POSIX.
    pub fn destroy(self) -> Result<(), SemError> {
        gate::enter_critical();
        let result = unsafe { runtime::with(|rt| rt.sems.remove(self.key)) };
        gate::leave_critical();
        if result.is_ok() {
            log::trace!("semaphore {} destroyed", self.key);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_values_at_the_maximum() {
        let mut table = SemTable::new();
        assert_eq!(
            table.insert(SEM_VALUE_MAX),
            Err(SemError::ValueTooLarge(SEM_VALUE_MAX))
        );
        assert!(table.insert(SEM_VALUE_MAX - 1).is_ok());
    }

    #[test]
    fn directory_capacity_is_enforced() {
        let mut table = SemTable::new();
        for _ in 0..MAX_SEMAPHORES {
            table.insert(1).unwrap();
        }
        assert_eq!(table.insert(1), Err(SemError::OutOfSemaphores));

        // Destroying one frees a slot again.
        table.remove(0).unwrap();
        assert!(table.insert(1).is_ok());
    }

    #[test]
    fn removal_preserves_relative_order() {
        let mut table = SemTable::new();
        let a = table.insert(0).unwrap();
        let b = table.insert(1).unwrap();
        let c = table.insert(2).unwrap();

        table.remove(b).unwrap();

        let keys: Vec<u64> = table.entries.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![a, c]);
    }

    #[test]
    fn stale_keys_never_alias_new_records() {
        let mut table = SemTable::new();
        let old = table.insert(5).unwrap();
        table.remove(old).unwrap();
        let new = table.insert(7).unwrap();

        assert_ne!(old, new);
        assert!(table.get_mut(old).is_none());
        assert_eq!(table.get_mut(new).unwrap().value, 7);
        assert_eq!(table.remove(old), Err(SemError::Uninitialized));
    }

    #[test]
    fn queue_starts_with_reserved_capacity() {
        let mut table = SemTable::new();
        let key = table.insert(0).unwrap();
        let record = table.get_mut(key).unwrap();
        assert!(record.queue.capacity() >= INITIAL_QUEUE_CAPACITY);
    }

    #[test]
    fn clear_empties_the_directory() {
        let mut table = SemTable::new();
        table.insert(1).unwrap();
        table.insert(2).unwrap();
        table.clear();
        assert_eq!(table.len(), 0);
    }
}
