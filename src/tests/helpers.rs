//! Shared helpers for the internal test suite.

use crate::thread::{Tcb, ThreadId, ThreadState};

/// Simple linear congruential generator for property testing.
pub(crate) struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub(crate) fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    pub(crate) fn gen_range(&mut self, min: u64, max: u64) -> u64 {
        min + (self.next_u64() % (max - min))
    }

    pub(crate) fn gen_bool(&mut self) -> bool {
        self.next_u64() & 1 == 0
    }
}

/// Build a thread table with the given statuses in slot order.
pub(crate) fn table(statuses: &[ThreadState]) -> Vec<Tcb> {
    statuses
        .iter()
        .enumerate()
        .map(|(slot, &status)| {
            let mut tcb = Tcb::VACANT;
            tcb.id = ThreadId::from_raw(slot);
            tcb.status = status;
            tcb
        })
        .collect()
}
