//! Thread scheduling.
//!
//! Selection is a pure function of the thread table and the current slot;
//! the caller (the runtime) applies the chosen transition. Keeping the
//! policy free of side effects is what makes it testable under random
//! interleavings.

pub mod rr;

pub use rr::{pick_next, Decision};
