//! Internal test suite.
//!
//! Everything here runs against local `Runtime` instances or the pure
//! pieces (scheduler, semaphore directory, context fabrication). The full
//! preemptive paths (signal delivery and stack jumps) are exercised by
//! the scenario drivers under `demos/`, one process each, because they
//! install the process-wide SIGALRM handler.

mod helpers;
mod unit;
