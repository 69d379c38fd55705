//! Architecture support for stack-switching contexts.
//!
//! A context is the minimal callee-saved register set needed to pause an
//! execution and resume it later, plus the machinery to hand-forge a context
//! whose restoration enters a chosen function on a chosen stack. The layout
//! is fixed by the host ABI; only x86-64 System-V is supported.

#[cfg(all(target_arch = "x86_64", unix))]
pub mod x86_64;

#[cfg(all(target_arch = "x86_64", unix))]
pub use x86_64::{fabricate, restore_context, save_context, Context};

#[cfg(not(all(target_arch = "x86_64", unix)))]
compile_error!("uthreads only supports x86_64 System-V Unix hosts");
