//! x86-64 System-V context save/restore.
//!
//! Only the callee-saved registers, the stack pointer, and the resume
//! address are kept: `save_context` is always reached through an ordinary
//! call, so everything caller-saved is already dead at the save point. The
//! same layout is patched directly when a new thread's context is forged.

use core::arch::naked_asm;

/// Saved CPU context for one paused thread.
///
/// Field order is load-bearing: the assembly below addresses the struct by
/// fixed byte offsets.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct Context {
    pub rbx: u64,
    pub rbp: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    /// Stack pointer as the resumed code will see it.
    pub rsp: u64,
    /// Address execution continues from on restore.
    pub rip: u64,
}

impl Context {
    pub const fn new() -> Self {
        Self {
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            rsp: 0,
            rip: 0,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

const _: () = {
    assert!(core::mem::size_of::<Context>() == 64);
    assert!(core::mem::offset_of!(Context, rsp) == 0x30);
    assert!(core::mem::offset_of!(Context, rip) == 0x38);
};

/// Capture the current execution point into `ctx`.
///
/// Returns 0 on the direct call. When another execution later runs
/// [`restore_context`] on the same buffer, control comes back out of this
/// function a second time with the restorer's non-zero `val` as the return
/// value.
///
/// # Safety
///
/// `ctx` must be valid for writes. The buffer only stays meaningful while
/// the frames below the save point are intact.
#[unsafe(naked)]
pub unsafe extern "C" fn save_context(_ctx: *mut Context) -> u64 {
    naked_asm!(
        "mov [rdi + 0x00], rbx",
        "mov [rdi + 0x08], rbp",
        "mov [rdi + 0x10], r12",
        "mov [rdi + 0x18], r13",
        "mov [rdi + 0x20], r14",
        "mov [rdi + 0x28], r15",
        // rsp as the caller will see it once we return.
        "lea rax, [rsp + 8]",
        "mov [rdi + 0x30], rax",
        // Return address doubles as the resume point.
        "mov rax, [rsp]",
        "mov [rdi + 0x38], rax",
        "xor eax, eax",
        "ret",
    );
}

/// Resume execution from `ctx`. Does not return.
///
/// The restored execution observes `save_context` returning `val` (coerced
/// to 1 if 0 was passed, so the direct path stays distinguishable).
///
/// # Safety
///
/// `ctx` must hold a context produced by [`save_context`] whose stack is
/// still live, or one forged by [`fabricate`] over an owned stack.
#[unsafe(naked)]
pub unsafe extern "C" fn restore_context(_ctx: *const Context, _val: u64) -> ! {
    naked_asm!(
        "mov rbx, [rdi + 0x00]",
        "mov rbp, [rdi + 0x08]",
        "mov r12, [rdi + 0x10]",
        "mov r13, [rdi + 0x18]",
        "mov r14, [rdi + 0x20]",
        "mov r15, [rdi + 0x28]",
        "mov rsp, [rdi + 0x30]",
        "mov rax, rsi",
        "test rax, rax",
        "jnz 2f",
        "mov eax, 1",
        "2:",
        "jmp qword ptr [rdi + 0x38]",
    );
}

/// Forge `ctx` so that restoring it enters `entry` on the stack whose
/// highest address is `stack_top`.
///
/// The buffer is first seeded with a live snapshot so the callee-saved
/// slots carry values that are safe to load, then the three slots that
/// matter are overwritten: rsp and rbp get the aligned top, rip gets the
/// entry. The top is aligned down to 16 and biased by 8 so `entry` sees
/// rsp ≡ 8 (mod 16), exactly as after a `call`. `entry` must never return;
/// the slot where its return address would live holds garbage.
pub fn fabricate(ctx: &mut Context, stack_top: *mut u8, entry: extern "C" fn() -> !) {
    unsafe {
        save_context(ctx);
    }
    let sp = ((stack_top as usize) & !0xF) - 8;
    ctx.rsp = sp as u64;
    ctx.rbp = sp as u64;
    ctx.rip = entry as usize as u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn never_entry() -> ! {
        unreachable!()
    }

    #[test]
    fn fabricate_aligns_and_targets_entry() {
        let mut ctx = Context::new();
        let mut fake_stack = [0u8; 256];
        let top = unsafe { fake_stack.as_mut_ptr().add(256) };

        fabricate(&mut ctx, top, never_entry);

        // ABI stack state at function entry: rsp ≡ 8 (mod 16).
        assert_eq!(ctx.rsp % 16, 8);
        assert!(ctx.rsp < top as u64);
        assert!(ctx.rsp >= fake_stack.as_ptr() as u64);
        assert_eq!(ctx.rbp, ctx.rsp);
        assert_eq!(ctx.rip, never_entry as usize as u64);
    }

    #[test]
    fn fabricate_handles_misaligned_top() {
        let mut ctx = Context::new();
        let mut fake_stack = [0u8; 256];
        // Deliberately odd top address.
        let top = unsafe { fake_stack.as_mut_ptr().add(253) };

        fabricate(&mut ctx, top, never_entry);
        assert_eq!(ctx.rsp % 16, 8);
        assert!(ctx.rsp < top as u64);
    }

    #[test]
    fn save_returns_zero_on_direct_call() {
        let mut ctx = Context::new();
        let direct = unsafe { save_context(&mut ctx) };
        assert_eq!(direct, 0);
        // The snapshot records a plausible stack pointer for this frame.
        assert_ne!(ctx.rsp, 0);
        assert_ne!(ctx.rip, 0);
    }
}
