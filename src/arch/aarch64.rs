//! AArch64 `Arch` implementation.
//!
//! Only the callee-saved registers (AAPCS64: x19-x28, the frame pointer
//! x29, the link register x30, and sp) are preserved across a context
//! switch — the caller-saved registers and PC are reconstructed by the
//! function-call ABI itself, exactly as Design Note §9 describes
//! ("saves callee-saved registers and loads them from a successor").
//! The interrupt vector table, GIC, and boot sequence that would drive
//! `in_interrupt_context`/timer delivery on real hardware are external
//! collaborators and live outside this crate.

use super::Arch;
use core::arch::asm;
use portable_atomic::{AtomicBool, Ordering};

static IN_IRQ: AtomicBool = AtomicBool::new(false);
static YIELD_ON_RETURN: AtomicBool = AtomicBool::new(false);

/// Callee-saved register file, per AAPCS64.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Aarch64Context {
    pub x19: u64,
    pub x20: u64,
    pub x21: u64,
    pub x22: u64,
    pub x23: u64,
    pub x24: u64,
    pub x25: u64,
    pub x26: u64,
    pub x27: u64,
    pub x28: u64,
    pub fp: u64,
    pub lr: u64,
    pub sp: u64,
}

impl Default for Aarch64Context {
    fn default() -> Self {
        Aarch64Context {
            x19: 0, x20: 0, x21: 0, x22: 0, x23: 0, x24: 0, x25: 0, x26: 0,
            x27: 0, x28: 0, fp: 0, lr: 0, sp: 0,
        }
    }
}

unsafe impl Send for Aarch64Context {}
unsafe impl Sync for Aarch64Context {}

pub struct Aarch64Arch;

impl Arch for Aarch64Arch {
    type SavedContext = Aarch64Context;

    unsafe fn context_switch(prev: *mut Self::SavedContext, next: *const Self::SavedContext) {
        unsafe {
            asm!(
                // Save callee-saved registers of the outgoing thread.
                "stp x19, x20, [x0, #0]",
                "stp x21, x22, [x0, #16]",
                "stp x23, x24, [x0, #32]",
                "stp x25, x26, [x0, #48]",
                "stp x27, x28, [x0, #64]",
                "stp x29, x30, [x0, #80]",
                "mov x9, sp",
                "str x9, [x0, #96]",

                // Load callee-saved registers of the incoming thread.
                "ldp x19, x20, [x1, #0]",
                "ldp x21, x22, [x1, #16]",
                "ldp x23, x24, [x1, #32]",
                "ldp x25, x26, [x1, #48]",
                "ldp x27, x28, [x1, #64]",
                "ldp x29, x30, [x1, #80]",
                "ldr x9, [x1, #96]",
                "mov sp, x9",
                // Returning here resumes the incoming thread at its saved lr.
                "ret",
                in("x0") prev,
                in("x1") next,
                out("x9") _,
                options(noreturn),
            );
        }
    }

    fn enable_interrupts() {
        unsafe { asm!("msr daifclr, #2", options(nomem, nostack)) };
    }

    fn disable_interrupts() -> bool {
        let was_enabled = Self::interrupts_enabled();
        unsafe { asm!("msr daifset, #2", options(nomem, nostack)) };
        was_enabled
    }

    fn interrupts_enabled() -> bool {
        let daif: u64;
        unsafe { asm!("mrs {}, daif", out(reg) daif, options(nomem, nostack)) };
        daif & (1 << 7) == 0
    }

    fn in_interrupt_context() -> bool {
        IN_IRQ.load(Ordering::Acquire)
    }

    fn request_yield_on_return() {
        YIELD_ON_RETURN.store(true, Ordering::Release);
    }

    unsafe fn wait_for_interrupt() {
        unsafe { asm!("wfi", options(nomem, nostack)) };
    }

    fn current_sp() -> usize {
        let sp: usize;
        unsafe { asm!("mov {}, sp", out(reg) sp, options(nomem, nostack)) };
        sp
    }

    fn init_context(ctx: &mut Self::SavedContext, sp: usize, entry_trampoline: usize) {
        *ctx = Aarch64Context {
            sp: sp as u64,
            lr: entry_trampoline as u64,
            fp: 0,
            ..Aarch64Context::default()
        };
    }
}

/// Entered by the timer IRQ vector before calling into `thread_tick`, and
/// exited before returning to the interrupted thread. The real vector
/// table that calls these is out of scope, but the bit they flip is the
/// seam `Arch::in_interrupt_context` and `thread_unblock`'s supersession
/// check both depend on.
pub fn enter_irq() {
    IN_IRQ.store(true, Ordering::Release);
}

pub fn leave_irq() -> bool {
    IN_IRQ.store(false, Ordering::Release);
    YIELD_ON_RETURN.swap(false, Ordering::AcqRel)
}
