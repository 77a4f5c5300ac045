//! Architecture abstraction layer for context switching and interrupts.
//!
//! The context-switch primitive and the interrupt controller are both
//! external collaborators (§1): this crate depends on a routine that saves
//! callee-saved registers and loads a successor's, and on enable/disable/
//! query operations for the interrupt level. `Arch` is that seam.

/// Architecture abstraction trait.
///
/// # Safety
///
/// Implementations involve direct hardware manipulation. All methods with
/// preconditions document them; violating one is undefined behavior.
pub trait Arch {
    /// Holds exactly the callee-saved registers `switch_threads` preserves
    /// across a context switch (§4.3, §9: "saves callee-saved registers").
    type SavedContext: Send + Sync + Default;

    /// Switch from `prev`'s context to `next`'s.
    ///
    /// # Safety
    /// - `prev` and `next` must point to valid, live `SavedContext`s.
    /// - Must be called with interrupts disabled.
    /// - Returns on the far side of a later switch back into `prev`, at
    ///   which point the caller is responsible for calling
    ///   `thread_schedule_tail`.
    unsafe fn context_switch(prev: *mut Self::SavedContext, next: *const Self::SavedContext);

    /// Enable interrupt delivery on the current CPU.
    fn enable_interrupts();

    /// Disable interrupt delivery on the current CPU, returning whether
    /// interrupts were enabled beforehand (so callers can restore the
    /// prior level rather than unconditionally enabling).
    fn disable_interrupts() -> bool;

    /// Whether interrupts are currently enabled.
    fn interrupts_enabled() -> bool;

    /// Whether the caller is currently executing in interrupt (tick)
    /// context. `thread_unblock`'s supersession branch and `thread_exit`
    /// consult this (§4.4).
    fn in_interrupt_context() -> bool;

    /// Request that the interrupt-return path yield before resuming the
    /// interrupted thread, rather than switching immediately. Used by the
    /// tick handler (§4.6 step 5) instead of calling `thread_yield`
    /// directly from IRQ context.
    fn request_yield_on_return();

    /// Halt the CPU until the next interrupt. Used by the idle thread.
    ///
    /// # Safety
    /// Must be called with interrupts enabled, or the CPU halts forever.
    unsafe fn wait_for_interrupt();

    /// The running thread's current stack pointer, used to recover its TCB
    /// by page-aligning downward (§9 "self-referential TCB").
    fn current_sp() -> usize;

    /// Build the saved context for a freshly created thread that has never
    /// run: the stack pointer is set to the top of its page and the return
    /// address is set to `entry_trampoline`, so the first `context_switch`
    /// into this thread resumes there with an empty (zeroed) register file
    /// (§4.3: "a context-switch frame whose ... saved base pointer is
    /// zero").
    fn init_context(ctx: &mut Self::SavedContext, sp: usize, entry_trampoline: usize);
}

/// A no-op architecture implementation for host-side unit tests. Unlike the
/// teacher's `NoOpArch` (which hardcodes `interrupts_enabled` to always
/// return `true`), this one tracks a real flag: `Kernel` asserts interrupts
/// are disabled across most lifecycle operations (§4.4-§4.6), and a stub
/// that can never report "disabled" would make every such assert fail in
/// tests. `context_switch` still does nothing -- on this harness `schedule`
/// always falls through to `thread_schedule_tail` synchronously, which is
/// what lets tests observe post-switch state without real stack switching.
///
/// The flag is kept per-test-thread (not one process-wide static): `cargo
/// test` runs each `#[test]` on its own OS thread by default, and every test
/// in this crate builds its own `leaked_kernel()`/`Thread`s and flips this
/// flag independently, so a single shared flag would let unrelated tests
/// race on each other's interrupt state.
pub struct NoOpArch;

#[cfg(test)]
std::thread_local! {
    static INTERRUPTS_ENABLED: core::cell::Cell<bool> = const { core::cell::Cell::new(true) };
}

#[cfg(not(test))]
static INTERRUPTS_ENABLED: portable_atomic::AtomicBool = portable_atomic::AtomicBool::new(true);

impl Arch for NoOpArch {
    type SavedContext = ();

    unsafe fn context_switch(_prev: *mut Self::SavedContext, _next: *const Self::SavedContext) {}

    #[cfg(test)]
    fn enable_interrupts() {
        INTERRUPTS_ENABLED.with(|f| f.set(true));
    }

    #[cfg(not(test))]
    fn enable_interrupts() {
        INTERRUPTS_ENABLED.store(true, portable_atomic::Ordering::Release);
    }

    #[cfg(test)]
    fn disable_interrupts() -> bool {
        INTERRUPTS_ENABLED.with(|f| f.replace(false))
    }

    #[cfg(not(test))]
    fn disable_interrupts() -> bool {
        INTERRUPTS_ENABLED.swap(false, portable_atomic::Ordering::AcqRel)
    }

    #[cfg(test)]
    fn interrupts_enabled() -> bool {
        INTERRUPTS_ENABLED.with(|f| f.get())
    }

    #[cfg(not(test))]
    fn interrupts_enabled() -> bool {
        INTERRUPTS_ENABLED.load(portable_atomic::Ordering::Acquire)
    }

    fn in_interrupt_context() -> bool {
        false
    }

    fn request_yield_on_return() {}

    unsafe fn wait_for_interrupt() {}

    fn current_sp() -> usize {
        0
    }

    fn init_context(_ctx: &mut Self::SavedContext, _sp: usize, _entry_trampoline: usize) {}
}

#[cfg(target_arch = "aarch64")]
pub mod aarch64;

#[cfg(target_arch = "aarch64")]
pub use aarch64::Aarch64Arch as DefaultArch;

#[cfg(not(target_arch = "aarch64"))]
pub use NoOpArch as DefaultArch;
