//! Bootstrap frame construction (§4.3) and the ergonomic `ThreadBuilder`
//! wrapper over `Kernel::thread_create` (SPEC_FULL §10).
//!
//! Pintos pushes three raw stack frames by hand (a kernel-entry frame, an
//! entry-stub frame, and a context-switch frame) so that the first
//! `context_switch` into a brand new thread lands in a trampoline that
//! calls the thread's start function and then `thread_exit`. This crate's
//! `Arch::init_context` generalizes that trick: instead of hand-assembling
//! frames, it hands the architecture a single resume address
//! (`kernel_thread_trampoline`) and a stack pointer, and the architecture
//! is responsible for making the first `context_switch` land there.

use core::ptr::NonNull;

use crate::arch::Arch;
use crate::thread::Thread;

/// Wire up a freshly `init_thread`-ed TCB so that its first scheduling
/// begins executing `entry(aux)` via [`kernel_thread_trampoline`].
///
/// # Safety
/// `t` must own a live, allocator-backed stack page (i.e. `stack_page()`
/// is `Some`), and must not have been scheduled yet.
pub(crate) unsafe fn install_bootstrap_frame<A: Arch>(
    t: NonNull<Thread<A>>,
    entry: fn(usize),
    aux: usize,
) {
    unsafe {
        (*t.as_ptr()).entry = Some(entry);
        (*t.as_ptr()).aux = aux;
        let page = (*t.as_ptr())
            .stack_page()
            .expect("install_bootstrap_frame requires an allocated stack page");
        let sp = Thread::<A>::stack_top(page) as usize;
        let ctx = (*t.as_ptr()).context.get();
        A::init_context(&mut *ctx, sp, kernel_thread_trampoline::<A> as usize);
    }
}

/// The landing point for a new thread's first `context_switch` (§4.3,
/// §4.5's `thread_schedule_tail`). Runs `thread_schedule_tail` for
/// whichever thread we switched away from, enables interrupts, invokes
/// the thread's entry point, and calls `thread_exit` on return -- no
/// kernel thread escapes cleanup.
///
/// This is `extern "C"` because it is the address `Arch::init_context`
/// installs as a raw resume target; a real `Arch` impl reaches it via a
/// bare `ret`/branch, not a Rust call.
pub(crate) extern "C" fn kernel_thread_trampoline<A: Arch>() -> ! {
    let kernel = crate::kernel::global_kernel::<A>();
    let prev = kernel.take_switching_from();
    kernel.thread_schedule_tail(prev);

    A::enable_interrupts();

    let t = unsafe { Thread::<A>::current_from_sp(A::current_sp()) };
    let entry = t.entry.expect("bootstrapped thread has no entry point");
    let aux = t.aux;
    entry(aux);

    kernel.thread_exit();
    // `thread_exit` does not return on real hardware (§4.4): the dying
    // thread is never switched back into. On the `NoOpArch` host test
    // harness, where `context_switch` never truly transfers control,
    // `thread_exit` *does* return to let tests observe the post-exit
    // state -- see its doc comment in `thread/lifecycle.rs`.
    loop {
        unsafe { A::wait_for_interrupt() };
    }
}

extern crate alloc;
use alloc::string::String;

/// Ergonomic wrapper over [`crate::kernel::Kernel::thread_create`]
/// (SPEC_FULL §10), mirroring the teacher's `ThreadBuilder`. Sugar only:
/// it still goes through `thread_create`'s page-allocation and
/// frame-construction path, one page and one `tid` per thread.
pub struct ThreadBuilder {
    name: String,
    priority: u8,
}

impl ThreadBuilder {
    pub fn new() -> Self {
        ThreadBuilder { name: String::from("thread"), priority: crate::thread::PRI_DEFAULT }
    }

    pub fn name<T: Into<String>>(mut self, name: T) -> Self {
        self.name = name.into();
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Create the thread via `kernel.thread_create(..)`. `aux` is passed
    /// through to `entry` verbatim -- this crate has no closure-capturing
    /// spawn path, since the bootstrap trampoline calls `entry` as a bare
    /// `fn(usize)` (§4.3).
    pub fn spawn<A: crate::arch::Arch>(
        self,
        kernel: &crate::kernel::Kernel<A>,
        entry: fn(usize),
        aux: usize,
    ) -> crate::errors::ThreadResult<i32> {
        kernel.thread_create(&self.name, self.priority, entry, aux)
    }
}

impl Default for ThreadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{Arch, NoOpArch};
    use crate::config::Config;
    use crate::console::NullConsole;
    use crate::mem::page::FreeListPageAllocator;

    extern crate std;
    use std::boxed::Box;

    fn leaked_kernel() -> &'static crate::kernel::Kernel<NoOpArch> {
        let alloc: &'static FreeListPageAllocator =
            Box::leak(Box::new(FreeListPageAllocator::new()));
        let console: &'static NullConsole = Box::leak(Box::new(NullConsole));
        let kernel = Box::leak(Box::new(crate::kernel::Kernel::<NoOpArch>::new(
            Config::new(false, 100),
            alloc,
            console,
        )));
        let boot_page = alloc.alloc_zero_page().unwrap();
        NoOpArch::disable_interrupts();
        unsafe { kernel.thread_init(boot_page) };
        kernel
    }

    fn noop_entry(_aux: usize) {}

    #[test]
    fn builder_creates_a_thread() {
        let kernel = leaked_kernel();
        let tid = ThreadBuilder::new()
            .name("worker")
            .priority(40)
            .spawn(kernel, noop_entry, 0)
            .expect("spawn");
        assert!(tid > crate::thread::tid::INITIAL_TID);
    }
}
