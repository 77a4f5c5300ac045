//! The `Kernel`: process-wide scheduler state and the public operations
//! listed in §6 (External Interfaces).
//!
//! Everything here is "process-wide" in spec terms (§5): the ready set,
//! wait set, roster, idle/initial pointers, `load_avg`, and tick counters
//! all live on this one struct, mutated only with interrupts disabled.
//! Single CPU, so plain `Cell`s and uncontended `spin::Mutex`es stand in
//! for what would need real atomics or per-CPU state on SMP — grounded on
//! the teacher's own `Kernel<A, S>` + `GLOBAL_KERNEL` pattern.

use core::cell::Cell;
use core::marker::PhantomData;
use core::ptr::NonNull;

use portable_atomic::{AtomicBool, AtomicPtr, Ordering};
use spin::Mutex;

use crate::arch::Arch;
use crate::config::Config;
use crate::console::Console;
use crate::errors::ThreadResult;
use crate::fixed_point::Fp;
use crate::mem::page::alloc_zero_page;
use crate::mem::{List, PageAllocator};
use crate::sched::ready_set::{AnyReadySet, ReadySet};
use crate::sched::wait_set::WaitSet;
use crate::thread::tid::TidAllocator;
use crate::thread::{Status, Thread, PRI_MIN};

static GLOBAL_KERNEL: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

pub struct Kernel<A: Arch> {
    pub(crate) config: Config,
    pub(crate) page_alloc: &'static dyn PageAllocator,
    pub(crate) console: &'static dyn Console,
    pub(crate) tid_alloc: TidAllocator,
    pub(crate) all_list: Mutex<List<Thread<A>>>,
    pub(crate) ready_set: Mutex<AnyReadySet<A>>,
    pub(crate) wait_set: Mutex<WaitSet<A>>,
    pub(crate) current: Cell<Option<NonNull<Thread<A>>>>,
    pub(crate) idle: Cell<Option<NonNull<Thread<A>>>>,
    pub(crate) initial: Cell<Option<NonNull<Thread<A>>>>,
    pub(crate) load_avg: Cell<Fp>,
    pub(crate) thread_ticks: Cell<u32>,
    pub(crate) total_ticks: Cell<u64>,
    pub(crate) idle_ticks: Cell<u64>,
    pub(crate) kernel_ticks: Cell<u64>,
    pub(crate) user_ticks: Cell<u64>,
    /// The thread we are switching away from, stashed immediately before
    /// `Arch::context_switch` so that whichever code resumes next -- the
    /// switched-away-from thread's own `schedule()` call, or a brand new
    /// thread's bootstrap trampoline -- can find `prev` for
    /// `thread_schedule_tail` without relying on a register-return
    /// convention from the context switch itself (§4.5, §9).
    pub(crate) switching_from: Cell<Option<NonNull<Thread<A>>>>,
    idle_ready: AtomicBool,
    _marker: PhantomData<A>,
}

unsafe impl<A: Arch> Send for Kernel<A> {}
unsafe impl<A: Arch> Sync for Kernel<A> {}

impl<A: Arch> Kernel<A> {
    pub fn new(
        config: Config,
        page_alloc: &'static dyn PageAllocator,
        console: &'static dyn Console,
    ) -> Self {
        let mut all_list = List::new();
        all_list.init();
        Kernel {
            config,
            page_alloc,
            console,
            tid_alloc: TidAllocator::new(),
            all_list: Mutex::new(all_list),
            ready_set: Mutex::new(AnyReadySet::new(config.mlfqs)),
            wait_set: Mutex::new(WaitSet::new()),
            current: Cell::new(None),
            idle: Cell::new(None),
            initial: Cell::new(None),
            load_avg: Cell::new(Fp::ZERO),
            thread_ticks: Cell::new(0),
            total_ticks: Cell::new(0),
            idle_ticks: Cell::new(0),
            kernel_ticks: Cell::new(0),
            user_ticks: Cell::new(0),
            switching_from: Cell::new(None),
            idle_ready: AtomicBool::new(false),
            _marker: PhantomData,
        }
    }

    /// Bootstrap the initial ("main") thread from the currently running
    /// context (§4.2, §4.8). Must be called with interrupts off, before
    /// any allocator use (§6). `boot_page` is the page-aligned memory the
    /// boot sequence is already running on — not allocator-owned, so it is
    /// never freed by `thread_schedule_tail` (§3 Lifecycle).
    ///
    /// # Safety
    /// `boot_page` must be `PAGE_SIZE`-aligned and large enough to hold a
    /// `Thread<A>` plus whatever stack the boot sequence still needs.
    pub unsafe fn thread_init(&self, boot_page: NonNull<u8>) -> NonNull<Thread<A>> {
        assert!(!A::interrupts_enabled(), "thread_init requires interrupts disabled");
        let main = unsafe { Thread::init_thread(boot_page, "main", crate::thread::PRI_DEFAULT, None) };
        unsafe {
            (*main.as_ptr()).tid = crate::thread::tid::INITIAL_TID;
            (*main.as_ptr()).status = Status::Running;
        }
        self.link_roster(main);
        self.current.set(Some(main));
        self.initial.set(Some(main));
        main
    }

    /// Spawn the idle thread and enable interrupts (§4.8, §6). Busy-waits
    /// for the idle thread's first scheduling, mirroring the startup
    /// semaphore Pintos hands the idle thread.
    pub fn thread_start(&self) {
        self.spawn_idle();
        A::enable_interrupts();
        while !self.idle_ready.load(Ordering::Acquire) {
            core::hint::spin_loop();
        }
    }

    fn spawn_idle(&self) {
        let page = self.page_alloc.alloc_zero_page().expect("no page for idle thread");
        let current = self.current.get();
        let idle = unsafe { Thread::init_thread(page, "idle", PRI_MIN, current) };
        unsafe {
            (*idle.as_ptr()).tid = self.tid_alloc.allocate();
            crate::thread::builder::install_bootstrap_frame::<A>(
                idle,
                crate::thread::lifecycle::idle_entry::<A>,
                0,
            );
        }
        self.idle.set(Some(idle));
        // The idle thread is never enrolled in the roster or ready set
        // (§4.8): it is returned only as the empty-ready fallback.
        unsafe { (*idle.as_ptr()).status = Status::Blocked };
    }

    /// Called once, from inside the idle thread's own body, the first time
    /// it is scheduled (§4.8).
    pub fn mark_idle_ready(&self) {
        self.idle_ready.store(true, Ordering::Release);
    }

    fn link_roster(&self, t: NonNull<Thread<A>>) {
        unsafe {
            let node = NonNull::new_unchecked(&mut (*t.as_ptr()).all_link as *mut _);
            self.all_list.lock().push_back(node, t);
        }
    }

    fn unlink_roster(&self, t: NonNull<Thread<A>>) {
        unsafe {
            let node = NonNull::new_unchecked(&mut (*t.as_ptr()).all_link as *mut _);
            self.all_list.lock().remove(node);
        }
    }

    /// `thread_create` (§4.3): allocate a page, initialize the TCB, push
    /// the bootstrap frames, assign a `tid`, and unblock it.
    pub fn thread_create(
        &self,
        name: &str,
        priority: u8,
        entry: fn(usize),
        aux: usize,
    ) -> ThreadResult<i32> {
        let page = alloc_zero_page(self.page_alloc)?;
        let current = self.current.get();
        let t = unsafe { Thread::init_thread(page, name, priority, current) };

        if self.config.mlfqs && name != "main" && name != "idle" {
            if let Some(cur) = current {
                unsafe {
                    (*t.as_ptr()).nice = (*cur.as_ptr()).nice;
                    (*t.as_ptr()).recent_cpu = (*cur.as_ptr()).recent_cpu;
                    let pri = crate::sched::priority::recompute_priority(
                        (*t.as_ptr()).recent_cpu,
                        (*t.as_ptr()).nice,
                    );
                    (*t.as_ptr()).priority = pri;
                    (*t.as_ptr()).priority_orig = pri;
                }
            }
        }

        // `tid_alloc.allocate()` stays outside the interrupt-disabled window:
        // per §4.9's Open Question, `allocate_tid` is the one sleep-capable
        // lock this module touches, and callers must not hold interrupts
        // disabled across it. Linking onto `all_list`, though, is a
        // non-reentrant `spin::Mutex` also walked by `thread_tick`'s MLFQ
        // recompute pass (§4.2: "under interrupt disable") — without this,
        // a timer interrupt landing mid-`push_back` would deadlock the IRQ
        // handler spinning on a lock this thread already holds.
        let tid = self.tid_alloc.allocate();
        unsafe { (*t.as_ptr()).tid = tid };

        let was_enabled = A::disable_interrupts();
        self.link_roster(t);
        if was_enabled {
            A::enable_interrupts();
        }

        unsafe { crate::thread::builder::install_bootstrap_frame::<A>(t, entry, aux) };

        self.console.write_line(&alloc::format!(
            "[CREATE] T{} '{}' priority={}",
            tid,
            name,
            priority
        ));

        self.thread_unblock(t);
        Ok(tid)
    }

    /// `thread_current` (§6): asserts the caller is on a valid thread
    /// stack. This crate tracks the running thread explicitly (updated by
    /// `thread_schedule_tail`) rather than re-deriving it from `sp` on
    /// every call — see `DESIGN.md` for why that's equivalent here.
    pub fn thread_current(&self) -> NonNull<Thread<A>> {
        let t = self.current.get().expect("thread_current() before thread_init()");
        unsafe { t.as_ref() }.assert_not_corrupted();
        t
    }

    pub fn thread_tid(&self) -> i32 {
        unsafe { self.thread_current().as_ref().tid }
    }

    pub fn thread_name(&self) -> &str {
        unsafe { self.thread_current().as_ref().name() }
    }

    /// `thread_foreach` (§6, §10): visit every roster member with
    /// interrupts disabled.
    pub fn for_each_thread(&self, mut f: impl FnMut(&Thread<A>)) {
        assert!(!A::interrupts_enabled(), "thread_foreach requires interrupts disabled");
        for t in self.all_list.lock().iter() {
            f(unsafe { t.as_ref() });
        }
    }

    /// Scheduler statistics supplement (§10): `(total, ready, blocked)`.
    pub fn thread_stats(&self) -> (usize, usize, usize) {
        let was_enabled = A::disable_interrupts();
        let total = self.all_list.lock().len();
        let mut ready = 0;
        let mut blocked = 0;
        for t in self.all_list.lock().iter() {
            match unsafe { t.as_ref() }.status {
                Status::Ready => ready += 1,
                Status::Blocked => blocked += 1,
                _ => {}
            }
        }
        if was_enabled {
            A::enable_interrupts();
        }
        (total, ready, blocked)
    }

    pub(crate) fn unlink_roster_on_exit(&self, t: NonNull<Thread<A>>) {
        self.unlink_roster(t);
    }

    /// Registers this kernel as the process-wide instance so free
    /// functions like `thread_schedule_tail`'s IRQ-side caller can reach it
    /// without threading a reference through every call site.
    pub fn register_global(&'static self) {
        GLOBAL_KERNEL.store(self as *const _ as *mut (), Ordering::Release);
    }
}

/// Retrieve the registered global kernel. Panics if `register_global` was
/// never called — a programming error, per §7.
pub fn global_kernel<A: Arch>() -> &'static Kernel<A> {
    let ptr = GLOBAL_KERNEL.load(Ordering::Acquire);
    assert!(!ptr.is_null(), "Kernel::register_global was never called");
    unsafe { &*(ptr as *const Kernel<A>) }
}

extern crate alloc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::NoOpArch;
    use crate::mem::page::FreeListPageAllocator;

    extern crate std;
    use std::string::String;
    use std::sync::Mutex;
    use std::vec::Vec;

    /// Captures every line written through the `Console` seam, so tests can
    /// assert the scheduler actually logs through it rather than just
    /// storing the reference unused.
    struct CapturingConsole {
        lines: Mutex<Vec<String>>,
    }

    impl CapturingConsole {
        fn new() -> Self {
            CapturingConsole { lines: Mutex::new(Vec::new()) }
        }
    }

    impl Console for CapturingConsole {
        fn write_line(&self, line: &str) {
            self.lines.lock().unwrap().push(String::from(line));
        }
    }

    fn leaked_kernel() -> (&'static Kernel<NoOpArch>, &'static CapturingConsole) {
        let page_alloc: &'static FreeListPageAllocator =
            alloc::boxed::Box::leak(alloc::boxed::Box::new(FreeListPageAllocator::new()));
        let console: &'static CapturingConsole =
            alloc::boxed::Box::leak(alloc::boxed::Box::new(CapturingConsole::new()));
        let kernel: &'static Kernel<NoOpArch> = alloc::boxed::Box::leak(alloc::boxed::Box::new(
            Kernel::new(Config::new(false, 100), page_alloc, console),
        ));
        let boot_page = page_alloc.alloc_zero_page().unwrap();
        NoOpArch::disable_interrupts();
        unsafe { kernel.thread_init(boot_page) };
        (kernel, console)
    }

    fn noop(_aux: usize) {}

    #[test]
    fn thread_create_and_exit_log_through_console() {
        let (kernel, console) = leaked_kernel();
        kernel.thread_create("logger", crate::thread::PRI_DEFAULT, noop, 0).unwrap();

        NoOpArch::disable_interrupts();
        kernel.thread_yield();
        assert_eq!(kernel.thread_name(), "logger");
        kernel.thread_exit();

        let lines = console.lines.lock().unwrap();
        assert!(lines.iter().any(|l| l.contains("[CREATE]") && l.contains("logger")));
        assert!(lines.iter().any(|l| l.contains("[EXIT]")));
    }

    #[test]
    fn thread_stats_counts_total_ready_blocked() {
        let (kernel, _console) = leaked_kernel();
        kernel.thread_create("a", PRI_MIN, noop, 0).unwrap();
        let (total, _, _) = kernel.thread_stats();
        assert_eq!(total, 2, "main + the new thread");
    }
}
