//! Lifecycle operations, the scheduler core, the tick handler, and
//! priority assignment (spec §4.4-§4.8). These are all `impl<A: Arch>
//! Kernel<A>` methods, kept in their own module (rather than bloating
//! `kernel.rs`, which just owns the process-wide state) the way the
//! teacher splits `kernel.rs` (state + spawn) from the scheduling
//! algorithm itself.
//!
//! # The `switching_from` handoff
//!
//! Pintos's `switch_threads` returns (in a register, by a hand-written
//! assembly convention) the thread that was running just before the
//! *current* resumption -- `thread_schedule_tail`'s `prev` argument. A
//! generic `Arch::context_switch(prev: *mut _, next: *const _)` has no
//! such return channel. This crate gets the same effect portably: right
//! before calling `context_switch`, `schedule()` stashes the
//! switched-away-from thread in `Kernel::switching_from`. Whichever code
//! resumes next -- `schedule()` itself, resuming on `prev`'s own stack
//! when a later switch comes back to it, or a brand new thread's
//! bootstrap trampoline -- takes that cell and calls
//! `thread_schedule_tail` exactly once. On a single CPU this is race-free:
//! only one thread is ever "about to resume" at a time.

use core::ptr::NonNull;

use crate::arch::Arch;
use crate::kernel::Kernel;
use crate::sched::priority::recompute_priority;
use crate::sched::ready_set::ReadySet;
use crate::thread::{Status, Thread, NICE_MAX, NICE_MIN, PRI_MAX, PRI_MIN, TIME_SLICE};

impl<A: Arch> Kernel<A> {
    pub(crate) fn take_switching_from(&self) -> Option<NonNull<Thread<A>>> {
        self.switching_from.take()
    }

    // -- §4.5 Scheduler Core ------------------------------------------

    fn next_thread_to_run(&self) -> NonNull<Thread<A>> {
        if let Some(t) = self.ready_set.lock().pop_highest() {
            return t;
        }
        self.idle.get().expect("next_thread_to_run before thread_start()")
    }

    /// Precondition (§4.5): interrupts disabled, `current->status !=
    /// RUNNING`. Picks a successor and hands off the CPU.
    pub fn schedule(&self) {
        assert!(!A::interrupts_enabled(), "schedule requires interrupts disabled");
        let cur = self.current.get().expect("schedule() before thread_init()");
        unsafe {
            assert_ne!(
                (*cur.as_ptr()).status,
                Status::Running,
                "schedule precondition: current thread must not be RUNNING"
            );
        }
        let next = self.next_thread_to_run();
        if next != cur {
            self.current.set(Some(next));
            self.switching_from.set(Some(cur));
            unsafe {
                let prev_ctx = (*cur.as_ptr()).context.get();
                let next_ctx = (*next.as_ptr()).context.get() as *const _;
                A::context_switch(prev_ctx, next_ctx);
            }
            // On real hardware this line runs later, when some other
            // thread's schedule() switches back into `cur` -- `cur`'s own
            // stack resumes exactly here. On `NoOpArch`, where
            // `context_switch` never actually transfers control, it runs
            // immediately, synchronously, still on `cur`'s own stack.
            // Either way, whatever thread is executing this line is the
            // one that just got switched into, and `switching_from` names
            // whoever it displaced.
            if let Some(prev) = self.switching_from.take() {
                self.thread_schedule_tail(Some(prev));
            }
        } else {
            self.thread_schedule_tail(None);
        }
    }

    /// `thread_schedule_tail` (§4.5): invoked by the context-switch bottom
    /// half -- either here in `schedule()` or from the bootstrap
    /// trampoline for a thread's first run.
    pub fn thread_schedule_tail(&self, prev: Option<NonNull<Thread<A>>>) {
        let cur = self.current.get().expect("thread_schedule_tail without a current thread");
        unsafe {
            (*cur.as_ptr()).status = Status::Running;
        }
        self.thread_ticks.set(0);
        // Step 3 (activate the new address space) does not apply: user
        // process support is an external collaborator this crate does
        // not model (§1 Non-goals).
        if !self.config.mlfqs {
            unsafe {
                if (*cur.as_ptr()).num_lock_donors == 0 {
                    (*cur.as_ptr()).priority = (*cur.as_ptr()).priority_orig;
                }
            }
        }
        if let Some(prev) = prev {
            let is_dying = unsafe { (*prev.as_ptr()).status == Status::Dying };
            let is_initial = self.initial.get() == Some(prev);
            if is_dying && !is_initial {
                if let Some(page) = unsafe { (*prev.as_ptr()).stack_page() } {
                    unsafe { self.page_alloc.free_page(page) };
                }
            }
        }
    }

    // -- §4.4 Lifecycle Operations --------------------------------------

    /// `thread_block` (§4.4): caller must already hold interrupts disabled.
    pub fn thread_block(&self) {
        assert!(!A::interrupts_enabled(), "thread_block requires interrupts disabled");
        let cur = self.thread_current();
        unsafe { (*cur.as_ptr()).status = Status::Blocked };
        self.schedule();
    }

    /// `thread_unblock` (§4.4): may be called with interrupts enabled
    /// (e.g. from a synchronization primitive's `up`/`signal`), so it
    /// saves and restores the interrupt level itself rather than
    /// asserting it is already off.
    pub fn thread_unblock(&self, t: NonNull<Thread<A>>) {
        let was_enabled = A::disable_interrupts();
        unsafe {
            let status = (*t.as_ptr()).status;
            assert!(
                matches!(status, Status::Blocked | Status::Nascent),
                "thread_unblock: thread must be BLOCKED or NASCENT"
            );
            self.ready_set.lock().insert(t);
            (*t.as_ptr()).status = Status::Ready;
        }

        // Supersession (§4.4): a newly-ready higher-priority thread
        // preempts immediately, unless we're in IRQ context -- the
        // interrupt-return path handles that case via
        // `request_yield_on_return` instead (§4.6 step 5).
        if !A::in_interrupt_context() {
            let cur = self.thread_current();
            let preempt = unsafe { (*t.as_ptr()).priority > (*cur.as_ptr()).priority };
            if preempt {
                unsafe {
                    (*cur.as_ptr()).status = Status::Ready;
                    self.ready_set.lock().insert(cur);
                }
                self.schedule();
            }
        }

        if was_enabled {
            A::enable_interrupts();
        }
    }

    /// `thread_yield` (§4.4): caller must already hold interrupts disabled.
    pub fn thread_yield(&self) {
        assert!(!A::interrupts_enabled(), "thread_yield requires interrupts disabled");
        let cur = self.thread_current();
        unsafe {
            (*cur.as_ptr()).status = Status::Ready;
            if !(*cur.as_ptr()).is_idle() {
                self.ready_set.lock().insert(cur);
            }
        }
        self.schedule();
    }

    /// `thread_wait` (§4.4): sleep the current thread for `ticks` future
    /// ticks. Disables interrupts itself, like `timer_sleep` in the
    /// original.
    pub fn thread_wait(&self, ticks: u32) {
        let was_enabled = A::disable_interrupts();
        let cur = self.thread_current();
        unsafe {
            (*cur.as_ptr()).ticks_wait = ticks;
            (*cur.as_ptr()).status = Status::Blocked;
            self.wait_set.lock().insert(cur);
        }
        self.schedule();
        if was_enabled {
            A::enable_interrupts();
        }
    }

    /// `thread_exit` (§4.4): forbidden in IRQ context. Detaches from the
    /// global roster, marks `DYING`, and calls `schedule()` one final
    /// time -- the successor frees this TCB's page in
    /// `thread_schedule_tail`. The exiting thread must not touch its own
    /// TCB after this point (it may already be freed by the time it
    /// would).
    ///
    /// On real hardware this never returns: the dying thread is never
    /// switched back into. It *does* return on the `NoOpArch` host test
    /// harness, where `context_switch` never truly transfers control and
    /// `schedule()` necessarily runs to completion synchronously on the
    /// caller's own stack -- tests rely on this to observe post-exit
    /// state (roster membership, the successor becoming current, ...).
    pub fn thread_exit(&self) {
        assert!(!A::in_interrupt_context(), "thread_exit is forbidden in IRQ context");
        let was_enabled = A::disable_interrupts();
        let cur = self.thread_current();
        self.unlink_roster_on_exit(cur);
        let tid = unsafe { (*cur.as_ptr()).tid };
        self.console.write_line(&alloc::format!("[EXIT] T{} exiting", tid));
        unsafe { (*cur.as_ptr()).status = Status::Dying };
        self.schedule();
        if was_enabled {
            A::enable_interrupts();
        }
    }

    // -- §4.7 Priority Assignment ----------------------------------------

    /// `thread_set_priority` (§4.7): a no-op under MLFQ, since the
    /// scheduler owns `priority` there.
    pub fn thread_set_priority(&self, new: u8) {
        if self.config.mlfqs {
            return;
        }
        let new = new.clamp(PRI_MIN, PRI_MAX);
        let was_enabled = A::disable_interrupts();
        let cur = self.thread_current();
        unsafe {
            if (*cur.as_ptr()).num_lock_donors > 0 && new <= (*cur.as_ptr()).priority {
                // Don't lose an active donation: only the base priority
                // moves, to be restored once the donors are gone.
                (*cur.as_ptr()).priority_orig = new;
            } else {
                (*cur.as_ptr()).priority = new;
                (*cur.as_ptr()).priority_orig = new;
                self.maybe_supersede(cur);
            }
        }
        if was_enabled {
            A::enable_interrupts();
        }
    }

    pub fn thread_get_priority(&self) -> u8 {
        unsafe { (*self.thread_current().as_ptr()).priority }
    }

    /// `thread_set_nice` (§4.7): MLFQ only.
    pub fn thread_set_nice(&self, n: i32) {
        if !self.config.mlfqs {
            return;
        }
        let n = n.clamp(NICE_MIN, NICE_MAX);
        let was_enabled = A::disable_interrupts();
        let cur = self.thread_current();
        unsafe {
            (*cur.as_ptr()).nice = n;
            (*cur.as_ptr()).priority = recompute_priority((*cur.as_ptr()).recent_cpu, n);
        }
        self.maybe_supersede(cur);
        if was_enabled {
            A::enable_interrupts();
        }
    }

    pub fn thread_get_nice(&self) -> i32 {
        unsafe { (*self.thread_current().as_ptr()).nice }
    }

    pub fn thread_get_load_avg(&self) -> i32 {
        let was_enabled = A::disable_interrupts();
        let v = self.load_avg.get().mul_int(100).to_int_round();
        if was_enabled {
            A::enable_interrupts();
        }
        v
    }

    pub fn thread_get_recent_cpu(&self) -> i32 {
        let was_enabled = A::disable_interrupts();
        let cur = self.thread_current();
        let v = unsafe { (*cur.as_ptr()).recent_cpu }.mul_int(100).to_int_round();
        if was_enabled {
            A::enable_interrupts();
        }
        v
    }

    /// Voluntarily yield if a strictly higher-priority thread is ready
    /// after a priority/nice change (§4.7). Using `highest_priority()`
    /// rather than hand-scanning the FIFOs between `old` and `new` is an
    /// equivalent simplification for both ready-set modes -- see
    /// `DESIGN.md`.
    fn maybe_supersede(&self, cur: NonNull<Thread<A>>) {
        let my_priority = unsafe { (*cur.as_ptr()).priority };
        let should_yield =
            self.ready_set.lock().highest_priority().map(|h| h > my_priority).unwrap_or(false);
        if should_yield {
            let was_enabled = A::disable_interrupts();
            self.thread_yield();
            if was_enabled {
                A::enable_interrupts();
            }
        }
    }

    // -- §4.6 Tick Handler ------------------------------------------------

    /// `thread_tick` (§4.6): invoked only by the timer IRQ, with
    /// interrupts disabled by the hardware entry. Bounded time: no
    /// allocation of TCBs, no blocking. `ticks` is the timer device's
    /// running tick count (an external collaborator, §1) passed in by the
    /// caller.
    pub fn thread_tick(&self, ticks: u64) {
        let cur = self.thread_current();
        let cur_is_idle = unsafe { (*cur.as_ptr()).is_idle() };

        // Step 1: statistics. §9's Open Question about reading a stale or
        // uninitialized per-thread "is this a user tick" flag does not
        // arise here: no user-address-space field exists at all (no
        // user-process support is in scope), so every non-idle tick is
        // counted as a kernel tick.
        if cur_is_idle {
            self.idle_ticks.set(self.idle_ticks.get() + 1);
        } else {
            self.kernel_ticks.set(self.kernel_ticks.get() + 1);
        }

        let mut preempt = false;

        if self.config.mlfqs {
            // Step 2: MLFQ accounting.
            if !cur_is_idle {
                unsafe {
                    (*cur.as_ptr()).recent_cpu = (*cur.as_ptr()).recent_cpu.add_int(1);
                }
            }

            if ticks % 4 == 0 {
                let once_per_second =
                    self.config.timer_freq > 0 && ticks % self.config.timer_freq as u64 == 0;

                if once_per_second {
                    let mut ready_count = 0u32;
                    for t in self.all_list.lock().iter() {
                        let status = unsafe { (*t.as_ptr()).status };
                        if matches!(status, Status::Ready | Status::Running) {
                            ready_count += 1;
                        }
                    }
                    let new_load_avg =
                        crate::sched::priority::decay_load_avg(self.load_avg.get(), ready_count);
                    self.load_avg.set(new_load_avg);
                }

                let roster: alloc::vec::Vec<NonNull<Thread<A>>> =
                    self.all_list.lock().iter().collect();
                for t in roster {
                    let status = unsafe { (*t.as_ptr()).status };
                    if status == Status::Nascent {
                        continue;
                    }
                    let old_priority = unsafe { (*t.as_ptr()).priority };
                    if once_per_second {
                        unsafe {
                            let nice = (*t.as_ptr()).nice;
                            (*t.as_ptr()).recent_cpu = crate::sched::priority::decay_recent_cpu(
                                (*t.as_ptr()).recent_cpu,
                                self.load_avg.get(),
                                nice,
                            );
                        }
                    }
                    let new_priority =
                        unsafe { recompute_priority((*t.as_ptr()).recent_cpu, (*t.as_ptr()).nice) };
                    if new_priority != old_priority {
                        unsafe { (*t.as_ptr()).priority = new_priority };
                        if status == Status::Ready {
                            self.ready_set.lock().relocate(t, old_priority);
                        }
                        let cur_priority = unsafe { (*cur.as_ptr()).priority };
                        if new_priority > cur_priority {
                            preempt = true;
                        }
                    }
                }
            }
        } else {
            // Step 3: aging (round-robin mode only, §4.6 step 3): every
            // four time slices, every READY thread below PRI_MAX gains one
            // priority point.
            self.total_ticks.set(self.total_ticks.get() + 1);
            if self.total_ticks.get() % (TIME_SLICE as u64 * 4) == 0 {
                let mut set = self.ready_set.lock();
                set.for_each(&mut |t: NonNull<Thread<A>>| unsafe {
                    let p = (*t.as_ptr()).priority;
                    if p < PRI_MAX {
                        (*t.as_ptr()).priority = p + 1;
                    }
                });
            }
        }

        // Step 4: wake sleepers -- at most one per tick (§9 Open Question,
        // `DESIGN.md`).
        if let Some(woken) = self.wait_set.lock().tick() {
            unsafe { (*woken.as_ptr()).status = Status::Ready };
            self.ready_set.lock().insert(woken);
            let woken_priority = unsafe { (*woken.as_ptr()).priority };
            let cur_priority = unsafe { (*cur.as_ptr()).priority };
            if woken_priority > cur_priority {
                preempt = true;
            }
        }

        // Step 5: preemption. The IRQ handler's return path is
        // responsible for actually yielding; this just raises the flag
        // (§4.6 step 5, §4.4's IRQ-context carve-out in `thread_unblock`).
        self.thread_ticks.set(self.thread_ticks.get() + 1);
        if self.thread_ticks.get() >= TIME_SLICE as u64 || preempt {
            A::request_yield_on_return();
        }
    }
}

/// The idle thread's body (§4.8): reached via the same bootstrap
/// trampoline every other thread uses, since `Kernel::spawn_idle` wires up
/// a real entry point rather than special-casing idle's first run.
pub(crate) fn idle_entry<A: Arch>(_aux: usize) {
    let kernel = crate::kernel::global_kernel::<A>();
    kernel.mark_idle_ready();
    loop {
        A::disable_interrupts();
        // `thread_block` just marks us BLOCKED and calls `schedule()` --
        // idle is never linked into the ready set, so nothing re-enqueues
        // it; it is picked again only when `next_thread_to_run` falls back
        // to it because the ready set is empty.
        kernel.thread_block();
        unsafe {
            A::enable_interrupts();
            A::wait_for_interrupt();
        }
    }
}

extern crate alloc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::NoOpArch;
    use crate::config::Config;
    use crate::console::NullConsole;
    use crate::kernel::Kernel;
    use crate::mem::page::{FreeListPageAllocator, PageAllocator};
    use crate::thread::PRI_DEFAULT;

    extern crate std;
    use std::boxed::Box;

    /// Builds a fresh `Kernel<NoOpArch>` with the boot ("main") thread
    /// already installed, interrupts left disabled the way `thread_init`
    /// requires. `NoOpArch::context_switch` never actually transfers
    /// control, so `schedule()` always runs to completion synchronously:
    /// these tests observe the *scheduling decisions* (who becomes
    /// `current`) without ever truly switching stacks, and never call
    /// `thread_start`, since idle's body would then never run and the
    /// busy-wait in `thread_start` would spin forever.
    fn leaked_kernel(mlfqs: bool) -> &'static Kernel<NoOpArch> {
        let page_alloc: &'static FreeListPageAllocator =
            Box::leak(Box::new(FreeListPageAllocator::new()));
        let console: &'static NullConsole = Box::leak(Box::new(NullConsole));
        let kernel: &'static Kernel<NoOpArch> =
            Box::leak(Box::new(Kernel::new(Config::new(mlfqs, 100), page_alloc, console)));
        let boot_page = page_alloc.alloc_zero_page().unwrap();
        NoOpArch::disable_interrupts();
        unsafe { kernel.thread_init(boot_page) };
        kernel.register_global();
        kernel
    }

    fn noop(_aux: usize) {}

    /// S1: a newly created thread at strictly higher priority than the
    /// caller preempts immediately (§4.4); same-or-lower priority does not.
    #[test]
    fn higher_priority_thread_preempts_on_create() {
        let kernel = leaked_kernel(false);
        assert_eq!(kernel.thread_name(), "main");

        kernel.thread_create("low", 10, noop, 0).unwrap();
        assert_eq!(kernel.thread_name(), "main", "lower priority must not preempt");

        kernel.thread_create("high", 40, noop, 0).unwrap();
        assert_eq!(kernel.thread_name(), "high", "higher priority must preempt immediately");
    }

    /// S1 (continued): round-robin selection picks the highest-priority
    /// ready thread, FIFO among ties.
    #[test]
    fn thread_yield_picks_highest_ready_priority() {
        let kernel = leaked_kernel(false);
        kernel.thread_create("a", PRI_DEFAULT, noop, 0).unwrap();
        kernel.thread_create("b", PRI_DEFAULT, noop, 0).unwrap();
        // Both created at main's own priority: no preemption, main is
        // still current, and "a"/"b" sit in the ready set in creation
        // order.
        assert_eq!(kernel.thread_name(), "main");

        NoOpArch::disable_interrupts();
        kernel.thread_yield();
        assert_eq!(kernel.thread_name(), "a", "FIFO among equal priorities");

        kernel.thread_yield();
        assert_eq!(kernel.thread_name(), "b");
    }

    /// Exiting the current thread hands the CPU to the next-highest
    /// ready thread and removes the exited thread from the roster.
    #[test]
    fn thread_exit_removes_from_roster_and_schedules_next() {
        let kernel = leaked_kernel(false);
        kernel.thread_create("only", PRI_DEFAULT, noop, 0).unwrap();
        let (total_before, _, _) = kernel.thread_stats();

        NoOpArch::disable_interrupts();
        kernel.thread_yield();
        assert_eq!(kernel.thread_name(), "only");

        kernel.thread_exit();
        assert_eq!(kernel.thread_name(), "main", "main is next highest-priority ready thread");

        let (total_after, _, _) = kernel.thread_stats();
        assert_eq!(total_after, total_before - 1);
    }

    /// S4: round-robin aging raises every ready thread's priority by one
    /// every four time slices.
    #[test]
    fn round_robin_ages_ready_threads() {
        let kernel = leaked_kernel(false);
        kernel.thread_create("y", 10, noop, 0).unwrap();

        for i in 1..=(TIME_SLICE as u64 * 4) {
            kernel.thread_tick(i);
        }

        let mut found = None;
        kernel.for_each_thread(|t| {
            if t.name() == "y" {
                found = Some(t.priority);
            }
        });
        assert_eq!(found, Some(11));
    }

    /// `thread_set_priority` is a no-op once MLFQ mode owns `priority`.
    #[test]
    fn thread_set_priority_is_noop_under_mlfq() {
        let kernel = leaked_kernel(true);
        let before = kernel.thread_get_priority();
        kernel.thread_set_priority(5);
        assert_eq!(kernel.thread_get_priority(), before);
    }

    /// S5: after a once-per-second MLFQ recompute, a thread that has been
    /// running (and so accumulating `recent_cpu`) ends up at a strictly
    /// lower priority than a same-nice thread that has sat idle in the
    /// ready set the whole time.
    #[test]
    fn mlfq_tick_lowers_priority_of_cpu_heavy_thread() {
        let kernel = leaked_kernel(true);
        // Created at a lower priority so it does not preempt "main", and
        // so it just sits READY, accumulating no recent_cpu of its own.
        kernel.thread_create("fresh", 10, noop, 0).unwrap();
        assert_eq!(kernel.thread_name(), "main");

        // 100 ticks at timer_freq=100 crosses exactly one once-per-second
        // boundary (ticks % 4 == 0 && ticks % 100 == 0 at tick 100); "main"
        // is `current` throughout, so only its recent_cpu grows.
        for i in 1..=100u64 {
            kernel.thread_tick(i);
        }

        let main_priority = kernel.thread_get_priority();
        let mut fresh_priority = None;
        kernel.for_each_thread(|t| {
            if t.name() == "fresh" {
                fresh_priority = Some(t.priority);
            }
        });
        assert!(main_priority < fresh_priority.expect("fresh thread still in roster"));
    }

    /// S2: unblocking a strictly higher-priority thread transfers control
    /// before `thread_unblock` returns, distinct from the create-time
    /// preemption check above -- this exercises a thread that already
    /// existed (NASCENT, never unblocked) rather than one just created.
    #[test]
    fn unblock_of_higher_priority_thread_preempts_immediately() {
        let kernel = leaked_kernel(false);

        kernel.thread_create("peer", PRI_DEFAULT, noop, 0).unwrap();
        assert_eq!(kernel.thread_name(), "main");

        NoOpArch::disable_interrupts();
        kernel.thread_block();
        assert_eq!(kernel.thread_name(), "peer", "main blocked, peer is next ready thread");

        // A synchronization primitive's `up`/`signal` calls thread_unblock
        // directly on an already-existing BLOCKED thread, not through
        // thread_create -- simulate that by creating low-priority, then
        // driving the same thread through an external block/unblock cycle
        // at a bumped priority.
        NoOpArch::disable_interrupts();
        let tid = kernel.thread_create("low_for_now", 5, noop, 0).unwrap();
        assert_eq!(kernel.thread_name(), "peer", "lower priority does not preempt");

        let mut target = None;
        kernel.for_each_thread(|t| {
            if t.tid == tid {
                target = Some(t as *const _ as *mut crate::thread::Thread<NoOpArch>);
            }
        });
        let target = core::ptr::NonNull::new(target.expect("thread in roster")).unwrap();

        NoOpArch::disable_interrupts();
        kernel.ready_set.lock().remove(target);
        unsafe {
            (*target.as_ptr()).status = Status::Blocked;
            (*target.as_ptr()).priority = 50;
        }
        kernel.thread_unblock(target);
        assert_eq!(kernel.thread_name(), "low_for_now", "higher-priority unblock preempts peer");
    }

    /// S3: a thread that calls `thread_wait(50)` is still in the wait set at
    /// tick 49 and is on the ready set exactly at tick 50.
    #[test]
    fn thread_wait_wakes_after_exact_tick_count() {
        let kernel = leaked_kernel(false);
        // Higher than main's PRI_DEFAULT so creating it preempts main
        // immediately, making "sleeper" current without an extra yield.
        kernel.thread_create("sleeper", 40, noop, 0).unwrap();
        assert_eq!(kernel.thread_name(), "sleeper");

        kernel.thread_wait(50);
        assert_eq!(kernel.thread_name(), "main", "sleeper blocked, main resumes");

        for i in 1..=49u64 {
            kernel.thread_tick(i);
        }
        let mut status = None;
        kernel.for_each_thread(|t| {
            if t.name() == "sleeper" {
                status = Some(t.status);
            }
        });
        assert_eq!(status, Some(Status::Blocked), "still waiting at tick 49");

        kernel.thread_tick(50);
        status = None;
        kernel.for_each_thread(|t| {
            if t.name() == "sleeper" {
                status = Some(t.status);
            }
        });
        assert_eq!(status, Some(Status::Ready), "woken exactly at tick 50");
    }

    /// `thread_set_priority` must not clobber an active donation: lowering
    /// the base priority while donors remain only updates `priority_orig`.
    #[test]
    fn set_priority_preserves_active_donation() {
        let kernel = leaked_kernel(false);
        let cur = kernel.thread_current();
        unsafe {
            (*cur.as_ptr()).priority = 50;
            (*cur.as_ptr()).priority_orig = 31;
            (*cur.as_ptr()).num_lock_donors = 1;
        }

        kernel.thread_set_priority(20);

        unsafe {
            assert_eq!((*cur.as_ptr()).priority, 50, "donated priority must survive");
            assert_eq!((*cur.as_ptr()).priority_orig, 20, "base priority still updates");
        }
    }

    /// Once donors are gone, `thread_schedule_tail` restores the base
    /// priority (round-robin mode only, §4.5 step 4).
    #[test]
    fn schedule_tail_restores_base_priority_when_donors_gone() {
        let kernel = leaked_kernel(false);
        let cur = kernel.thread_current();
        unsafe {
            (*cur.as_ptr()).priority = 50;
            (*cur.as_ptr()).priority_orig = 31;
            (*cur.as_ptr()).num_lock_donors = 0;
        }

        kernel.thread_schedule_tail(None);

        assert_eq!(kernel.thread_get_priority(), 31, "restored now that no donors remain");
    }

    /// A thread that still holds donors keeps its boosted priority across
    /// `thread_schedule_tail` (round-robin mode).
    #[test]
    fn schedule_tail_keeps_boosted_priority_while_donors_remain() {
        let kernel = leaked_kernel(false);
        let cur = kernel.thread_current();
        unsafe {
            (*cur.as_ptr()).priority = 50;
            (*cur.as_ptr()).priority_orig = 31;
            (*cur.as_ptr()).num_lock_donors = 1;
        }

        kernel.thread_schedule_tail(None);

        assert_eq!(kernel.thread_get_priority(), 50, "donors still active, must not restore");
    }
}
