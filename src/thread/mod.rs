//! The Thread Control Block (§3, §4.2).
//!
//! A `Thread<A>` lives at the base of its own kernel stack page: the page
//! allocator hands back one zeroed, page-aligned page, the TCB is placed at
//! offset zero, and the rest of the page (up to `PAGE_SIZE`) is the usable
//! stack, growing down from the top. Recovering the current TCB from a live
//! stack pointer is then just masking off the low `PAGE_SIZE` bits — see
//! `current_from_sp`. Grounded on the `ThreadStack`/`Thread`/`with_current`
//! trio in `examples/other_examples/…keos-src-thread-mod.rs.rs`, adapted
//! from KEOS's separate boxed stack to the single-page-owns-both layout
//! spec.md's data model calls for.

pub mod builder;
pub mod lifecycle;
pub mod tid;

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::arch::Arch;
use crate::fixed_point::Fp;
use crate::mem::{ListNode, PAGE_SIZE};

pub use tid::TID_ERROR;

/// Sentinel for stack-overflow detection. The actual constant Pintos uses;
/// kept so a reimplementation reads the same bit pattern in a core dump.
pub const THREAD_MAGIC: usize = 0xcd6a_bf4b;

pub const PRI_MIN: u8 = 0;
pub const PRI_DEFAULT: u8 = 31;
pub const PRI_MAX: u8 = 63;
pub const NQ: usize = PRI_MAX as usize + 1;
pub const TIME_SLICE: u32 = 4;

pub const NICE_MIN: i32 = -20;
pub const NICE_MAX: i32 = 20;

const NAME_MAX: usize = 16;

/// One of the five lifecycle states from §3's data model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Nascent = 0,
    Ready = 1,
    Running = 2,
    Blocked = 3,
    Dying = 4,
}

/// Which list `ready_link` currently belongs to, if any. Spec calls these
/// "mutually exclusive" (§3 invariants); tracking it explicitly lets
/// `thread_tick`'s wait-set walk and MLFQ relocation unlink correctly
/// without needing to ask the ready-set/wait-set which list owns a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyLinkOwner {
    None,
    ReadySet,
    WaitSet,
}

#[repr(C)]
pub struct Thread<A: Arch> {
    pub magic: usize,
    name: [u8; NAME_MAX],
    name_len: u8,
    pub tid: i32,
    pub status: Status,
    pub priority: u8,
    pub priority_orig: u8,
    pub num_lock_donors: u32,
    pub nice: i32,
    pub recent_cpu: Fp,
    pub ticks_wait: u32,
    /// Saved callee-saved register file; read/written only by
    /// `init_thread`'s frame construction and `Arch::context_switch`.
    pub context: UnsafeCell<A::SavedContext>,
    /// Entry point and argument for a freshly created thread, read by its
    /// bootstrap trampoline the first time it is scheduled (§4.3). `None`
    /// for `"main"` and `"idle"`, which never pass through the trampoline.
    pub(crate) entry: Option<fn(usize)>,
    pub(crate) aux: usize,
    /// The page this TCB lives in — `None` for the initial thread, whose
    /// page was not allocator-owned (§3 Lifecycle).
    stack_page: Option<NonNull<u8>>,
    pub parent: Option<NonNull<Thread<A>>>,
    pub ready_link_owner: ReadyLinkOwner,
    pub ready_link: ListNode,
    pub all_link: ListNode,
    _marker: PhantomData<A>,
}

unsafe impl<A: Arch> Send for Thread<A> {}
unsafe impl<A: Arch> Sync for Thread<A> {}

impl<A: Arch> Thread<A> {
    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("?")
    }

    fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_MAX);
        self.name[..len].copy_from_slice(&bytes[..len]);
        self.name_len = len as u8;
    }

    pub fn is_idle(&self) -> bool {
        self.name() == "idle"
    }

    /// Debug-only stack-overflow check (§9): a live TCB's `magic` never
    /// changes after `init_thread`.
    pub fn assert_not_corrupted(&self) {
        assert_eq!(self.magic, THREAD_MAGIC, "stack overflow detected: TCB magic corrupted");
    }

    pub fn stack_page(&self) -> Option<NonNull<u8>> {
        self.stack_page
    }

    /// Top of the usable stack region for this TCB's page (stack grows
    /// down from here). Matches §4.2's `stack = base + PAGE_SIZE`.
    pub fn stack_top(base: NonNull<u8>) -> *mut u8 {
        unsafe { base.as_ptr().add(PAGE_SIZE) }
    }

    /// Initialize a TCB in place at the base of `page`. Does not assign a
    /// `tid` (the caller does that via `TidAllocator`, §4.9) and does not
    /// link it into the ready set — it is `NASCENT` until `thread_unblock`.
    ///
    /// # Safety
    /// `page` must be a freshly zeroed, page-aligned, `PAGE_SIZE`-byte
    /// allocation that outlives the returned reference.
    pub unsafe fn init_thread(
        page: NonNull<u8>,
        name: &str,
        priority: u8,
        parent: Option<NonNull<Thread<A>>>,
    ) -> NonNull<Thread<A>> {
        let ptr = page.as_ptr() as *mut Thread<A>;
        unsafe {
            ptr.write(Thread {
                magic: THREAD_MAGIC,
                name: [0; NAME_MAX],
                name_len: 0,
                tid: 0,
                status: Status::Nascent,
                priority,
                priority_orig: priority,
                num_lock_donors: 0,
                nice: 0,
                recent_cpu: Fp::ZERO,
                ticks_wait: 0,
                context: UnsafeCell::new(A::SavedContext::default()),
                entry: None,
                aux: 0,
                stack_page: Some(page),
                parent,
                ready_link_owner: ReadyLinkOwner::None,
                ready_link: ListNode::new(),
                all_link: ListNode::new(),
                _marker: PhantomData,
            });
            let t = &mut *ptr;
            t.set_name(name);
            // The thread literally named "main" is its own parent (§4.2).
            if name == "main" {
                t.parent = NonNull::new(ptr);
            }
            NonNull::new_unchecked(ptr)
        }
    }

    /// Recover the currently-executing thread's TCB from a live stack
    /// pointer by masking to the page boundary (§9 "self-referential TCB").
    ///
    /// # Safety
    /// `sp` must be a valid stack pointer within a page allocated by
    /// `thread_create`, and that page's TCB must not have been freed.
    pub unsafe fn current_from_sp<'a>(sp: usize) -> &'a mut Thread<A> {
        let base = (sp & !(PAGE_SIZE - 1)) as *mut Thread<A>;
        let t = unsafe { &mut *base };
        t.assert_not_corrupted();
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::NoOpArch;
    use crate::mem::page::{FreeListPageAllocator, PageAllocator};

    #[test]
    fn init_thread_sets_nascent_and_magic() {
        let alloc = FreeListPageAllocator::new();
        let page = alloc.alloc_zero_page().unwrap();
        unsafe {
            let t = Thread::<NoOpArch>::init_thread(page, "worker", PRI_DEFAULT, None);
            let t = t.as_ref();
            assert_eq!(t.status, Status::Nascent);
            assert_eq!(t.magic, THREAD_MAGIC);
            assert_eq!(t.name(), "worker");
            assert_eq!(t.priority, PRI_DEFAULT);
            assert_eq!(t.priority_orig, PRI_DEFAULT);
            alloc.free_page(page);
        }
    }

    #[test]
    fn main_thread_is_its_own_parent() {
        let alloc = FreeListPageAllocator::new();
        let page = alloc.alloc_zero_page().unwrap();
        unsafe {
            let t = Thread::<NoOpArch>::init_thread(page, "main", PRI_DEFAULT, None);
            assert_eq!(t.as_ref().parent, NonNull::new(page.as_ptr() as *mut Thread<NoOpArch>));
            alloc.free_page(page);
        }
    }

    #[test]
    #[should_panic(expected = "stack overflow")]
    fn corrupted_magic_panics() {
        let alloc = FreeListPageAllocator::new();
        let page = alloc.alloc_zero_page().unwrap();
        unsafe {
            let t = Thread::<NoOpArch>::init_thread(page, "x", PRI_DEFAULT, None);
            (*t.as_ptr()).magic = 0;
            t.as_ref().assert_not_corrupted();
        }
    }
}
