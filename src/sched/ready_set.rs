//! The ready set as a capability (§9 Design Notes): `{insert, remove,
//! pop_highest, relocate}` with two variant implementations selected at
//! boot, rather than a runtime branch at every call site.

use core::ptr::NonNull;

use crate::arch::Arch;
use crate::mem::List;
use crate::thread::{ReadyLinkOwner, Thread, NQ};

pub trait ReadySet<A: Arch> {
    /// Insert a `READY` thread at its current priority.
    ///
    /// # Safety
    /// `t` must not already be linked into any list via `ready_link`.
    unsafe fn insert(&mut self, t: NonNull<Thread<A>>);

    /// Remove an already-inserted thread (its current `priority` field
    /// must match the priority it was inserted at, or last relocated to).
    fn remove(&mut self, t: NonNull<Thread<A>>);

    /// Pop the highest-priority thread, FIFO among ties (§3 Ready Set).
    fn pop_highest(&mut self) -> Option<NonNull<Thread<A>>>;

    fn is_empty(&self) -> bool;

    /// Visit every ready thread (used by round-robin aging, §4.6 step 3).
    fn for_each(&self, f: &mut dyn FnMut(NonNull<Thread<A>>));

    /// A `READY` thread's priority changed from `old` to its current
    /// value; relocate it into the right FIFO. No-op for round-robin,
    /// where the ready set is a single unordered list (§3 invariants).
    fn relocate(&mut self, t: NonNull<Thread<A>>, old_priority: u8);

    /// Highest priority currently present, if any — used by the
    /// supersession check (§4.7) without consuming the thread.
    fn highest_priority(&self) -> Option<u8>;
}

/// Round-robin mode: one unordered, insertion-ordered list; selection scans
/// for the maximum priority with FIFO tiebreak (§3).
pub struct RoundRobinReadySet<A: Arch> {
    list: List<Thread<A>>,
}

impl<A: Arch> RoundRobinReadySet<A> {
    pub fn new() -> Self {
        let mut list = List::new();
        list.init();
        RoundRobinReadySet { list }
    }
}

impl<A: Arch> Default for RoundRobinReadySet<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Arch> ReadySet<A> for RoundRobinReadySet<A> {
    unsafe fn insert(&mut self, t: NonNull<Thread<A>>) {
        unsafe {
            (*t.as_ptr()).ready_link_owner = ReadyLinkOwner::ReadySet;
            let node = NonNull::new_unchecked(&mut (*t.as_ptr()).ready_link as *mut _);
            self.list.push_back(node, t);
        }
    }

    fn remove(&mut self, t: NonNull<Thread<A>>) {
        unsafe {
            let node = NonNull::new_unchecked(&mut (*t.as_ptr()).ready_link as *mut _);
            self.list.remove(node);
            (*t.as_ptr()).ready_link_owner = ReadyLinkOwner::None;
        }
    }

    fn pop_highest(&mut self) -> Option<NonNull<Thread<A>>> {
        let mut best: Option<NonNull<Thread<A>>> = None;
        for t in self.list.iter() {
            let pri = unsafe { (*t.as_ptr()).priority };
            let better = match best {
                None => true,
                Some(b) => pri > unsafe { (*b.as_ptr()).priority },
            };
            if better {
                best = Some(t);
            }
        }
        if let Some(t) = best {
            self.remove(t);
        }
        best
    }

    fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    fn for_each(&self, f: &mut dyn FnMut(NonNull<Thread<A>>)) {
        for t in self.list.iter() {
            f(t);
        }
    }

    fn relocate(&mut self, _t: NonNull<Thread<A>>, _old_priority: u8) {}

    fn highest_priority(&self) -> Option<u8> {
        self.list.iter().map(|t| unsafe { (*t.as_ptr()).priority }).max()
    }
}

/// MLFQ mode: 64 per-priority FIFOs; selection pops the head of the
/// highest non-empty queue (§3).
pub struct MlfqReadySet<A: Arch> {
    queues: [List<Thread<A>>; NQ],
}

impl<A: Arch> MlfqReadySet<A> {
    pub fn new() -> Self {
        let mut queues: [List<Thread<A>>; NQ] = core::array::from_fn(|_| List::new());
        for q in queues.iter_mut() {
            q.init();
        }
        MlfqReadySet { queues }
    }
}

impl<A: Arch> Default for MlfqReadySet<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Arch> ReadySet<A> for MlfqReadySet<A> {
    unsafe fn insert(&mut self, t: NonNull<Thread<A>>) {
        unsafe {
            let pri = (*t.as_ptr()).priority as usize;
            (*t.as_ptr()).ready_link_owner = ReadyLinkOwner::ReadySet;
            let node = NonNull::new_unchecked(&mut (*t.as_ptr()).ready_link as *mut _);
            self.queues[pri].push_back(node, t);
        }
    }

    fn remove(&mut self, t: NonNull<Thread<A>>) {
        unsafe {
            let pri = (*t.as_ptr()).priority as usize;
            let node = NonNull::new_unchecked(&mut (*t.as_ptr()).ready_link as *mut _);
            self.queues[pri].remove(node);
            (*t.as_ptr()).ready_link_owner = ReadyLinkOwner::None;
        }
    }

    fn pop_highest(&mut self) -> Option<NonNull<Thread<A>>> {
        for pri in (0..NQ).rev() {
            if let Some(t) = self.queues[pri].pop_front() {
                unsafe { (*t.as_ptr()).ready_link_owner = ReadyLinkOwner::None };
                return Some(t);
            }
        }
        None
    }

    fn is_empty(&self) -> bool {
        self.queues.iter().all(|q| q.is_empty())
    }

    fn for_each(&self, f: &mut dyn FnMut(NonNull<Thread<A>>)) {
        for q in self.queues.iter() {
            for t in q.iter() {
                f(t);
            }
        }
    }

    fn relocate(&mut self, t: NonNull<Thread<A>>, old_priority: u8) {
        unsafe {
            let node = NonNull::new_unchecked(&mut (*t.as_ptr()).ready_link as *mut _);
            self.queues[old_priority as usize].remove(node);
            let new_pri = (*t.as_ptr()).priority as usize;
            (*t.as_ptr()).ready_link_owner = ReadyLinkOwner::ReadySet;
            self.queues[new_pri].push_back(node, t);
        }
    }

    fn highest_priority(&self) -> Option<u8> {
        (0..NQ).rev().find(|&p| !self.queues[p].is_empty()).map(|p| p as u8)
    }
}

/// Dual-mode dispatch, picked once at boot from `Config::mlfqs` (§9).
pub enum AnyReadySet<A: Arch> {
    RoundRobin(RoundRobinReadySet<A>),
    Mlfq(MlfqReadySet<A>),
}

impl<A: Arch> AnyReadySet<A> {
    pub fn new(mlfqs: bool) -> Self {
        if mlfqs {
            AnyReadySet::Mlfq(MlfqReadySet::new())
        } else {
            AnyReadySet::RoundRobin(RoundRobinReadySet::new())
        }
    }

    pub fn is_mlfq(&self) -> bool {
        matches!(self, AnyReadySet::Mlfq(_))
    }
}

impl<A: Arch> ReadySet<A> for AnyReadySet<A> {
    unsafe fn insert(&mut self, t: NonNull<Thread<A>>) {
        match self {
            AnyReadySet::RoundRobin(r) => unsafe { r.insert(t) },
            AnyReadySet::Mlfq(m) => unsafe { m.insert(t) },
        }
    }

    fn remove(&mut self, t: NonNull<Thread<A>>) {
        match self {
            AnyReadySet::RoundRobin(r) => r.remove(t),
            AnyReadySet::Mlfq(m) => m.remove(t),
        }
    }

    fn pop_highest(&mut self) -> Option<NonNull<Thread<A>>> {
        match self {
            AnyReadySet::RoundRobin(r) => r.pop_highest(),
            AnyReadySet::Mlfq(m) => m.pop_highest(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            AnyReadySet::RoundRobin(r) => r.is_empty(),
            AnyReadySet::Mlfq(m) => m.is_empty(),
        }
    }

    fn for_each(&self, f: &mut dyn FnMut(NonNull<Thread<A>>)) {
        match self {
            AnyReadySet::RoundRobin(r) => r.for_each(f),
            AnyReadySet::Mlfq(m) => m.for_each(f),
        }
    }

    fn relocate(&mut self, t: NonNull<Thread<A>>, old_priority: u8) {
        match self {
            AnyReadySet::RoundRobin(r) => r.relocate(t, old_priority),
            AnyReadySet::Mlfq(m) => m.relocate(t, old_priority),
        }
    }

    fn highest_priority(&self) -> Option<u8> {
        match self {
            AnyReadySet::RoundRobin(r) => r.highest_priority(),
            AnyReadySet::Mlfq(m) => m.highest_priority(),
        }
    }
}
