//! `tid` allocation (§4.9).
//!
//! A monotonically increasing counter guarded by a mutex, wrapping from
//! `i32::MAX` back to `2` (`1` is reserved for the initial thread; `0` and
//! negatives are sentinel/error values). Uniqueness across the live thread
//! population is not guaranteed after wraparound — see spec Open Questions
//! (§9) and `DESIGN.md`.
//!
//! Pintos uses a sleep-capable lock here, the only place the scheduler
//! itself blocks on synchronization. This crate has no sleep-capable lock
//! of its own (locks are an external collaborator, §1), so `TidAllocator`
//! uses a short-held `spin::Mutex` instead — see `DESIGN.md` for why that
//! substitution is safe for a single-CPU kernel where the critical section
//! is three instructions.

use spin::Mutex;

/// Reserved for the bootstrap ("main") thread.
pub const INITIAL_TID: i32 = 1;
/// Returned by `thread_create` when no page was available; never a valid `tid`.
pub const TID_ERROR: i32 = -1;

pub struct TidAllocator {
    next: Mutex<i32>,
}

impl TidAllocator {
    pub const fn new() -> Self {
        TidAllocator { next: Mutex::new(INITIAL_TID + 1) }
    }

    /// Callers must not hold interrupts disabled across this call (§9):
    /// it takes a lock that, on a real kernel, may block.
    pub fn allocate(&self) -> i32 {
        let mut next = self.next.lock();
        let tid = *next;
        *next = if tid == i32::MAX { 2 } else { tid + 1 };
        tid
    }
}

impl Default for TidAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonically_increasing() {
        let a = TidAllocator::new();
        let t1 = a.allocate();
        let t2 = a.allocate();
        let t3 = a.allocate();
        assert!(t1 < t2 && t2 < t3);
    }

    #[test]
    fn wraps_to_two_after_int_max() {
        let a = TidAllocator { next: Mutex::new(i32::MAX) };
        assert_eq!(a.allocate(), i32::MAX);
        assert_eq!(a.allocate(), 2);
        assert_eq!(a.allocate(), 3);
    }
}
