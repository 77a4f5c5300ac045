//! Error handling for the thread scheduler.
//!
//! Per §7, almost nothing here is recoverable: the only error that crosses
//! the public API is resource exhaustion in `thread_create` (`TID_ERROR` in
//! the original, `ThreadError::Spawn(SpawnError::OutOfMemory)` here).
//! Contract violations — status mismatches, IRQ-context reentrancy,
//! priority out of range, a corrupted `magic` — are programming errors and
//! panic; they are intentionally not represented as `ThreadError` variants.
//! `thread_set_priority`/`thread_set_nice` are silent no-ops outside their
//! applicable mode (§4.7), not an error path, so there is no "wrong mode"
//! variant either.

use core::fmt;

/// Result type for the handful of threading operations that can fail.
pub type ThreadResult<T> = Result<T, ThreadError>;

/// The complete set of recoverable errors this crate produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadError {
    /// `thread_create` could not obtain a page for the new TCB/stack.
    Spawn(SpawnError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    OutOfMemory,
}

impl ThreadError {
    pub const fn out_of_memory() -> Self {
        ThreadError::Spawn(SpawnError::OutOfMemory)
    }
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadError::Spawn(SpawnError::OutOfMemory) => {
                write!(f, "no page available for new thread")
            }
        }
    }
}

impl From<SpawnError> for ThreadError {
    fn from(e: SpawnError) -> Self {
        ThreadError::Spawn(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        extern crate std;
        let msg = std::format!("{}", ThreadError::out_of_memory());
        assert!(msg.contains("page"));
    }
}
