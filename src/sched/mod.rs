//! Scheduler internals (§3, §4.5-§4.7): the pluggable ready set, the wait
//! set, and the pure priority-recomputation arithmetic. `Kernel` owns one
//! instance of each and drives them from `thread/lifecycle.rs`.

pub mod priority;
pub mod ready_set;
pub mod wait_set;

pub use ready_set::{AnyReadySet, ReadySet};
