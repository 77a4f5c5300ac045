//! Boot-time configuration.
//!
//! Pintos selects MLFQ scheduling via the `-o mlfqs` kernel command-line
//! flag. This crate has no command line, so the equivalent is a `Config`
//! value handed to [`crate::kernel::Kernel::new`] once at boot.

/// Scheduling mode and timer parameters fixed for the lifetime of the kernel.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// When `true`, run the 4.4BSD MLFQ scheduler; otherwise priority
    /// round-robin with aging.
    pub mlfqs: bool,
    /// Timer interrupts per second. Governs the `load_avg`/`recent_cpu`
    /// once-per-second recompute boundary and `thread_get_load_avg`/
    /// `thread_get_recent_cpu` scaling only indirectly (both are expressed
    /// in ticks, not wall-clock time).
    pub timer_freq: u32,
}

impl Config {
    pub const fn new(mlfqs: bool, timer_freq: u32) -> Self {
        Config { mlfqs, timer_freq }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config { mlfqs: cfg!(feature = "mlfqs"), timer_freq: 100 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timer_freq_is_100hz() {
        assert_eq!(Config::default().timer_freq, 100);
    }
}
