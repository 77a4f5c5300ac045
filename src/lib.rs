#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! A kernel thread scheduler for a teaching operating system.
//!
//! Dual-mode: priority round-robin with periodic aging, or 4.4BSD-style
//! multilevel feedback queue (MLFQ) scheduling, selected once at boot via
//! [`Config`]. Single CPU. The page allocator, timer device, context-switch
//! primitive, interrupt controller, and kernel console are all external
//! collaborators this crate depends on through small traits rather than
//! hardware drivers it owns -- see [`arch::Arch`], [`mem::PageAllocator`],
//! and [`console::Console`].
//!
//! # Quick Start
//!
//! ```ignore
//! use tos_sched::{Config, Kernel};
//! use tos_sched::arch::DefaultArch;
//!
//! static PAGES: MyPageAllocator = MyPageAllocator::new();
//! static CONSOLE: MyConsole = MyConsole::new();
//! static KERNEL: Kernel<DefaultArch> = Kernel::new(Config::default(), &PAGES, &CONSOLE);
//!
//! fn kernel_main(boot_stack: core::ptr::NonNull<u8>) -> ! {
//!     unsafe { KERNEL.thread_init(boot_stack) };
//!     KERNEL.register_global();
//!     KERNEL.thread_create("worker", tos_sched::thread::PRI_DEFAULT, worker_main, 0).unwrap();
//!     KERNEL.thread_start();
//!     loop {}
//! }
//!
//! fn worker_main(_aux: usize) {}
//! ```
//!
//! # Architecture
//!
//! - [`thread`]: the thread control block, its lifecycle operations, and
//!   bootstrap-frame construction for a thread's first run.
//! - [`sched`]: the pluggable ready set (round-robin vs MLFQ), the wait set,
//!   and the MLFQ priority/load-average arithmetic.
//! - [`kernel`]: process-wide state tying the above together and the public
//!   operations a host exposes as syscalls or intrinsics.
//! - [`arch`]: the context-switch and interrupt-control seam.
//! - [`mem`]: the page allocator seam and the intrusive list used
//!   throughout the ready set, wait set, and thread roster.

pub mod arch;
pub mod config;
pub mod console;
pub mod errors;
pub mod fixed_point;
pub mod kernel;
pub mod mem;
pub mod sched;
pub mod thread;

#[cfg(test)]
extern crate std;

extern crate alloc;

#[cfg(all(not(test), not(feature = "std-shim")))]
use core::panic::PanicInfo;

#[cfg(all(not(test), not(feature = "std-shim")))]
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    #[cfg(target_arch = "aarch64")]
    unsafe {
        core::arch::asm!("msr daifset, #0xf", options(nomem, nostack));
    }
    loop {
        #[cfg(target_arch = "aarch64")]
        unsafe {
            core::arch::asm!("wfe", options(nomem, nostack));
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

pub use arch::{Arch, DefaultArch};
pub use config::Config;
pub use console::Console;
pub use errors::{SpawnError, ThreadError, ThreadResult};
pub use kernel::Kernel;
pub use mem::PageAllocator;
pub use thread::builder::ThreadBuilder;
pub use thread::{Status, Thread};
