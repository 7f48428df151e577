//! Dispatch and synchronization core of a small teaching kernel.
//!
//! The crate decides which process runs, suspends processes on timed sleep
//! and provides named mutexes. Everything machine-specific is reached
//! through the traits in [`platform`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
#[cfg(target_arch = "x86_64")]
pub mod hal;
mod interrupts;
pub mod kernel;
pub mod logging;
pub mod mutex;
pub mod platform;
pub mod process;
pub mod queue;
mod scheduler;
mod syscall;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod timer;

pub use config::KernelConfig;
pub use error::{KernelError, KernelResult};
pub use kernel::{Kernel, Outcome};
pub use mutex::MutexKind;
pub use platform::{Exception, Interrupt, InterruptLevel, Platform};
pub use process::{ProcessId, ProcessState};
pub use syscall::SyscallArgs;
