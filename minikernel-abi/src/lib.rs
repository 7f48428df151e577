//! Shared ABI definitions between the kernel and user programs.
//!
//! This crate contains system-call numbers, result codes, mutex kinds and the
//! default table limits that both sides need to agree on.

#![no_std]

// =============================================================================
// Syscall numbers
// =============================================================================

/// Create a process: (program_ptr) -> pid or error
pub const SYS_CREATE_PROCESS: usize = 0;
/// Terminate the calling process: () -> !
pub const SYS_TERMINATE_PROCESS: usize = 1;
/// Write to the console: (buf_ptr, buf_len) -> 0
pub const SYS_WRITE: usize = 2;
/// Get the caller's process ID: () -> pid
pub const SYS_GET_PID: usize = 3;
/// Sleep: (seconds) -> 0
pub const SYS_SLEEP: usize = 4;
/// Create a named mutex: (name_ptr, kind) -> descriptor or error
pub const SYS_MUTEX_CREATE: usize = 5;
/// Open an existing named mutex: (name_ptr) -> descriptor or error
pub const SYS_MUTEX_OPEN: usize = 6;
/// Lock a mutex: (descriptor) -> 0 or error
pub const SYS_MUTEX_LOCK: usize = 7;
/// Unlock a mutex: (descriptor) -> 0 or error
pub const SYS_MUTEX_UNLOCK: usize = 8;
/// Close a mutex descriptor: (descriptor) -> 0 or error
pub const SYS_MUTEX_CLOSE: usize = 9;

/// Number of entries in the system-call table.
pub const SYSCALL_COUNT: usize = 10;

// =============================================================================
// Result codes
// =============================================================================

/// The system-call number does not name a service.
pub const ERR_UNKNOWN_SYSCALL: isize = -1;
/// A fixed-capacity table (processes, descriptors) is full.
pub const ERR_RESOURCE_EXHAUSTED: isize = -2;
/// A name, descriptor or program could not be resolved.
pub const ERR_NOT_FOUND: isize = -3;
/// The request conflicts with the current state (duplicate name, relock,
/// unlock by a non-owner).
pub const ERR_CONFLICT: isize = -4;
/// An argument is malformed (name too long, unknown mutex kind, bad pointer).
pub const ERR_INVALID_ARGUMENT: isize = -5;

// =============================================================================
// Mutex kinds
// =============================================================================

/// A mutex that rejects being locked again by its owner.
pub const MUTEX_NON_RECURSIVE: usize = 0;
/// A mutex that counts nested locks by its owner.
pub const MUTEX_RECURSIVE: usize = 1;

// =============================================================================
// Default limits
// =============================================================================

/// Default number of process table slots.
pub const MAX_PROCESSES: usize = 10;
/// Default number of mutexes that may exist at once.
pub const MAX_MUTEXES: usize = 16;
/// Default number of mutex descriptors each process may hold.
pub const MAX_DESCRIPTORS: usize = 4;
/// Default maximum mutex name length in bytes, not counting the NUL.
pub const MAX_MUTEX_NAME: usize = 31;
/// Longest program name accepted by `create_process`, not counting the NUL.
pub const MAX_PROGRAM_NAME: usize = 63;
/// Default clock frequency.
pub const TICKS_PER_SECOND: u32 = 100;
/// Default per-process stack size in bytes.
pub const STACK_SIZE: usize = 32 * 1024;

/// Returns true if `result` is one of the error codes above.
pub fn is_error(result: isize) -> bool {
    result < 0
}
