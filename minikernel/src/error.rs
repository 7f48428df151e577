//! Kernel error type.
//!
//! Every variant's discriminant is the ABI result code from
//! `minikernel_abi`, so encoding an error for the calling process is a cast.

use core::fmt;

use minikernel_abi as abi;

/// Errors returned to a process by a system call. None of them is fatal to
/// the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(isize)]
pub enum KernelError {
    /// The system-call number does not name a service.
    UnknownSyscall = abi::ERR_UNKNOWN_SYSCALL,
    /// No free process slot or no free descriptor slot.
    ResourceExhausted = abi::ERR_RESOURCE_EXHAUSTED,
    /// Name, descriptor, process or program could not be resolved.
    NotFound = abi::ERR_NOT_FOUND,
    /// Duplicate mutex name, self-relock of a non-recursive mutex, unlock by a
    /// non-owner or unlock of an unlocked mutex.
    Conflict = abi::ERR_CONFLICT,
    /// Malformed argument, e.g. a name longer than the bound.
    InvalidArgument = abi::ERR_INVALID_ARGUMENT,
}

pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// The ABI code written into the caller's return register.
    pub fn code(self) -> isize {
        self as isize
    }

    /// Decode an ABI result code. Non-negative values are not errors.
    pub fn from_code(code: isize) -> Option<Self> {
        match code {
            abi::ERR_UNKNOWN_SYSCALL => Some(Self::UnknownSyscall),
            abi::ERR_RESOURCE_EXHAUSTED => Some(Self::ResourceExhausted),
            abi::ERR_NOT_FOUND => Some(Self::NotFound),
            abi::ERR_CONFLICT => Some(Self::Conflict),
            abi::ERR_INVALID_ARGUMENT => Some(Self::InvalidArgument),
            _ => None,
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KernelError::UnknownSyscall => write!(f, "unknown system call"),
            KernelError::ResourceExhausted => write!(f, "resource exhausted"),
            KernelError::NotFound => write!(f, "not found"),
            KernelError::Conflict => write!(f, "conflict"),
            KernelError::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}

/// Encode a system-call result as the value a process sees in its return
/// register.
pub fn into_return(result: KernelResult<usize>) -> isize {
    match result {
        Ok(value) => value as isize,
        Err(err) => err.code(),
    }
}
