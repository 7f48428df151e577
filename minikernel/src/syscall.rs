//! System-call dispatch.
//!
//! The trap stub hands the kernel a call number and three argument words.
//! Pointer arguments are copied out of user memory here, before any kernel
//! state is touched, and every result is encoded as an ABI word in the
//! caller's saved context.

use alloc::string::String;
use alloc::vec::Vec;

use log::{trace, warn};
use minikernel_abi as abi;

use crate::error::{KernelError, KernelResult};
use crate::kernel::{Kernel, Outcome};
use crate::mutex::MutexKind;
use crate::platform::Platform;

/// Argument words of a system call, after the call number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyscallArgs {
    pub arg1: usize,
    pub arg2: usize,
    pub arg3: usize,
}

impl SyscallArgs {
    pub fn new(arg1: usize, arg2: usize, arg3: usize) -> Self {
        Self { arg1, arg2, arg3 }
    }
}

fn encode(result: KernelResult<Outcome<usize>>) -> Outcome<isize> {
    match result {
        Ok(outcome) => outcome.map(|value| value as isize),
        Err(err) => Outcome::Done(err.code()),
    }
}

impl<P: Platform> Kernel<P> {
    /// Run system call `number` for the current process.
    ///
    /// Returns the value stored in the caller's return register, or `None`
    /// if the caller blocked (its result is stored when it resumes) or
    /// terminated.
    pub fn syscall(&mut self, number: usize, args: SyscallArgs) -> Option<isize> {
        self.critical(|k| {
            let caller = k.caller();
            trace!("process {caller}: syscall {number} {args:?}");

            let outcome = match number {
                abi::SYS_CREATE_PROCESS => encode(
                    k.read_user_str(args.arg1, abi::MAX_PROGRAM_NAME)
                        .and_then(|program| k.create_process(&program))
                        .map(|pid| Outcome::Done(pid.as_usize())),
                ),
                abi::SYS_TERMINATE_PROCESS => {
                    k.terminate_process();
                    return None;
                }
                abi::SYS_WRITE => encode(k.sys_write(args).map(Outcome::Done)),
                abi::SYS_GET_PID => Outcome::Done(k.get_pid().as_usize() as isize),
                abi::SYS_SLEEP => {
                    let seconds = u32::try_from(args.arg1).unwrap_or(u32::MAX);
                    k.sleep(seconds).map(|()| 0)
                }
                abi::SYS_MUTEX_CREATE => encode(k.sys_mutex_create(args)),
                abi::SYS_MUTEX_OPEN => encode(
                    k.read_user_str(args.arg1, k.config.max_mutex_name)
                        .and_then(|name| k.mutex_open(&name))
                        .map(Outcome::Done),
                ),
                abi::SYS_MUTEX_LOCK => encode(
                    k.mutex_lock(args.arg1)
                        .map(|outcome| outcome.map(|()| 0)),
                ),
                abi::SYS_MUTEX_UNLOCK => {
                    encode(k.mutex_unlock(args.arg1).map(|()| Outcome::Done(0)))
                }
                abi::SYS_MUTEX_CLOSE => encode(k.mutex_close(args.arg1).map(|()| Outcome::Done(0))),
                _ => {
                    warn!("process {caller}: unknown syscall {number}");
                    Outcome::Done(KernelError::UnknownSyscall.code())
                }
            };

            match outcome {
                Outcome::Done(value) => {
                    k.set_return(caller, value);
                    Some(value)
                }
                Outcome::Blocked => None,
            }
        })
    }

    /// Copy `bytes` to the console.
    pub fn write(&mut self, bytes: &[u8]) {
        self.critical(|k| k.platform.write_bytes(bytes));
    }

    fn sys_write(&mut self, args: SyscallArgs) -> KernelResult<usize> {
        let bytes = self
            .platform
            .read_user(args.arg1, args.arg2)
            .ok_or(KernelError::InvalidArgument)?;
        self.write(&bytes);
        Ok(0)
    }

    fn sys_mutex_create(&mut self, args: SyscallArgs) -> KernelResult<Outcome<usize>> {
        let name = self.read_user_str(args.arg1, self.config.max_mutex_name)?;
        let kind = MutexKind::from_abi(args.arg2).ok_or(KernelError::InvalidArgument)?;
        self.mutex_create(&name, kind)
    }

    /// Copy a NUL-terminated string of at most `max` bytes out of user
    /// memory.
    fn read_user_str(&self, addr: usize, max: usize) -> KernelResult<String> {
        let mut bytes = Vec::new();
        for offset in 0..=max {
            let byte = addr
                .checked_add(offset)
                .and_then(|addr| self.platform.read_user_byte(addr))
                .ok_or(KernelError::InvalidArgument)?;
            if byte == 0 {
                return String::from_utf8(bytes).map_err(|_| KernelError::InvalidArgument);
            }
            bytes.push(byte);
        }
        Err(KernelError::InvalidArgument)
    }
}
