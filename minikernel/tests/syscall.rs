use minikernel::testing::{self, MockPlatform};
use minikernel::{InterruptLevel, Kernel, KernelConfig, KernelError, ProcessId, SyscallArgs};
use minikernel_abi::*;

fn boot() -> Kernel<MockPlatform> {
    testing::boot(&["init", "worker"], KernelConfig::default())
}

fn args(arg1: usize, arg2: usize) -> SyscallArgs {
    SyscallArgs::new(arg1, arg2, 0)
}

#[test]
fn results_land_in_the_return_register() {
    let mut kernel = boot();
    let init = kernel.get_pid();

    assert_eq!(kernel.syscall(SYS_GET_PID, SyscallArgs::default()), Some(0));
    let program = kernel.platform_mut().place_str("worker");
    assert_eq!(kernel.syscall(SYS_CREATE_PROCESS, args(program, 0)), Some(1));
    assert_eq!(testing::return_value(&kernel, init), Some(1));

    let missing = kernel.platform_mut().place_str("nothing");
    assert_eq!(
        kernel.syscall(SYS_CREATE_PROCESS, args(missing, 0)),
        Some(ERR_NOT_FOUND)
    );
    assert_eq!(testing::return_value(&kernel, init), Some(ERR_NOT_FOUND));
}

#[test]
fn unknown_numbers_fail_with_minus_one() {
    let mut kernel = boot();
    for number in [SYSCALL_COUNT, 42, usize::MAX] {
        assert_eq!(kernel.syscall(number, SyscallArgs::default()), Some(-1));
    }
    assert_eq!(ERR_UNKNOWN_SYSCALL, KernelError::UnknownSyscall.code());
}

#[test]
fn level_is_restored_after_every_call() {
    let mut kernel = boot();
    let bad = kernel.platform_mut().place_str("");
    let calls = [
        (SYS_GET_PID, args(0, 0)),
        (SYS_MUTEX_CREATE, args(bad, 0)),
        (SYS_MUTEX_LOCK, args(3, 0)),
        (SYS_SLEEP, args(0, 0)),
        (99, args(0, 0)),
    ];
    for (number, call_args) in calls {
        kernel.syscall(number, call_args);
        assert_eq!(kernel.platform().level(), InterruptLevel::Unmasked, "syscall {number}");
    }
}

#[test]
fn write_copies_user_bytes_to_the_console() {
    let mut kernel = boot();
    let text = kernel.platform_mut().place_bytes(b"hello, world");
    assert_eq!(kernel.syscall(SYS_WRITE, args(text, 5)), Some(0));
    assert_eq!(kernel.platform().output(), b"hello");

    assert_eq!(
        kernel.syscall(SYS_WRITE, args(text, 64)),
        Some(ERR_INVALID_ARGUMENT)
    );
    assert_eq!(kernel.platform().output(), b"hello");
}

#[test]
fn mutex_calls_round_trip_through_user_memory() {
    let mut kernel = boot();
    let name = kernel.platform_mut().place_str("lock");

    assert_eq!(kernel.syscall(SYS_MUTEX_CREATE, args(name, MUTEX_RECURSIVE)), Some(0));
    assert_eq!(kernel.syscall(SYS_MUTEX_CREATE, args(name, MUTEX_RECURSIVE)), Some(ERR_CONFLICT));
    assert_eq!(kernel.syscall(SYS_MUTEX_OPEN, args(name, 0)), Some(1));
    assert_eq!(kernel.syscall(SYS_MUTEX_LOCK, args(0, 0)), Some(0));
    assert_eq!(kernel.syscall(SYS_MUTEX_LOCK, args(1, 0)), Some(0));
    assert_eq!(kernel.mutexes().get(0).unwrap().lock_count(), 2);
    assert_eq!(kernel.syscall(SYS_MUTEX_UNLOCK, args(0, 0)), Some(0));
    assert_eq!(kernel.syscall(SYS_MUTEX_CLOSE, args(1, 0)), Some(0));
    assert_eq!(kernel.syscall(SYS_MUTEX_CLOSE, args(1, 0)), Some(ERR_NOT_FOUND));
    assert_eq!(kernel.syscall(SYS_MUTEX_UNLOCK, args(0, 0)), Some(ERR_CONFLICT));
    kernel.check_invariants();
}

#[test]
fn malformed_mutex_arguments_are_rejected() {
    let mut kernel = boot();
    let name = kernel.platform_mut().place_str("m");
    let long = kernel
        .platform_mut()
        .place_str(&"x".repeat(MAX_MUTEX_NAME + 1));
    let missing = kernel.platform_mut().place_str("missing");

    assert_eq!(kernel.syscall(SYS_MUTEX_CREATE, args(name, 7)), Some(ERR_INVALID_ARGUMENT));
    assert_eq!(
        kernel.syscall(SYS_MUTEX_CREATE, args(long, MUTEX_NON_RECURSIVE)),
        Some(ERR_INVALID_ARGUMENT)
    );
    assert_eq!(
        kernel.syscall(SYS_MUTEX_CREATE, args(0x10, MUTEX_NON_RECURSIVE)),
        Some(ERR_INVALID_ARGUMENT)
    );
    assert_eq!(kernel.syscall(SYS_MUTEX_OPEN, args(missing, 0)), Some(ERR_NOT_FOUND));
    assert_eq!(kernel.mutexes().busy(), 0);
}

#[test]
fn blocking_calls_report_their_result_on_resume() {
    let mut kernel = boot();
    let init = kernel.get_pid();
    let program = kernel.platform_mut().place_str("worker");
    let name = kernel.platform_mut().place_str("m");

    kernel.syscall(SYS_CREATE_PROCESS, args(program, 0));
    kernel.syscall(SYS_MUTEX_CREATE, args(name, MUTEX_NON_RECURSIVE));
    kernel.syscall(SYS_MUTEX_LOCK, args(0, 0));
    assert_eq!(kernel.syscall(SYS_SLEEP, args(1, 0)), None);

    let worker = ProcessId::new(1);
    assert_eq!(kernel.current(), Some(worker));
    assert_eq!(kernel.syscall(SYS_MUTEX_OPEN, args(name, 0)), Some(0));
    kernel.platform_mut().push_ticks(100);
    assert_eq!(kernel.syscall(SYS_MUTEX_LOCK, args(0, 0)), None);

    assert_eq!(kernel.current(), Some(init));
    assert_eq!(kernel.uptime_ticks(), 100);
    assert_eq!(testing::return_value(&kernel, init), Some(0));

    assert_eq!(kernel.syscall(SYS_TERMINATE_PROCESS, SyscallArgs::default()), None);
    assert_eq!(kernel.current(), Some(worker));
    assert_eq!(testing::return_value(&kernel, worker), Some(0));
    assert_eq!(kernel.mutexes().get(0).unwrap().owner(), Some(worker));
    assert_eq!(kernel.platform().level(), InterruptLevel::Unmasked);
    kernel.check_invariants();
}
