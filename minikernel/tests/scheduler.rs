use minikernel::platform::Vector;
use minikernel::testing::{self, MockPlatform, Switch};
use minikernel::{
    Exception, Interrupt, InterruptLevel, Kernel, KernelConfig, ProcessId, ProcessState,
};

fn boot() -> Kernel<MockPlatform> {
    testing::boot(&["init", "worker"], KernelConfig::default())
}

#[test]
fn boot_runs_init_without_saving_a_context() {
    let kernel = boot();
    let init = ProcessId::new(0);

    assert_eq!(kernel.current(), Some(init));
    assert_eq!(kernel.get_pid(), init);
    assert_eq!(kernel.process(init).unwrap().state(), ProcessState::Running);
    assert_eq!(
        kernel.platform().switches(),
        [Switch {
            from: None,
            to: testing::context_id(&kernel, init)
        }]
    );
    assert_eq!(kernel.platform().enabled_vectors(), Vector::ALL);
    assert_eq!(kernel.platform().clock_rate(), Some(100));
    assert_eq!(kernel.platform().level(), InterruptLevel::Unmasked);
    assert_eq!(kernel.platform().halts(), 0);
    kernel.check_invariants();
}

#[test]
#[should_panic(expected = "initial process `init` could not be created")]
fn boot_without_init_program_panics() {
    testing::boot(&["worker"], KernelConfig::default());
}

#[test]
#[should_panic(expected = "mutex pool capacity")]
fn boot_rejects_empty_mutex_pool() {
    testing::boot(&["init"], KernelConfig::default().with_max_mutexes(0));
}

#[test]
fn ready_processes_run_in_creation_order() {
    let mut kernel = boot();
    let workers: Vec<ProcessId> = (0..3)
        .map(|_| kernel.create_process("worker").unwrap())
        .collect();
    assert_eq!(kernel.ready_queue(), workers);

    kernel.terminate_process();
    for (i, &worker) in workers.iter().enumerate() {
        assert_eq!(kernel.current(), Some(worker));
        assert_eq!(kernel.ready_queue(), workers[i + 1..]);
        assert_eq!(
            kernel.platform().last_switch(),
            Some(Switch {
                from: None,
                to: testing::context_id(&kernel, worker)
            })
        );
        kernel.check_invariants();
        if i + 1 < workers.len() {
            kernel.terminate_process();
        }
    }
    assert_eq!(kernel.platform().live_images(), 1);
}

#[test]
fn woken_process_goes_to_the_back() {
    let mut kernel = boot();
    let init = kernel.get_pid();
    let worker = kernel.create_process("worker").unwrap();

    kernel.sleep_ticks(1);
    assert_eq!(kernel.current(), Some(worker));
    let late = kernel.create_process("worker").unwrap();

    kernel.handle_interrupt(Interrupt::Clock);
    assert_eq!(kernel.ready_queue(), [late, init]);
    assert_eq!(kernel.current(), Some(worker));
    kernel.check_invariants();
}

#[test]
fn idle_halts_at_software_level_and_restores() {
    let mut kernel = boot();
    let init = kernel.get_pid();
    kernel.platform_mut().push_interrupt(Interrupt::Software);
    kernel.platform_mut().push_interrupt(Interrupt::Terminal);
    kernel.platform_mut().push_ticks(2);
    let before = kernel.platform().level_history().len();

    kernel.sleep_ticks(2);

    assert_eq!(kernel.current(), Some(init));
    assert_eq!(kernel.platform().halts(), 4);
    assert_eq!(kernel.uptime_ticks(), 2);
    // No switch: init was the only process and resumed in place.
    assert_eq!(kernel.platform().switches().len(), 1);

    let levels = &kernel.platform().level_history()[before..];
    let idles = levels
        .iter()
        .filter(|&&level| level == InterruptLevel::Software)
        .count();
    assert_eq!(idles, 4);
    assert_eq!(levels.last(), Some(&InterruptLevel::Unmasked));
    assert_eq!(kernel.platform().level(), InterruptLevel::Unmasked);
}

#[test]
#[should_panic(expected = "idle with no interrupt source")]
fn idle_without_interrupts_is_fatal() {
    let mut kernel = boot();
    kernel.sleep_ticks(5);
}

#[test]
fn device_interrupts_leave_the_current_process_running() {
    let mut kernel = boot();
    kernel.platform_mut().push_input(b'q');
    kernel.handle_interrupt(Interrupt::Terminal);
    kernel.handle_interrupt(Interrupt::Software);
    assert_eq!(kernel.platform().level(), InterruptLevel::Unmasked);
    assert_eq!(kernel.current(), Some(ProcessId::new(0)));
}

#[test]
fn user_exception_terminates_the_process() {
    let mut kernel = boot();
    let worker = kernel.create_process("worker").unwrap();

    kernel.handle_exception(Exception::Memory, true);
    assert_eq!(kernel.current(), Some(worker));
    assert_eq!(
        kernel.process(ProcessId::new(0)).unwrap().state(),
        ProcessState::Free
    );
    kernel.check_invariants();
}

#[test]
#[should_panic(expected = "Arithmetic exception while executing kernel code")]
fn kernel_exception_is_fatal() {
    let mut kernel = boot();
    kernel.handle_exception(Exception::Arithmetic, false);
}

#[test]
fn init_program_is_configurable() {
    let config = KernelConfig::default().with_init_program("shell");
    let kernel = testing::boot(&["shell"], config);
    let pcb = kernel.process(ProcessId::new(0)).unwrap();
    assert_eq!(pcb.program(), "shell");
    assert_eq!(pcb.state(), ProcessState::Running);
}

#[test]
fn processes_get_the_configured_stack_size() {
    let config = KernelConfig::default().with_stack_size(4096);
    let mut kernel = testing::boot(&["init", "worker"], config);
    kernel.create_process("worker").unwrap();
    assert_eq!(kernel.platform().stack_sizes(), [4096, 4096]);
}
