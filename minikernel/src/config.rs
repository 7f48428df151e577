//! Boot-time kernel configuration.
//!
//! Every table in the kernel has a fixed capacity chosen here; nothing is
//! resized after boot.

use minikernel_abi as abi;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Number of process table slots.
    pub max_processes: usize,
    /// Number of mutexes that may exist at once.
    pub max_mutexes: usize,
    /// Number of mutex descriptors per process.
    pub descriptors_per_process: usize,
    /// Longest accepted mutex name, in bytes.
    pub max_mutex_name: usize,
    /// Clock frequency; `sleep(seconds)` sleeps `seconds * ticks_per_second` ticks.
    pub ticks_per_second: u32,
    /// Stack size requested for every new process.
    pub stack_size: usize,
    /// Program loaded as the first process.
    pub init_program: &'static str,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_processes: abi::MAX_PROCESSES,
            max_mutexes: abi::MAX_MUTEXES,
            descriptors_per_process: abi::MAX_DESCRIPTORS,
            max_mutex_name: abi::MAX_MUTEX_NAME,
            ticks_per_second: abi::TICKS_PER_SECOND,
            stack_size: abi::STACK_SIZE,
            init_program: "init",
        }
    }
}

impl KernelConfig {
    pub fn with_max_processes(mut self, max_processes: usize) -> Self {
        self.max_processes = max_processes;
        self
    }

    pub fn with_max_mutexes(mut self, max_mutexes: usize) -> Self {
        self.max_mutexes = max_mutexes;
        self
    }

    pub fn with_descriptors_per_process(mut self, descriptors: usize) -> Self {
        self.descriptors_per_process = descriptors;
        self
    }

    pub fn with_max_mutex_name(mut self, max_mutex_name: usize) -> Self {
        self.max_mutex_name = max_mutex_name;
        self
    }

    pub fn with_ticks_per_second(mut self, ticks_per_second: u32) -> Self {
        self.ticks_per_second = ticks_per_second;
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn with_init_program(mut self, program: &'static str) -> Self {
        self.init_program = program;
        self
    }

    /// Panics if any table would have zero capacity.
    pub(crate) fn assert_valid(&self) {
        assert!(self.max_processes > 0, "process table capacity must be > 0");
        assert!(self.max_mutexes > 0, "mutex pool capacity must be > 0");
        assert!(
            self.descriptors_per_process > 0,
            "descriptor table capacity must be > 0"
        );
        assert!(self.max_mutex_name > 0, "mutex name bound must be > 0");
        assert!(self.ticks_per_second > 0, "clock frequency must be > 0");
        assert!(self.stack_size > 0, "process stack size must be > 0");
    }
}
