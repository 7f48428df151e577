//! Scripted platform for host-side tests.
//!
//! This module is only compiled for unit tests or when the `testing` feature
//! is enabled. [`MockPlatform`] never runs user code: a context switch is
//! recorded and returns immediately, interrupts come from a script, and user
//! memory is a sparse byte map.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::String;
use alloc::vec::Vec;

use crate::config::KernelConfig;
use crate::kernel::Kernel;
use crate::platform::{
    Console, ContextService, EntryPoint, Interrupt, InterruptController, InterruptLevel,
    MemoryService, UserMemory, Vector,
};
use crate::process::ProcessId;

/// First address handed out by [`MockPlatform::place_bytes`].
const USER_BASE: usize = 0x4000_0000;

#[derive(Debug)]
pub struct MockImage {
    pub program: String,
}

#[derive(Debug)]
pub struct MockStack {
    pub size: usize,
}

#[derive(Debug)]
pub struct MockContext {
    /// Unique per created context.
    pub id: usize,
    pub entry: EntryPoint,
    /// Last value stored by `set_return_value`.
    pub return_value: Option<isize>,
}

/// One recorded context switch, by context id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switch {
    pub from: Option<usize>,
    pub to: usize,
}

pub struct MockPlatform {
    programs: Vec<String>,
    live_images: usize,
    live_stacks: usize,
    stack_sizes: Vec<usize>,
    next_context: usize,
    switches: Vec<Switch>,
    level: InterruptLevel,
    levels: Vec<InterruptLevel>,
    enabled: Vec<Vector>,
    clock: Option<u32>,
    interrupts: VecDeque<Interrupt>,
    halts: usize,
    output: Vec<u8>,
    input: VecDeque<u8>,
    memory: BTreeMap<usize, u8>,
    next_addr: usize,
}

impl MockPlatform {
    /// A platform that can load exactly the named programs.
    pub fn new(programs: &[&str]) -> Self {
        Self {
            programs: programs.iter().map(|p| String::from(*p)).collect(),
            live_images: 0,
            live_stacks: 0,
            stack_sizes: Vec::new(),
            next_context: 0,
            switches: Vec::new(),
            level: InterruptLevel::Unmasked,
            levels: Vec::new(),
            enabled: Vec::new(),
            clock: None,
            interrupts: VecDeque::new(),
            halts: 0,
            output: Vec::new(),
            input: VecDeque::new(),
            memory: BTreeMap::new(),
            next_addr: USER_BASE,
        }
    }

    /// Images built and not yet released.
    pub fn live_images(&self) -> usize {
        self.live_images
    }

    /// Stacks built and not yet released.
    pub fn live_stacks(&self) -> usize {
        self.live_stacks
    }

    /// Size of every stack built, in build order.
    pub fn stack_sizes(&self) -> &[usize] {
        &self.stack_sizes
    }

    pub fn switches(&self) -> &[Switch] {
        &self.switches
    }

    pub fn last_switch(&self) -> Option<Switch> {
        self.switches.last().copied()
    }

    pub fn level(&self) -> InterruptLevel {
        self.level
    }

    /// Every level passed to `set_level`, in order.
    pub fn level_history(&self) -> &[InterruptLevel] {
        &self.levels
    }

    pub fn enabled_vectors(&self) -> &[Vector] {
        &self.enabled
    }

    pub fn clock_rate(&self) -> Option<u32> {
        self.clock
    }

    /// Times the processor halted waiting for an interrupt.
    pub fn halts(&self) -> usize {
        self.halts
    }

    /// Queue an interrupt to be delivered by the next halt.
    pub fn push_interrupt(&mut self, interrupt: Interrupt) {
        self.interrupts.push_back(interrupt);
    }

    /// Queue `n` clock interrupts.
    pub fn push_ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.push_interrupt(Interrupt::Clock);
        }
    }

    /// Interrupts scripted but not yet delivered.
    pub fn pending_interrupts(&self) -> usize {
        self.interrupts.len()
    }

    /// Queue a byte for the next terminal read.
    pub fn push_input(&mut self, byte: u8) {
        self.input.push_back(byte);
    }

    /// Bytes written to the console so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Copy `bytes` into fresh user memory and return their address.
    pub fn place_bytes(&mut self, bytes: &[u8]) -> usize {
        let addr = self.next_addr;
        for (offset, byte) in bytes.iter().enumerate() {
            self.memory.insert(addr + offset, *byte);
        }
        // Leave an unmapped gap so overruns are caught.
        self.next_addr += bytes.len() + 16;
        addr
    }

    /// Place `s` followed by a NUL in user memory.
    pub fn place_str(&mut self, s: &str) -> usize {
        let mut bytes = Vec::from(s.as_bytes());
        bytes.push(0);
        self.place_bytes(&bytes)
    }
}

impl MemoryService for MockPlatform {
    type Image = MockImage;
    type Stack = MockStack;

    fn build_image(&mut self, program: &str) -> Option<(MockImage, EntryPoint)> {
        let index = self.programs.iter().position(|p| p == program)?;
        self.live_images += 1;
        let image = MockImage {
            program: String::from(program),
        };
        Some((image, EntryPoint(0x1000 * (index + 1))))
    }

    fn build_stack(&mut self, size: usize) -> MockStack {
        self.live_stacks += 1;
        self.stack_sizes.push(size);
        MockStack { size }
    }

    fn release_image(&mut self, _image: MockImage) {
        self.live_images -= 1;
    }

    fn release_stack(&mut self, _stack: MockStack) {
        self.live_stacks -= 1;
    }
}

impl ContextService for MockPlatform {
    type Context = MockContext;

    fn init_context(
        &mut self,
        _image: &MockImage,
        stack: &MockStack,
        stack_size: usize,
        entry: EntryPoint,
    ) -> MockContext {
        assert_eq!(stack.size, stack_size);
        let id = self.next_context;
        self.next_context += 1;
        MockContext {
            id,
            entry,
            return_value: None,
        }
    }

    fn switch(&mut self, from: Option<&mut MockContext>, to: &MockContext) {
        self.switches.push(Switch {
            from: from.map(|context| context.id),
            to: to.id,
        });
    }

    fn set_return_value(&mut self, context: &mut MockContext, value: isize) {
        context.return_value = Some(value);
    }
}

impl InterruptController for MockPlatform {
    fn set_level(&mut self, level: InterruptLevel) -> InterruptLevel {
        self.levels.push(level);
        core::mem::replace(&mut self.level, level)
    }

    fn enable(&mut self, vector: Vector) {
        self.enabled.push(vector);
    }

    fn start_clock(&mut self, ticks_per_second: u32) {
        self.clock = Some(ticks_per_second);
    }

    fn halt_until_interrupt(&mut self) -> Option<Interrupt> {
        self.halts += 1;
        self.interrupts.pop_front()
    }
}

impl Console for MockPlatform {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn read_byte(&mut self) -> u8 {
        self.input.pop_front().unwrap_or(0)
    }
}

impl UserMemory for MockPlatform {
    fn read_user_byte(&self, addr: usize) -> Option<u8> {
        self.memory.get(&addr).copied()
    }
}

/// Boot a kernel on a [`MockPlatform`] that knows `programs`. The first
/// process runs `config.init_program`.
pub fn boot(programs: &[&str], config: KernelConfig) -> Kernel<MockPlatform> {
    Kernel::boot(MockPlatform::new(programs), config)
}

/// Context id of a live process.
pub fn context_id(kernel: &Kernel<MockPlatform>, pid: ProcessId) -> usize {
    kernel
        .process(pid)
        .and_then(|pcb| pcb.context())
        .map(|context| context.id)
        .unwrap_or_else(|| panic!("process {pid} has no context"))
}

/// Value last stored in a live process's return register.
pub fn return_value(kernel: &Kernel<MockPlatform>, pid: ProcessId) -> Option<isize> {
    kernel
        .process(pid)
        .and_then(|pcb| pcb.context())
        .and_then(|context| context.return_value)
}
