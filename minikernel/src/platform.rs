//! Capabilities the kernel core needs from the machine it runs on.
//!
//! Image loading, stacks, register contexts, the interrupt controller, the
//! console and user-memory access live outside the core. A [`Platform`]
//! bundles all of them; `hal` provides the hardware pieces and `testing`
//! provides a scripted implementation.

use alloc::vec::Vec;

/// Address where a freshly loaded program starts executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint(pub usize);

/// Interrupt priority level. Raising the level to `N` masks every event at
/// level `N` or below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InterruptLevel {
    /// Everything enabled; user code runs here.
    Unmasked = 0,
    /// Software interrupts masked. Lowest level that still admits hardware
    /// interrupts, used while idling.
    Software = 1,
    /// Software and terminal interrupts masked.
    Terminal = 2,
    /// Everything masked, including the clock. Kernel tables are mutated here.
    Clock = 3,
}

/// Hardware interrupts that can wake a halted processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Clock,
    Terminal,
    Software,
}

/// Processor exceptions raised by the running code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    Arithmetic,
    Memory,
}

/// Every event the kernel installs a handler for at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vector {
    ArithmeticException,
    MemoryException,
    Clock,
    Terminal,
    Syscall,
    Software,
}

impl Vector {
    pub const ALL: [Vector; 6] = [
        Vector::ArithmeticException,
        Vector::MemoryException,
        Vector::Clock,
        Vector::Terminal,
        Vector::Syscall,
        Vector::Software,
    ];
}

/// Executable images and call stacks.
pub trait MemoryService {
    type Image;
    type Stack;

    /// Load `program`, returning its image and entry point, or `None` if the
    /// program does not exist.
    fn build_image(&mut self, program: &str) -> Option<(Self::Image, EntryPoint)>;
    fn build_stack(&mut self, size: usize) -> Self::Stack;
    fn release_image(&mut self, image: Self::Image);
    fn release_stack(&mut self, stack: Self::Stack);
}

/// Saved register contexts and the transfer of control between them.
pub trait ContextService: MemoryService {
    type Context;

    fn init_context(
        &mut self,
        image: &Self::Image,
        stack: &Self::Stack,
        stack_size: usize,
        entry: EntryPoint,
    ) -> Self::Context;

    /// Save the running context into `from` (if any) and resume `to`.
    ///
    /// With `from == None` control never comes back here. Otherwise the call
    /// returns once `from` is resumed by a later switch.
    fn switch(&mut self, from: Option<&mut Self::Context>, to: &Self::Context);

    /// Store a system-call result in the return register of a saved context.
    fn set_return_value(&mut self, context: &mut Self::Context, value: isize);
}

pub trait InterruptController {
    /// Set the current level, returning the previous one.
    fn set_level(&mut self, level: InterruptLevel) -> InterruptLevel;
    fn enable(&mut self, vector: Vector);
    fn start_clock(&mut self, ticks_per_second: u32);
    /// Halt until an interrupt arrives and report which one. `None` means
    /// nothing can ever wake the processor again.
    fn halt_until_interrupt(&mut self) -> Option<Interrupt>;
}

pub trait Console {
    fn write_bytes(&mut self, bytes: &[u8]);
    /// Read the byte latched by the last terminal interrupt.
    fn read_byte(&mut self) -> u8;
}

/// Access to the calling process's memory for system-call arguments.
pub trait UserMemory {
    fn read_user_byte(&self, addr: usize) -> Option<u8>;

    fn read_user(&self, addr: usize, len: usize) -> Option<Vec<u8>> {
        (0..len)
            .map(|offset| self.read_user_byte(addr.checked_add(offset)?))
            .collect()
    }
}

pub trait Platform: ContextService + InterruptController + Console + UserMemory {}

impl<T> Platform for T where T: ContextService + InterruptController + Console + UserMemory {}
