//! x86_64 interrupt controller and serial console.

use alloc::collections::VecDeque;

use core::fmt;

use spinning_top::Spinlock;
use x86_64::instructions::interrupts;
use x86_64::instructions::port::Port;

use crate::platform::{Console, Interrupt, InterruptController, InterruptLevel, Vector};

const COM1: u16 = 0x3f8;

const PIT_CHANNEL0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;
const PIT_BASE_FREQUENCY: u32 = 1_193_182;
/// Channel 0, lobyte/hibyte, mode 3 (square wave), binary.
const PIT_SQUARE_WAVE: u8 = 0b0011_0110;

/// Interrupts raised by the interrupt stubs and not yet consumed by the
/// kernel.
static PENDING: Spinlock<VecDeque<Interrupt>> = Spinlock::new(VecDeque::new());

/// Record `interrupt` for the kernel. Called from interrupt stubs.
pub fn raise(interrupt: Interrupt) {
    PENDING.lock().push_back(interrupt);
}

fn take_pending() -> Option<Interrupt> {
    interrupts::without_interrupts(|| PENDING.lock().pop_front())
}

/// PIT reload value for `hz` interrupts per second.
fn pit_divisor(hz: u32) -> u16 {
    u16::try_from(PIT_BASE_FREQUENCY / hz.max(1)).unwrap_or(u16::MAX)
}

/// The CPU has one interrupt flag, so levels that mask any hardware
/// interrupt mask them all.
fn admits_hardware(level: InterruptLevel) -> bool {
    level <= InterruptLevel::Software
}

pub struct X86Interrupts {
    level: InterruptLevel,
    enabled: [bool; Vector::ALL.len()],
}

impl X86Interrupts {
    pub const fn new() -> Self {
        Self {
            level: InterruptLevel::Clock,
            enabled: [false; Vector::ALL.len()],
        }
    }

    pub fn is_enabled(&self, vector: Vector) -> bool {
        self.enabled[vector as usize]
    }
}

impl Default for X86Interrupts {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptController for X86Interrupts {
    fn set_level(&mut self, level: InterruptLevel) -> InterruptLevel {
        if admits_hardware(level) {
            interrupts::enable();
        } else {
            interrupts::disable();
        }
        core::mem::replace(&mut self.level, level)
    }

    fn enable(&mut self, vector: Vector) {
        self.enabled[vector as usize] = true;
    }

    fn start_clock(&mut self, ticks_per_second: u32) {
        let divisor = pit_divisor(ticks_per_second);
        let mut command: Port<u8> = Port::new(PIT_COMMAND);
        let mut data: Port<u8> = Port::new(PIT_CHANNEL0);
        unsafe {
            command.write(PIT_SQUARE_WAVE);
            data.write((divisor & 0xff) as u8);
            data.write((divisor >> 8) as u8);
        }
    }

    fn halt_until_interrupt(&mut self) -> Option<Interrupt> {
        if !self.is_enabled(Vector::Clock) && !self.is_enabled(Vector::Terminal) {
            return take_pending();
        }
        loop {
            if let Some(interrupt) = take_pending() {
                return Some(interrupt);
            }
            interrupts::enable_and_hlt();
            interrupts::disable();
        }
    }
}

/// 16550 UART on COM1.
pub struct SerialConsole {
    port: u16,
}

impl SerialConsole {
    pub const fn new() -> Self {
        Self { port: COM1 }
    }
}

impl Default for SerialConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for SerialConsole {
    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut port: Port<u8> = Port::new(self.port);
        for byte in bytes {
            unsafe {
                port.write(*byte);
            }
        }
    }

    fn read_byte(&mut self) -> u8 {
        let mut port: Port<u8> = Port::new(self.port);
        unsafe { port.read() }
    }
}

/// Lets the serial port serve as the log sink.
impl fmt::Write for SerialConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisor_for_common_rates() {
        assert_eq!(pit_divisor(100), 11931);
        assert_eq!(pit_divisor(1000), 1193);
        assert_eq!(pit_divisor(1), u16::MAX);
        assert_eq!(pit_divisor(0), u16::MAX);
    }

    #[test]
    fn only_low_levels_admit_hardware_interrupts() {
        assert!(admits_hardware(InterruptLevel::Unmasked));
        assert!(admits_hardware(InterruptLevel::Software));
        assert!(!admits_hardware(InterruptLevel::Terminal));
        assert!(!admits_hardware(InterruptLevel::Clock));
    }

    #[test]
    fn vectors_are_tracked_individually() {
        let mut controller = X86Interrupts::new();
        controller.enable(Vector::Syscall);
        assert!(controller.is_enabled(Vector::Syscall));
        assert!(!controller.is_enabled(Vector::Clock));
    }
}
