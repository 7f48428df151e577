//! Interrupt and exception entry points.

use log::{info, trace, warn};

use crate::kernel::Kernel;
use crate::platform::{Exception, Interrupt, Platform};

impl<P: Platform> Kernel<P> {
    /// Entry point for a hardware or software interrupt taken while a
    /// process was running.
    pub fn handle_interrupt(&mut self, interrupt: Interrupt) {
        self.critical(|k| k.service_interrupt(interrupt));
    }

    /// Entry point for a processor exception. An exception in user mode
    /// terminates the offending process; in kernel mode it is fatal.
    pub fn handle_exception(&mut self, exception: Exception, from_user: bool) {
        if !from_user {
            panic!("{exception:?} exception while executing kernel code");
        }
        warn!(
            "{exception:?} exception in process {:?}, terminating it",
            self.current
        );
        self.terminate_process();
    }

    /// Interrupt bodies. Also called from the idle loop, which runs them
    /// with the level it restored after halting.
    pub(crate) fn service_interrupt(&mut self, interrupt: Interrupt) {
        match interrupt {
            Interrupt::Clock => self.tick(),
            Interrupt::Terminal => {
                let byte = self.platform.read_byte();
                info!("terminal input {:#04x} ({:?})", byte, byte as char);
            }
            Interrupt::Software => trace!("software interrupt"),
        }
    }
}
