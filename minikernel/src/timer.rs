//! Timed sleep driven by the clock interrupt.

use log::trace;

use crate::kernel::{Kernel, Outcome};
use crate::platform::Platform;
use crate::process::PendingCall;
use crate::queue::{QueueLinks, QueueTag};

impl<P: Platform> Kernel<P> {
    /// Block the caller for `seconds` of clock time.
    pub fn sleep(&mut self, seconds: u32) -> Outcome<()> {
        let ticks = seconds.saturating_mul(self.config.ticks_per_second);
        self.sleep_ticks(ticks)
    }

    /// Block the caller for `ticks` clock interrupts. Zero returns at once
    /// without giving up the processor.
    pub fn sleep_ticks(&mut self, ticks: u32) -> Outcome<()> {
        if ticks == 0 {
            return Outcome::Done(());
        }
        self.critical(|k| {
            let pid = k.caller();
            k.processes.get_mut(pid).sleep_ticks = ticks;
            k.block_current(QueueTag::Sleep, PendingCall::Sleep);
            Outcome::Blocked
        })
    }

    /// Clock interrupt body: count down every sleeper and move the expired
    /// ones to the ready queue. Never switches context.
    pub(crate) fn tick(&mut self) {
        self.ticks += 1;

        let mut cursor = self.sleeping.head();
        while let Some(pid) = cursor {
            cursor = self.processes.link(pid).next();

            let pcb = self.processes.get_mut(pid);
            pcb.sleep_ticks = pcb.sleep_ticks.saturating_sub(1);
            if pcb.sleep_ticks == 0 {
                self.sleeping.remove(&mut self.processes, pid);
                trace!("process {pid} woke at tick {}", self.ticks);
                self.make_ready(pid);
            }
        }
    }
}
