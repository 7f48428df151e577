//! Process creation and termination.

use log::{debug, info};

use super::{ProcessId, ProcessState};
use crate::error::{KernelError, KernelResult};
use crate::kernel::Kernel;
use crate::platform::Platform;

impl<P: Platform> Kernel<P> {
    /// Create a process running `program` and append it to the ready queue.
    /// The caller keeps running.
    pub fn create_process(&mut self, program: &str) -> KernelResult<ProcessId> {
        self.critical(|k| k.spawn(program))
    }

    /// Terminate the caller. Its mutexes are closed, handing any it owned to
    /// their next waiter, and the processor passes to the next ready process.
    pub fn terminate_process(&mut self) {
        self.critical(|k| k.exit_current());
    }

    pub fn get_pid(&self) -> ProcessId {
        self.caller()
    }

    pub(crate) fn spawn(&mut self, program: &str) -> KernelResult<ProcessId> {
        let pid = self
            .processes
            .allocate_slot()
            .ok_or(KernelError::ResourceExhausted)?;
        self.processes
            .populate(pid, program, self.config.stack_size, &mut self.platform)
            .ok_or(KernelError::NotFound)?;
        self.ready.push_back(&mut self.processes, pid);
        info!("created process {pid} running `{program}`");
        Ok(pid)
    }

    fn exit_current(&mut self) {
        let pid = self.caller();
        debug!("process {pid} exiting");

        self.close_all_descriptors(pid);
        let pcb = self.processes.get_mut(pid);
        if let Some(image) = pcb.image.take() {
            self.platform.release_image(image);
        }
        pcb.set_state(ProcessState::Terminated);
        self.current = None;

        // The outgoing stack is still in use until the next process is known.
        let next = self.dispatch_next();
        self.processes.release_slot(pid, &mut self.platform);
        self.switch_to(None, next);
    }
}

#[cfg(test)]
mod tests {
    use crate::config::KernelConfig;
    use crate::error::KernelError;
    use crate::process::{ProcessId, ProcessState};
    use crate::testing;

    #[test]
    fn created_process_is_queued_behind_caller() {
        let mut kernel = testing::boot(&["init", "worker"], KernelConfig::default());
        let init = kernel.get_pid();
        let worker = kernel.create_process("worker").unwrap();

        assert_eq!(kernel.current(), Some(init));
        assert_eq!(kernel.ready_queue(), [worker]);
        assert_eq!(kernel.process(worker).unwrap().state(), ProcessState::Ready);
        assert_eq!(kernel.process(worker).unwrap().program(), "worker");
        kernel.check_invariants();
    }

    #[test]
    fn unknown_program_is_not_found() {
        let mut kernel = testing::boot(&["init"], KernelConfig::default());
        assert_eq!(kernel.create_process("nope"), Err(KernelError::NotFound));
        assert!(kernel.ready_queue().is_empty());
        assert_eq!(kernel.processes().count(ProcessState::Free), 9);
    }

    #[test]
    fn full_table_is_exhausted() {
        let config = KernelConfig::default().with_max_processes(2);
        let mut kernel = testing::boot(&["init", "worker"], config);
        kernel.create_process("worker").unwrap();
        assert_eq!(
            kernel.create_process("worker"),
            Err(KernelError::ResourceExhausted)
        );
    }

    #[test]
    fn terminated_slot_is_reused() {
        let mut kernel = testing::boot(&["init", "worker"], KernelConfig::default());
        let worker = kernel.create_process("worker").unwrap();
        kernel.terminate_process();

        assert_eq!(kernel.current(), Some(worker));
        assert_eq!(
            kernel.process(ProcessId::new(0)).unwrap().state(),
            ProcessState::Free
        );
        assert_eq!(kernel.platform().live_images(), 1);
        assert_eq!(kernel.platform().live_stacks(), 1);
        assert_eq!(kernel.create_process("worker"), Ok(ProcessId::new(0)));
        kernel.check_invariants();
    }
}
