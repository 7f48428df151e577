//! FIFO dispatch over the ready queue.
//!
//! There is no preemption: the running process keeps the processor until it
//! blocks, sleeps or terminates. When nothing is ready the processor idles at
//! the lowest level that still admits hardware interrupts.

use log::{debug, trace};

use crate::kernel::Kernel;
use crate::platform::{InterruptLevel, Platform};
use crate::process::{PendingCall, ProcessId, ProcessState};
use crate::queue::QueueTag;

impl<P: Platform> Kernel<P> {
    /// Take the head of the ready queue, idling until one exists.
    ///
    /// Panics if the processor would halt with nothing able to wake it.
    pub(crate) fn schedule(&mut self) -> ProcessId {
        loop {
            if let Some(pid) = self.ready.pop_front(&mut self.processes) {
                return pid;
            }
            self.idle();
        }
    }

    fn idle(&mut self) {
        trace!("no process ready, halting");
        let previous = self.platform.set_level(InterruptLevel::Software);
        let interrupt = self.platform.halt_until_interrupt();
        self.platform.set_level(previous);

        let Some(interrupt) = interrupt else {
            panic!("idle with no interrupt source left to wake a process");
        };
        self.service_interrupt(interrupt);
    }

    /// Pick the next process and finish its pending system call, repeating
    /// while resumed calls block again. The result is `current`.
    pub(crate) fn dispatch_next(&mut self) -> ProcessId {
        loop {
            let pid = self.schedule();
            self.processes.get_mut(pid).set_state(ProcessState::Running);
            self.current = Some(pid);
            if self.resume(pid) {
                return pid;
            }
        }
    }

    /// Finish `pid`'s pending call. Returns false if it blocked again.
    fn resume(&mut self, pid: ProcessId) -> bool {
        let Some(pending) = self.processes.get_mut(pid).pending.take() else {
            return true;
        };

        match pending {
            PendingCall::Sleep | PendingCall::MutexLock { .. } => {
                self.set_return(pid, 0);
                true
            }
            PendingCall::MutexCreate {
                name,
                kind,
                descriptor,
            } => match self.retry_mutex_create(pid, &name, kind, descriptor) {
                Some(result) => {
                    self.set_return(pid, crate::error::into_return(result));
                    true
                }
                None => {
                    debug!("process {pid} still waiting for a mutex slot");
                    let pcb = self.processes.get_mut(pid);
                    pcb.set_state(ProcessState::Blocked);
                    pcb.pending = Some(PendingCall::MutexCreate {
                        name,
                        kind,
                        descriptor,
                    });
                    self.slot_waiters.push_front(&mut self.processes, pid);
                    self.current = None;
                    false
                }
            },
        }
    }

    /// Suspend the caller on the queue named by `tag` and run something else.
    /// `pending` is finished when the caller is dispatched again.
    pub(crate) fn block_current(&mut self, tag: QueueTag, pending: PendingCall) {
        let pid = self.caller();
        let pcb = self.processes.get_mut(pid);
        pcb.set_state(ProcessState::Blocked);
        pcb.pending = Some(pending);
        self.enqueue(tag, pid);
        debug!("process {pid} blocked on {tag:?}");

        self.current = None;
        let next = self.dispatch_next();
        self.switch_to(Some(pid), next);
    }

    /// Mark `pid` Ready and append it to the ready queue.
    pub(crate) fn make_ready(&mut self, pid: ProcessId) {
        self.processes.get_mut(pid).set_state(ProcessState::Ready);
        self.ready.push_back(&mut self.processes, pid);
        trace!("process {pid} ready");
    }

    fn enqueue(&mut self, tag: QueueTag, pid: ProcessId) {
        match tag {
            QueueTag::Ready => self.ready.push_back(&mut self.processes, pid),
            QueueTag::Sleep => self.sleeping.push_back(&mut self.processes, pid),
            QueueTag::SlotWait => self.slot_waiters.push_back(&mut self.processes, pid),
            QueueTag::MutexWait(slot) => self
                .mutexes
                .get_mut(slot)
                .wait_queue
                .push_back(&mut self.processes, pid),
        }
    }

    /// Transfer the processor to `incoming`, saving `outgoing`'s context if
    /// there is one. Nothing happens when a process is resumed in place.
    pub(crate) fn switch_to(&mut self, outgoing: Option<ProcessId>, incoming: ProcessId) {
        if outgoing == Some(incoming) {
            trace!("process {incoming} continues");
            return;
        }
        debug!("switch {outgoing:?} -> {incoming}");

        match outgoing {
            Some(outgoing) => {
                let (from, to) = self.processes.pair_mut(outgoing, incoming);
                let (Some(from), Some(to)) = (from.context.as_mut(), to.context.as_ref()) else {
                    panic!("switch between processes without contexts");
                };
                self.platform.switch(Some(from), to);
            }
            None => {
                let Some(to) = self.processes.get(incoming).context.as_ref() else {
                    panic!("process {incoming} has no context");
                };
                self.platform.switch(None, to);
            }
        }
    }

    /// Write a system-call result into `pid`'s saved context.
    pub(crate) fn set_return(&mut self, pid: ProcessId, value: isize) {
        if let Some(context) = self.processes.get_mut(pid).context.as_mut() {
            self.platform.set_return_value(context, value);
        }
    }
}
