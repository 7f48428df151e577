//! The kernel state value.
//!
//! All process, queue and mutex tables live in one [`Kernel`] created by
//! [`Kernel::boot`]. System calls and interrupts are methods on it, so every
//! mutation goes through a single `&mut Kernel`.

use alloc::vec::Vec;

use log::info;

use crate::config::KernelConfig;
use crate::mutex::MutexPool;
use crate::platform::{InterruptLevel, Platform, Vector};
use crate::process::{Pcb, ProcessId, ProcessTable};
use crate::queue::{ProcessQueue, QueueTag};

/// Result of an operation that may suspend its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Finished without blocking.
    Done(T),
    /// The caller was blocked and another process dispatched. The result is
    /// written into the caller's saved context when it is resumed.
    Blocked,
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(value) => Outcome::Done(f(value)),
            Outcome::Blocked => Outcome::Blocked,
        }
    }
}

pub struct Kernel<P: Platform> {
    pub(crate) platform: P,
    pub(crate) config: KernelConfig,
    pub(crate) processes: ProcessTable<P>,
    pub(crate) ready: ProcessQueue,
    pub(crate) sleeping: ProcessQueue,
    pub(crate) mutexes: MutexPool,
    /// Processes blocked in `mutex_create` because the pool is full.
    pub(crate) slot_waiters: ProcessQueue,
    pub(crate) current: Option<ProcessId>,
    pub(crate) ticks: u64,
}

impl<P: Platform> Kernel<P> {
    /// Bring the kernel up: install handlers, start the clock, create the
    /// initial process and transfer control to it.
    ///
    /// On hardware the final switch never returns. With a platform whose
    /// `switch` does return, the kernel is handed back with the initial
    /// process running.
    ///
    /// Panics if the initial program cannot be loaded.
    pub fn boot(mut platform: P, config: KernelConfig) -> Self {
        config.assert_valid();

        platform.set_level(InterruptLevel::Clock);
        for vector in Vector::ALL {
            platform.enable(vector);
        }
        platform.start_clock(config.ticks_per_second);

        let mut kernel = Kernel {
            processes: ProcessTable::new(config.max_processes, config.descriptors_per_process),
            mutexes: MutexPool::new(config.max_mutexes),
            ready: ProcessQueue::new(QueueTag::Ready),
            sleeping: ProcessQueue::new(QueueTag::Sleep),
            slot_waiters: ProcessQueue::new(QueueTag::SlotWait),
            current: None,
            ticks: 0,
            platform,
            config,
        };

        let init_program = kernel.config.init_program;
        if let Err(err) = kernel.spawn(init_program) {
            panic!("initial process `{init_program}` could not be created: {err}");
        }
        info!("booting into `{init_program}`");

        let first = kernel.dispatch_next();
        kernel.switch_to(None, first);
        kernel.platform.set_level(InterruptLevel::Unmasked);
        kernel
    }

    /// Run `f` with every interrupt masked, restoring the previous level on
    /// return, whatever `f` returns.
    pub(crate) fn critical<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.platform.set_level(InterruptLevel::Clock);
        let result = f(self);
        self.platform.set_level(previous);
        result
    }

    /// The process on whose behalf a system call runs.
    pub(crate) fn caller(&self) -> ProcessId {
        self.current
            .expect("system call issued with no current process")
    }

    pub fn current(&self) -> Option<ProcessId> {
        self.current
    }

    pub fn process(&self, pid: ProcessId) -> Option<&Pcb<P>> {
        self.processes.lookup(pid)
    }

    pub fn processes(&self) -> &ProcessTable<P> {
        &self.processes
    }

    pub fn mutexes(&self) -> &MutexPool {
        &self.mutexes
    }

    pub fn ready_queue(&self) -> Vec<ProcessId> {
        self.ready.iter(&self.processes).collect()
    }

    pub fn sleep_queue(&self) -> Vec<ProcessId> {
        self.sleeping.iter(&self.processes).collect()
    }

    /// Processes waiting for a free mutex pool slot, in wake order.
    pub fn slot_waiters(&self) -> Vec<ProcessId> {
        self.slot_waiters.iter(&self.processes).collect()
    }

    /// Processes blocked on the mutex in `slot`, in hand-off order.
    pub fn mutex_waiters(&self, slot: usize) -> Vec<ProcessId> {
        self.mutexes
            .get(slot)
            .map(|mutex| mutex.wait_queue().iter(&self.processes).collect())
            .unwrap_or_default()
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Clock interrupts serviced since boot.
    pub fn uptime_ticks(&self) -> u64 {
        self.ticks
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }
}

#[cfg(any(test, feature = "testing"))]
impl<P: Platform> Kernel<P> {
    /// Assert every structural invariant of the process, queue and mutex
    /// tables.
    pub fn check_invariants(&self) {
        use crate::mutex::{Mutex, MutexKind, SlotState};
        use crate::process::{PendingCall, ProcessState};
        use crate::queue::QueueLinks;

        let running: Vec<ProcessId> = self
            .processes
            .iter()
            .filter(|pcb| pcb.state() == ProcessState::Running)
            .map(Pcb::id)
            .collect();
        assert!(running.len() <= 1, "several running processes: {running:?}");
        assert_eq!(running.first().copied(), self.current, "current is not the running process");

        let mut queues = alloc::vec![&self.ready, &self.sleeping, &self.slot_waiters];
        queues.extend(self.mutexes.iter().map(Mutex::wait_queue));
        for queue in queues {
            assert_eq!(queue.head().is_none(), queue.tail().is_none(), "{:?} head/tail", queue.tag());
            if let Some(tail) = queue.tail() {
                assert_eq!(self.processes.link(tail).next(), None, "{:?} tail is linked", queue.tag());
            }
            let members: Vec<ProcessId> = queue.iter(&self.processes).collect();
            assert_eq!(members.len(), queue.len(), "{:?} length", queue.tag());
            assert_eq!(members.last().copied(), queue.tail(), "{:?} tail", queue.tag());
            for pid in members {
                assert!(queue.contains(&self.processes, pid), "{pid} linked elsewhere");
            }
        }

        for pcb in self.processes.iter() {
            let queue = pcb.link().queue();
            match pcb.state() {
                ProcessState::Ready => assert_eq!(queue, Some(QueueTag::Ready), "{} not queued", pcb.id()),
                ProcessState::Blocked => {
                    assert!(
                        matches!(
                            queue,
                            Some(QueueTag::Sleep | QueueTag::SlotWait | QueueTag::MutexWait(_))
                        ),
                        "{} blocked on {queue:?}",
                        pcb.id()
                    );
                    assert!(pcb.pending().is_some(), "{} blocked with nothing pending", pcb.id());
                }
                ProcessState::Free | ProcessState::Running | ProcessState::Terminated => {
                    assert_eq!(queue, None, "{} is {:?} but queued", pcb.id(), pcb.state())
                }
            }
            if queue == Some(QueueTag::Sleep) {
                assert!(pcb.sleep_ticks() > 0);
            }
        }

        let mut busy = 0;
        for (slot, mutex) in self.mutexes.iter().enumerate() {
            assert_eq!(
                mutex.owner().is_some(),
                mutex.lock_count() > 0,
                "slot {slot}: owner {:?} with count {}",
                mutex.owner(),
                mutex.lock_count()
            );
            if mutex.lock_count() > 1 {
                assert_eq!(mutex.kind(), MutexKind::Recursive, "slot {slot} relocked");
            }
            if !mutex.wait_queue().is_empty() {
                assert!(mutex.owner().is_some(), "slot {slot} has waiters but no owner");
            }

            let refs = self
                .processes
                .iter()
                .flat_map(|pcb| pcb.open_descriptors())
                .filter(|&(_, bound)| bound == slot)
                .count();
            assert_eq!(mutex.refs(), refs, "slot {slot} reference count");

            match mutex.state() {
                SlotState::Busy => {
                    busy += 1;
                    assert!(mutex.refs() > 0);
                    assert_eq!(self.mutexes.find(mutex.name()), Some(slot), "duplicate name");
                }
                SlotState::Free => {
                    assert_eq!(mutex.refs(), 0);
                    assert!(mutex.owner().is_none() && mutex.wait_queue().is_empty());
                }
            }
        }
        assert_eq!(busy, self.mutexes.busy(), "busy slot count");

        // Each free slot must have a woken creator on its way, or nobody
        // left waiting for one.
        if !self.slot_waiters.is_empty() {
            let free = self.mutexes.capacity() - self.mutexes.busy();
            let woken = self
                .processes
                .iter()
                .filter(|pcb| pcb.state() == ProcessState::Ready)
                .filter(|pcb| matches!(pcb.pending(), Some(PendingCall::MutexCreate { .. })))
                .count();
            assert!(
                free <= woken,
                "{free} free mutex slots but only {woken} woken creators for {:?}",
                self.slot_waiters()
            );
        }
    }
}
