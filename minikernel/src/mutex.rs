//! Named kernel mutexes.
//!
//! Mutexes live in a fixed pool. A process reaches one through a descriptor,
//! a small index into its own descriptor table. A slot stays busy while any
//! descriptor anywhere references it; ownership belongs to the process, not
//! to the descriptor it locked through.

use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, trace};

use crate::error::{KernelError, KernelResult};
use crate::kernel::{Kernel, Outcome};
use crate::platform::Platform;
use crate::process::{PendingCall, ProcessId};
use crate::queue::{ProcessQueue, QueueTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexKind {
    /// Relocking by the owner is an error.
    NonRecursive,
    /// The owner may relock; each lock needs a matching unlock.
    Recursive,
}

impl MutexKind {
    /// Decode the kind argument of `mutex_create`.
    pub fn from_abi(kind: usize) -> Option<Self> {
        match kind {
            minikernel_abi::MUTEX_NON_RECURSIVE => Some(MutexKind::NonRecursive),
            minikernel_abi::MUTEX_RECURSIVE => Some(MutexKind::Recursive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Busy,
}

#[derive(Debug)]
pub struct Mutex {
    state: SlotState,
    name: String,
    kind: MutexKind,
    owner: Option<ProcessId>,
    lock_count: u32,
    pub(crate) wait_queue: ProcessQueue,
    /// Descriptors, across all processes, bound to this slot.
    refs: usize,
}

impl Mutex {
    fn free(slot: usize) -> Self {
        Self {
            state: SlotState::Free,
            name: String::new(),
            kind: MutexKind::NonRecursive,
            owner: None,
            lock_count: 0,
            wait_queue: ProcessQueue::new(QueueTag::MutexWait(slot)),
            refs: 0,
        }
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MutexKind {
        self.kind
    }

    pub fn owner(&self) -> Option<ProcessId> {
        self.owner
    }

    pub fn lock_count(&self) -> u32 {
        self.lock_count
    }

    pub fn refs(&self) -> usize {
        self.refs
    }

    pub fn wait_queue(&self) -> &ProcessQueue {
        &self.wait_queue
    }
}

/// Fixed-size pool of mutex slots.
pub struct MutexPool {
    slots: Vec<Mutex>,
    busy: usize,
}

impl MutexPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(Mutex::free).collect(),
            busy: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of busy slots.
    pub fn busy(&self) -> usize {
        self.busy
    }

    pub fn get(&self, slot: usize) -> Option<&Mutex> {
        self.slots.get(slot)
    }

    pub(crate) fn get_mut(&mut self, slot: usize) -> &mut Mutex {
        &mut self.slots[slot]
    }

    /// Slot of the busy mutex called `name`.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|m| m.state == SlotState::Busy && m.name == name)
    }

    pub fn free_slot(&self) -> Option<usize> {
        if self.busy == self.slots.len() {
            return None;
        }
        self.slots.iter().position(|m| m.state == SlotState::Free)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mutex> {
        self.slots.iter()
    }

    /// Claim a free slot for a new mutex with one reference.
    fn claim(&mut self, slot: usize, name: &str, kind: MutexKind) {
        let mutex = &mut self.slots[slot];
        debug_assert_eq!(mutex.state, SlotState::Free);
        mutex.state = SlotState::Busy;
        mutex.name = String::from(name);
        mutex.kind = kind;
        mutex.owner = None;
        mutex.lock_count = 0;
        mutex.refs = 1;
        self.busy += 1;
    }

    /// Drop one reference. Returns true when the slot became free.
    fn release_ref(&mut self, slot: usize) -> bool {
        let mutex = &mut self.slots[slot];
        debug_assert!(mutex.refs > 0, "slot {slot} has no references");
        mutex.refs -= 1;
        if mutex.refs > 0 {
            return false;
        }
        debug_assert!(mutex.owner.is_none() && mutex.wait_queue.is_empty());
        mutex.state = SlotState::Free;
        mutex.name.clear();
        self.busy -= 1;
        true
    }
}

impl<P: Platform> Kernel<P> {
    /// Create a mutex called `name` and bind it to a new descriptor of the
    /// caller.
    ///
    /// When every pool slot is busy the caller blocks until one is freed;
    /// the name is checked again on wake-up.
    pub fn mutex_create(&mut self, name: &str, kind: MutexKind) -> KernelResult<Outcome<usize>> {
        self.critical(|k| {
            k.check_mutex_name(name)?;
            if k.mutexes.find(name).is_some() {
                return Err(KernelError::Conflict);
            }
            let caller = k.caller();
            let descriptor = k
                .processes
                .get(caller)
                .free_descriptor()
                .ok_or(KernelError::ResourceExhausted)?;

            match k.mutexes.free_slot() {
                Some(slot) => Ok(Outcome::Done(k.bind_new_mutex(caller, slot, name, kind, descriptor))),
                None => {
                    debug!("process {caller} waits for a free mutex slot to create `{name}`");
                    let pending = PendingCall::MutexCreate {
                        name: String::from(name),
                        kind,
                        descriptor,
                    };
                    k.block_current(QueueTag::SlotWait, pending);
                    Ok(Outcome::Blocked)
                }
            }
        })
    }

    /// Bind an existing mutex to a new descriptor of the caller.
    pub fn mutex_open(&mut self, name: &str) -> KernelResult<usize> {
        self.critical(|k| {
            let slot = k.mutexes.find(name).ok_or(KernelError::NotFound)?;
            let caller = k.caller();
            let pcb = k.processes.get_mut(caller);
            let descriptor = pcb.free_descriptor().ok_or(KernelError::ResourceExhausted)?;
            pcb.bind_descriptor(descriptor, slot);
            k.mutexes.get_mut(slot).refs += 1;
            trace!("process {caller} opened `{name}` as descriptor {descriptor}");
            Ok(descriptor)
        })
    }

    /// Acquire the mutex behind `descriptor`, blocking while another process
    /// owns it.
    pub fn mutex_lock(&mut self, descriptor: usize) -> KernelResult<Outcome<()>> {
        self.critical(|k| {
            let caller = k.caller();
            let slot = k.slot_of(caller, descriptor)?;
            let mutex = k.mutexes.get_mut(slot);
            let owner = mutex.owner;

            match owner {
                None => {
                    mutex.owner = Some(caller);
                    mutex.lock_count = 1;
                    Ok(Outcome::Done(()))
                }
                Some(holder) if holder == caller => match mutex.kind {
                    MutexKind::NonRecursive => Err(KernelError::Conflict),
                    MutexKind::Recursive => {
                        mutex.lock_count = mutex
                            .lock_count
                            .checked_add(1)
                            .ok_or(KernelError::ResourceExhausted)?;
                        Ok(Outcome::Done(()))
                    }
                },
                Some(holder) => {
                    debug!("process {caller} waits for `{}` held by {holder}", mutex.name);
                    k.block_current(QueueTag::MutexWait(slot), PendingCall::MutexLock { descriptor });
                    Ok(Outcome::Blocked)
                }
            }
        })
    }

    /// Release one level of the caller's hold on the mutex. The last release
    /// hands ownership straight to the oldest waiter.
    pub fn mutex_unlock(&mut self, descriptor: usize) -> KernelResult<()> {
        self.critical(|k| {
            let caller = k.caller();
            let slot = k.slot_of(caller, descriptor)?;
            k.release_lock(caller, slot)
        })
    }

    /// Unbind `descriptor`. If the caller owns the mutex it is released
    /// completely first; the slot is freed with its last reference.
    pub fn mutex_close(&mut self, descriptor: usize) -> KernelResult<()> {
        self.critical(|k| {
            let caller = k.caller();
            let slot = k.slot_of(caller, descriptor)?;
            k.close_descriptor(caller, descriptor, slot);
            Ok(())
        })
    }

    /// Close every descriptor `pid` holds, in descriptor order.
    pub(crate) fn close_all_descriptors(&mut self, pid: ProcessId) {
        let open: Vec<(usize, usize)> = self.processes.get(pid).open_descriptors().collect();
        for (descriptor, slot) in open {
            self.close_descriptor(pid, descriptor, slot);
        }
    }

    /// Finish a `mutex_create` that was waiting for a slot. `None` means the
    /// pool is still full.
    pub(crate) fn retry_mutex_create(
        &mut self,
        pid: ProcessId,
        name: &str,
        kind: MutexKind,
        descriptor: usize,
    ) -> Option<KernelResult<usize>> {
        if self.mutexes.find(name).is_some() {
            debug!("process {pid} woke to find `{name}` already created");
            // The slot that woke us is still free; the next waiter gets it.
            if self.mutexes.free_slot().is_some() {
                self.wake_slot_waiter();
            }
            return Some(Err(KernelError::Conflict));
        }
        let slot = self.mutexes.free_slot()?;
        Some(Ok(self.bind_new_mutex(pid, slot, name, kind, descriptor)))
    }

    fn check_mutex_name(&self, name: &str) -> KernelResult<()> {
        if name.is_empty() || name.len() > self.config.max_mutex_name {
            return Err(KernelError::InvalidArgument);
        }
        Ok(())
    }

    fn slot_of(&self, pid: ProcessId, descriptor: usize) -> KernelResult<usize> {
        self.processes
            .get(pid)
            .descriptor(descriptor)
            .ok_or(KernelError::NotFound)
    }

    fn bind_new_mutex(
        &mut self,
        pid: ProcessId,
        slot: usize,
        name: &str,
        kind: MutexKind,
        descriptor: usize,
    ) -> usize {
        self.mutexes.claim(slot, name, kind);
        self.processes.get_mut(pid).bind_descriptor(descriptor, slot);
        debug!("process {pid} created `{name}` ({kind:?}) in slot {slot} as descriptor {descriptor}");
        descriptor
    }

    fn release_lock(&mut self, pid: ProcessId, slot: usize) -> KernelResult<()> {
        let mutex = self.mutexes.get_mut(slot);
        if mutex.owner != Some(pid) || mutex.lock_count == 0 {
            return Err(KernelError::Conflict);
        }
        mutex.lock_count -= 1;
        if mutex.lock_count > 0 {
            return Ok(());
        }

        let next = mutex.wait_queue.pop_front(&mut self.processes);
        mutex.owner = next;
        if let Some(next) = next {
            mutex.lock_count = 1;
            trace!("`{}` handed from {pid} to {next}", mutex.name);
            self.make_ready(next);
        }
        Ok(())
    }

    fn close_descriptor(&mut self, pid: ProcessId, descriptor: usize, slot: usize) {
        let mutex = self.mutexes.get_mut(slot);
        if mutex.owner == Some(pid) {
            // Drop every recursive level at once; the last one hands off.
            mutex.lock_count = 1;
            if self.release_lock(pid, slot).is_err() {
                unreachable!("owner could not release slot {slot}");
            }
        }

        self.processes.get_mut(pid).unbind_descriptor(descriptor);
        if self.mutexes.release_ref(slot) {
            debug!("mutex slot {slot} freed");
            self.wake_slot_waiter();
        }
    }

    fn wake_slot_waiter(&mut self) {
        if let Some(waiter) = self.slot_waiters.pop_front(&mut self.processes) {
            self.make_ready(waiter);
        }
    }
}
