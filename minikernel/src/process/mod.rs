//! Process control blocks.
//!
//! A process lives in a fixed slot of the [`ProcessTable`] for its whole
//! lifetime; its [`ProcessId`] is the slot index.

mod lifecycle;
mod table;

pub use table::ProcessTable;

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::mutex::MutexKind;
use crate::platform::ContextService;
use crate::queue::Link;

/// Process identifier: index into the process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(usize);

impl ProcessId {
    pub const fn new(index: usize) -> Self {
        ProcessId(index)
    }

    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Slot unused.
    Free,
    /// On the ready queue.
    Ready,
    /// Owns the processor. At most one process is in this state.
    Running,
    /// On the sleep queue, a mutex wait queue or the free-slot queue.
    Blocked,
    /// Finished; resources are being released.
    Terminated,
}

/// A system call that suspended its caller. It is finished when the process
/// is next dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCall {
    Sleep,
    /// Ownership is handed over by `unlock` before the waiter is woken.
    MutexLock { descriptor: usize },
    /// Waiting for a free mutex pool slot. `descriptor` is reserved in the
    /// caller's table.
    MutexCreate {
        name: String,
        kind: MutexKind,
        descriptor: usize,
    },
}

/// Process control block.
pub struct Pcb<P: ContextService> {
    id: ProcessId,
    state: ProcessState,
    program: String,
    pub(crate) context: Option<P::Context>,
    pub(crate) stack: Option<P::Stack>,
    pub(crate) image: Option<P::Image>,
    pub(crate) sleep_ticks: u32,
    descriptors: Vec<Option<usize>>,
    pub(crate) pending: Option<PendingCall>,
    pub(crate) link: Link,
}

impl<P: ContextService> Pcb<P> {
    fn free(id: ProcessId, descriptors: usize) -> Self {
        Self {
            id,
            state: ProcessState::Free,
            program: String::new(),
            context: None,
            stack: None,
            image: None,
            sleep_ticks: 0,
            descriptors: vec![None; descriptors],
            pending: None,
            link: Link::default(),
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ProcessState) {
        self.state = state;
    }

    /// Name of the program this process was created from.
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn context(&self) -> Option<&P::Context> {
        self.context.as_ref()
    }

    pub fn sleep_ticks(&self) -> u32 {
        self.sleep_ticks
    }

    pub fn pending(&self) -> Option<&PendingCall> {
        self.pending.as_ref()
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Mutex pool slot bound to `descriptor`, or `None` if the descriptor is
    /// out of range or unbound.
    pub fn descriptor(&self, descriptor: usize) -> Option<usize> {
        self.descriptors.get(descriptor).copied().flatten()
    }

    /// Lowest unbound descriptor.
    pub fn free_descriptor(&self) -> Option<usize> {
        self.descriptors.iter().position(Option::is_none)
    }

    /// Bound descriptors as `(descriptor, slot)` pairs.
    pub fn open_descriptors(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.descriptors
            .iter()
            .enumerate()
            .filter_map(|(descriptor, slot)| slot.map(|slot| (descriptor, slot)))
    }

    pub(crate) fn bind_descriptor(&mut self, descriptor: usize, slot: usize) {
        debug_assert!(self.descriptors[descriptor].is_none());
        self.descriptors[descriptor] = Some(slot);
    }

    pub(crate) fn unbind_descriptor(&mut self, descriptor: usize) -> Option<usize> {
        self.descriptors.get_mut(descriptor)?.take()
    }
}
