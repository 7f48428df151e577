use alloc::string::String;
use alloc::vec::Vec;

use log::debug;

use super::{Pcb, ProcessId, ProcessState};
use crate::platform::{ContextService, EntryPoint};
use crate::queue::{Link, QueueLinks};

/// Fixed-capacity arena of PCBs.
pub struct ProcessTable<P: ContextService> {
    slots: Vec<Pcb<P>>,
}

impl<P: ContextService> ProcessTable<P> {
    pub fn new(capacity: usize, descriptors_per_process: usize) -> Self {
        Self {
            slots: (0..capacity)
                .map(|i| Pcb::free(ProcessId::new(i), descriptors_per_process))
                .collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// First free slot, or `None` if the table is full.
    pub fn allocate_slot(&self) -> Option<ProcessId> {
        self.slots
            .iter()
            .find(|pcb| pcb.state == ProcessState::Free)
            .map(Pcb::id)
    }

    /// Load `program` into the free slot `pid`, leaving it Ready but not yet
    /// queued. Returns `None` and leaves the slot free if the image cannot be
    /// built.
    pub(crate) fn populate(
        &mut self,
        pid: ProcessId,
        program: &str,
        stack_size: usize,
        platform: &mut P,
    ) -> Option<()> {
        debug_assert_eq!(self.get(pid).state, ProcessState::Free);

        let (image, entry): (P::Image, EntryPoint) = platform.build_image(program)?;
        let stack = platform.build_stack(stack_size);
        let context = platform.init_context(&image, &stack, stack_size, entry);

        let pcb = self.get_mut(pid);
        pcb.program = String::from(program);
        pcb.image = Some(image);
        pcb.stack = Some(stack);
        pcb.context = Some(context);
        pcb.sleep_ticks = 0;
        pcb.pending = None;
        pcb.state = ProcessState::Ready;
        Some(())
    }

    /// Release whatever stack and image `pid` still holds and mark it Free.
    pub(crate) fn release_slot(&mut self, pid: ProcessId, platform: &mut P) {
        let pcb = self.get_mut(pid);
        debug_assert!(pcb.link.queue().is_none(), "{pid:?} released while queued");
        debug_assert!(pcb.open_descriptors().next().is_none());

        if let Some(stack) = pcb.stack.take() {
            platform.release_stack(stack);
        }
        if let Some(image) = pcb.image.take() {
            platform.release_image(image);
        }
        pcb.context = None;
        pcb.pending = None;
        pcb.sleep_ticks = 0;
        pcb.program.clear();
        pcb.state = ProcessState::Free;
        debug!("process {pid} slot released");
    }

    pub fn get(&self, pid: ProcessId) -> &Pcb<P> {
        &self.slots[pid.as_usize()]
    }

    pub(crate) fn get_mut(&mut self, pid: ProcessId) -> &mut Pcb<P> {
        &mut self.slots[pid.as_usize()]
    }

    /// Look up a process by id, rejecting ids outside the table.
    pub fn lookup(&self, pid: ProcessId) -> Option<&Pcb<P>> {
        self.slots.get(pid.as_usize())
    }

    /// Two distinct PCBs at once: the first mutably, for saving a context
    /// while the second's is restored.
    pub(crate) fn pair_mut(&mut self, a: ProcessId, b: ProcessId) -> (&mut Pcb<P>, &Pcb<P>) {
        let (a, b) = (a.as_usize(), b.as_usize());
        assert_ne!(a, b, "a process cannot switch to itself");
        if a < b {
            let (low, high) = self.slots.split_at_mut(b);
            (&mut low[a], &high[0])
        } else {
            let (low, high) = self.slots.split_at_mut(a);
            (&mut high[0], &low[b])
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pcb<P>> {
        self.slots.iter()
    }

    /// Processes in a given state.
    pub fn count(&self, state: ProcessState) -> usize {
        self.slots.iter().filter(|pcb| pcb.state == state).count()
    }
}

impl<P: ContextService> QueueLinks for ProcessTable<P> {
    fn link(&self, pid: ProcessId) -> &Link {
        &self.slots[pid.as_usize()].link
    }

    fn link_mut(&mut self, pid: ProcessId) -> &mut Link {
        &mut self.slots[pid.as_usize()].link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlatform;

    fn table(capacity: usize) -> (ProcessTable<MockPlatform>, MockPlatform) {
        let platform = MockPlatform::new(&["init", "worker"]);
        (ProcessTable::new(capacity, 2), platform)
    }

    #[test]
    fn allocate_scans_for_first_free_slot() {
        let (mut table, mut platform) = table(3);
        let first = table.allocate_slot().unwrap();
        assert_eq!(first, ProcessId::new(0));
        table.populate(first, "init", 1024, &mut platform).unwrap();
        assert_eq!(table.allocate_slot(), Some(ProcessId::new(1)));
        assert_eq!(table.get(first).state(), ProcessState::Ready);
        assert_eq!(table.get(first).program(), "init");
    }

    #[test]
    fn full_table_has_no_slot() {
        let (mut table, mut platform) = table(2);
        for _ in 0..2 {
            let pid = table.allocate_slot().unwrap();
            table.populate(pid, "worker", 1024, &mut platform).unwrap();
        }
        assert_eq!(table.allocate_slot(), None);
    }

    #[test]
    fn unknown_program_leaves_slot_free() {
        let (mut table, mut platform) = table(1);
        let pid = table.allocate_slot().unwrap();
        assert!(table.populate(pid, "missing", 1024, &mut platform).is_none());
        assert_eq!(table.get(pid).state(), ProcessState::Free);
        assert_eq!(platform.live_stacks(), 0);
    }

    #[test]
    fn release_returns_resources() {
        let (mut table, mut platform) = table(1);
        let pid = table.allocate_slot().unwrap();
        table.populate(pid, "init", 1024, &mut platform).unwrap();
        assert_eq!(platform.live_images(), 1);
        assert_eq!(platform.live_stacks(), 1);

        table.release_slot(pid, &mut platform);
        assert_eq!(platform.live_images(), 0);
        assert_eq!(platform.live_stacks(), 0);
        assert_eq!(table.get(pid).state(), ProcessState::Free);
        assert_eq!(table.allocate_slot(), Some(pid));
    }

    #[test]
    fn descriptors_bind_and_unbind() {
        let (mut table, _) = table(1);
        let pcb = table.get_mut(ProcessId::new(0));
        assert_eq!(pcb.free_descriptor(), Some(0));
        pcb.bind_descriptor(0, 7);
        assert_eq!(pcb.descriptor(0), Some(7));
        assert_eq!(pcb.free_descriptor(), Some(1));
        pcb.bind_descriptor(1, 2);
        assert_eq!(pcb.free_descriptor(), None);
        assert_eq!(pcb.descriptor(5), None);
        assert_eq!(pcb.unbind_descriptor(0), Some(7));
        assert_eq!(pcb.open_descriptors().collect::<Vec<_>>(), [(1, 2)]);
    }

    #[test]
    fn pair_mut_in_both_orders() {
        let (mut table, _) = table(3);
        let (a, b) = table.pair_mut(ProcessId::new(2), ProcessId::new(0));
        assert_eq!(a.id(), ProcessId::new(2));
        assert_eq!(b.id(), ProcessId::new(0));
        let (a, b) = table.pair_mut(ProcessId::new(0), ProcessId::new(1));
        assert_eq!(a.id(), ProcessId::new(0));
        assert_eq!(b.id(), ProcessId::new(1));
    }
}
