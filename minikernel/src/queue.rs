//! Intrusive FIFO queues of processes.
//!
//! Queues never own processes. Each PCB carries a single [`Link`] and the
//! queue only stores head and tail ids, so a process can sit on at most one
//! queue at a time: the ready queue, the sleep queue, one mutex's wait queue
//! or the free-slot queue. The link records which queue holds it.

use crate::process::ProcessId;

/// Identifies a queue, stored in the link of every member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueTag {
    Ready,
    Sleep,
    /// Wait queue of the mutex in this pool slot.
    MutexWait(usize),
    /// Processes blocked in `mutex_create` until a pool slot frees up.
    SlotWait,
}

/// Per-process link field.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    next: Option<ProcessId>,
    queue: Option<QueueTag>,
}

impl Link {
    pub fn queue(&self) -> Option<QueueTag> {
        self.queue
    }

    pub fn next(&self) -> Option<ProcessId> {
        self.next
    }
}

/// Storage that owns the link fields a queue threads through.
pub trait QueueLinks {
    fn link(&self, pid: ProcessId) -> &Link;
    fn link_mut(&mut self, pid: ProcessId) -> &mut Link;
}

#[derive(Debug)]
pub struct ProcessQueue {
    tag: QueueTag,
    head: Option<ProcessId>,
    tail: Option<ProcessId>,
    len: usize,
}

impl ProcessQueue {
    pub const fn new(tag: QueueTag) -> Self {
        Self {
            tag,
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn tag(&self) -> QueueTag {
        self.tag
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn head(&self) -> Option<ProcessId> {
        self.head
    }

    pub fn tail(&self) -> Option<ProcessId> {
        self.tail
    }

    /// Append `pid` at the tail.
    pub fn push_back(&mut self, links: &mut impl QueueLinks, pid: ProcessId) {
        self.attach(links, pid, None);
        match self.tail {
            Some(tail) => links.link_mut(tail).next = Some(pid),
            None => self.head = Some(pid),
        }
        self.tail = Some(pid);
        self.len += 1;
    }

    /// Insert `pid` at the head.
    pub fn push_front(&mut self, links: &mut impl QueueLinks, pid: ProcessId) {
        self.attach(links, pid, self.head);
        if self.tail.is_none() {
            self.tail = Some(pid);
        }
        self.head = Some(pid);
        self.len += 1;
    }

    pub fn pop_front(&mut self, links: &mut impl QueueLinks) -> Option<ProcessId> {
        let pid = self.head?;
        let link = links.link_mut(pid);
        self.head = link.next.take();
        link.queue = None;
        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        Some(pid)
    }

    /// Unlink `pid` from anywhere in the queue. Returns false (and trips a
    /// debug assertion) if `pid` is not a member.
    pub fn remove(&mut self, links: &mut impl QueueLinks, pid: ProcessId) -> bool {
        if links.link(pid).queue != Some(self.tag) {
            debug_assert!(false, "{pid:?} is not on {:?}", self.tag);
            return false;
        }

        if self.head == Some(pid) {
            self.pop_front(links);
            return true;
        }

        let mut cursor = self.head;
        while let Some(prev) = cursor {
            let next = links.link(prev).next;
            if next == Some(pid) {
                let link = links.link_mut(pid);
                let after = link.next.take();
                link.queue = None;
                links.link_mut(prev).next = after;
                if self.tail == Some(pid) {
                    self.tail = Some(prev);
                }
                self.len -= 1;
                return true;
            }
            cursor = next;
        }

        debug_assert!(false, "{pid:?} tagged {:?} but not linked", self.tag);
        false
    }

    pub fn contains(&self, links: &impl QueueLinks, pid: ProcessId) -> bool {
        links.link(pid).queue == Some(self.tag)
    }

    /// Iterate from head to tail. Stops after `len` steps even if the links
    /// were corrupted into a cycle.
    pub fn iter<'a, L: QueueLinks>(&self, links: &'a L) -> Iter<'a, L> {
        Iter {
            links,
            next: self.head,
            remaining: self.len,
        }
    }

    fn attach(&self, links: &mut impl QueueLinks, pid: ProcessId, next: Option<ProcessId>) {
        let link = links.link_mut(pid);
        debug_assert!(
            link.queue.is_none(),
            "{pid:?} is already on {:?}",
            link.queue
        );
        link.next = next;
        link.queue = Some(self.tag);
    }
}

pub struct Iter<'a, L> {
    links: &'a L,
    next: Option<ProcessId>,
    remaining: usize,
}

impl<L: QueueLinks> Iterator for Iter<'_, L> {
    type Item = ProcessId;

    fn next(&mut self) -> Option<ProcessId> {
        if self.remaining == 0 {
            return None;
        }
        let pid = self.next?;
        self.next = self.links.link(pid).next;
        self.remaining -= 1;
        Some(pid)
    }
}
