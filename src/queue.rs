//! # Activation Queue
//!
//! FIFO hand-off buffer between activation producers and the scheduler.
//! Producers — interrupt handlers resuming processes, foreground code
//! creating them — push here; only `commit` drains, merging the drained
//! elements into the runnable ring via the policy.
//!
//! The queue is itself a ring threaded through the elements' status
//! links (head = oldest), so a push is one splice and a drain is a
//! pointer swap, both O(1). That is the point of the split-lock design:
//! producers pay for a handful of instructions under the short critical
//! section and never wait on the commit-sized section, which can be
//! held across a full scheduling pass.
//!
//! Callers serialize access: the kernel wraps every producer call in
//! the short critical section ([`crate::sync::critical_section`]), and
//! `commit` drains inside its own section.

use crate::process::{ElementIndex, ElementLocation, LinkKind};
use crate::ring::{self, ElementTable};

/// The shared FIFO of elements awaiting merge into the runnable ring.
pub struct ActivationQueue {
    head: Option<ElementIndex>,
    len: usize,
}

impl ActivationQueue {
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Append a detached element at the tail. The element is marked
    /// `Queued`; it becomes `Runnable` when the next commit merges it.
    pub fn push(&mut self, table: &mut ElementTable, index: ElementIndex) {
        debug_assert!(
            ring::ring_is_singleton(table, LinkKind::Status, index),
            "queued element still threaded elsewhere"
        );
        table.get_mut(index).location = ElementLocation::Queued;
        match self.head {
            Some(head) => ring::ring_insert_before(table, LinkKind::Status, head, index),
            None => self.head = Some(index),
        }
        self.len += 1;
    }

    /// Take the entire queue content, leaving the queue empty.
    ///
    /// # Returns
    /// The head of the taken ring (oldest element first), or `None` if
    /// the queue was empty.
    pub fn drain_all(&mut self) -> Option<ElementIndex> {
        self.len = 0;
        self.head.take()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Whether `index` is currently threaded on this queue.
    pub fn contains(&self, table: &ElementTable, index: ElementIndex) -> bool {
        match self.head {
            Some(head) => ring::ring_contains(table, LinkKind::Status, head, index),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::leaked_heap;
    use crate::process::test_element;
    use crate::ring::{ring_iter, ring_len, ring_make_singleton};
    use std::vec::Vec;

    fn queue_with(n: usize) -> (ElementTable, ActivationQueue, Vec<ElementIndex>) {
        let heap = leaked_heap(64 * 1024);
        let mut table = ElementTable::new();
        let mut queue = ActivationQueue::new();
        let mut indices = Vec::new();
        for _ in 0..n {
            let index = table.allocate(test_element(heap)).ok().unwrap();
            ring_make_singleton(&mut table, LinkKind::Status, index);
            queue.push(&mut table, index);
            indices.push(index);
        }
        (table, queue, indices)
    }

    #[test]
    fn test_empty_queue_drains_to_none() {
        let mut queue = ActivationQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.drain_all(), None);
    }

    #[test]
    fn test_push_preserves_fifo_order() {
        let (table, mut queue, ids) = queue_with(3);
        assert_eq!(queue.len(), 3);

        let head = queue.drain_all().unwrap();
        let drained: Vec<_> = ring_iter(&table, LinkKind::Status, head).collect();
        assert_eq!(drained, ids);
    }

    #[test]
    fn test_drain_closes_the_taken_ring() {
        let (table, mut queue, ids) = queue_with(2);

        let head = queue.drain_all().unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);

        // The taken ring is standalone and fully closed.
        assert_eq!(ring_len(&table, LinkKind::Status, head), 2);
        assert_eq!(head, ids[0]);
    }

    #[test]
    fn test_queued_elements_are_marked() {
        let (table, queue, ids) = queue_with(2);
        for &index in &ids {
            assert!(queue.contains(&table, index));
            assert_eq!(table.get(index).location, ElementLocation::Queued);
        }
    }

    #[test]
    fn test_push_after_drain_starts_fresh() {
        let (mut table, mut queue, ids) = queue_with(2);
        let _ = queue.drain_all();

        let heap = leaked_heap(16 * 1024);
        let late = table.allocate(test_element(heap)).ok().unwrap();
        ring_make_singleton(&mut table, LinkKind::Status, late);
        queue.push(&mut table, late);

        assert_eq!(queue.len(), 1);
        let head = queue.drain_all().unwrap();
        assert_eq!(head, late);
        assert!(!ids.contains(&head));
    }
}
