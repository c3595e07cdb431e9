//! # Scheduling Policy
//!
//! The single extension point for scheduling strategies. A policy is
//! consulted once per commit, after pending stop/terminate requests
//! have been applied and the activation queue has been drained. It gets
//! the element table, the current runnable head, and the drained ring
//! of newly activated elements, and decides both where the arrivals go
//! and which element runs next.
//!
//! Swapping in a priority or deadline policy touches nothing outside
//! this trait: the commit sequence, the rings and the queue are
//! policy-agnostic.

use crate::process::{ElementIndex, LinkKind};
use crate::ring::{self, ElementTable};

/// Strategy hook invoked at the end of every commit.
///
/// # Contract
/// - The runnable ring must remain non-empty: it was non-empty on
///   entry, and every element of `incoming` (if any) must end up
///   threaded on it.
/// - On return, `run_head` names the element that runs next.
///
/// Implementations manipulate the runnable ring through the public ring
/// operations in [`crate::ring`] on `LinkKind::Status` links.
pub trait SchedulingPolicy: Sync {
    fn arbitrate(
        &self,
        table: &mut ElementTable,
        run_head: &mut ElementIndex,
        incoming: Option<ElementIndex>,
    );
}

/// The built-in policy: rotate one position per commit, append arrivals
/// at the tail.
///
/// Advancing first and splicing second is what makes the rotation fair:
/// the head selected by this commit is the natural successor of the
/// previous head, and newly activated elements wait one full revolution
/// before their first slice, entering the rotation at the tail in their
/// queue (FIFO) order.
pub struct RoundRobin;

/// Shared instance used whenever no custom policy is installed.
pub static ROUND_ROBIN: RoundRobin = RoundRobin;

impl SchedulingPolicy for RoundRobin {
    fn arbitrate(
        &self,
        table: &mut ElementTable,
        run_head: &mut ElementIndex,
        incoming: Option<ElementIndex>,
    ) {
        *run_head = ring::ring_next(table, LinkKind::Status, *run_head);
        if let Some(first) = incoming {
            ring::ring_concat(table, LinkKind::Status, *run_head, first);
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
    use crate::ring::{ring_insert_before, ring_iter, ring_make_singleton};
    use std::vec::Vec;

    fn runnable_ring(n: usize) -> (ElementTable, Vec<ElementIndex>) {
        let heap = leaked_heap(64 * 1024);
        let mut table = ElementTable::new();
        let mut indices = Vec::new();
        for i in 0..n {
            let index = table.allocate(test_element(heap)).ok().unwrap();
            ring_make_singleton(&mut table, LinkKind::Status, index);
            if i > 0 {
                ring_insert_before(&mut table, LinkKind::Status, indices[0], index);
            }
            indices.push(index);
        }
        (table, indices)
    }

    #[test]
    fn test_round_robin_rotates_one_step() {
        let (mut table, ids) = runnable_ring(3);
        let mut head = ids[0];

        RoundRobin.arbitrate(&mut table, &mut head, None);
        assert_eq!(head, ids[1]);
        RoundRobin.arbitrate(&mut table, &mut head, None);
        assert_eq!(head, ids[2]);
        RoundRobin.arbitrate(&mut table, &mut head, None);
        assert_eq!(head, ids[0]);
    }

    #[test]
    fn test_round_robin_singleton_stays_put() {
        let (mut table, ids) = runnable_ring(1);
        let mut head = ids[0];
        RoundRobin.arbitrate(&mut table, &mut head, None);
        assert_eq!(head, ids[0]);
    }

    #[test]
    fn test_arrivals_enter_at_the_tail() {
        let (mut table, ids) = runnable_ring(2);
        let heap = leaked_heap(16 * 1024);
        let new = table.allocate(test_element(heap)).ok().unwrap();
        ring_make_singleton(&mut table, LinkKind::Status, new);

        let mut head = ids[0];
        RoundRobin.arbitrate(&mut table, &mut head, Some(new));

        // The new head rotated to ids[1]; the arrival sits at the tail.
        assert_eq!(head, ids[1]);
        let order: Vec<_> = ring_iter(&table, LinkKind::Status, head).collect();
        assert_eq!(order, [ids[1], ids[0], new]);
    }

    #[test]
    fn test_simultaneous_arrivals_keep_queue_order() {
        let (mut table, ids) = runnable_ring(1);
        let heap = leaked_heap(32 * 1024);
        let first = table.allocate(test_element(heap)).ok().unwrap();
        let second = table.allocate(test_element(heap)).ok().unwrap();
        ring_make_singleton(&mut table, LinkKind::Status, first);
        ring_make_singleton(&mut table, LinkKind::Status, second);
        ring_insert_before(&mut table, LinkKind::Status, first, second);

        let mut head = ids[0];
        RoundRobin.arbitrate(&mut table, &mut head, Some(first));

        assert_eq!(head, ids[0]);
        let order: Vec<_> = ring_iter(&table, LinkKind::Status, head).collect();
        assert_eq!(order, [ids[0], first, second]);
    }
}
