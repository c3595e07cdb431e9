//! # Element Table & Intrusive Rings
//!
//! All live processes are stored inline in a fixed-size slot table.
//! The rings that order them — the main ring, the runnable ring and the
//! activation queue — are intrusive circular doubly linked lists
//! threaded through index pairs stored in the elements themselves, so
//! threading an element onto a ring never allocates.
//!
//! ```text
//!          ┌───────────────────────────────────────┐
//!          ▼                                       │
//!      ┌───────┐      ┌───────┐      ┌───────┐     │
//!      │ slot 0│ ───► │ slot 3│ ───► │ slot 1│ ────┘
//!      │ (head)│ ◄─── │       │ ◄─── │ (tail)│
//!      └───────┘      └───────┘      └───────┘
//! ```
//!
//! A ring is named by any element on it; the **tail** is the element
//! whose `next` is the head. A detached element is a singleton ring
//! (self-referential links) — the same shape, so splicing needs no
//! special cases.
//!
//! Links are slot indices, not pointers. Combined with the per-slot
//! generation counter (bumped on release), this removes the dangling
//! reference class entirely: a stale [`ProcessHandle`] fails to resolve
//! instead of reaching into a recycled slot.

use crate::config::MAX_PROCESSES;
use crate::error::{KernelError, KernelResult};
use crate::process::{ElementIndex, LinkKind, Links, ProcessHandle, SchedulerElement};

// ---------------------------------------------------------------------------
// Slot table
// ---------------------------------------------------------------------------

struct Slot {
    generation: u16,
    element: Option<SchedulerElement>,
}

impl Slot {
    /// Vacant slot. Used to initialize the table array.
    const EMPTY: Self = Self {
        generation: 0,
        element: None,
    };
}

/// Fixed-size storage for all scheduler elements. Index 0 is taken by
/// the bootstrap process for the lifetime of the system.
pub struct ElementTable {
    slots: [Slot; MAX_PROCESSES],
}

impl ElementTable {
    pub const fn new() -> Self {
        Self {
            slots: [Slot::EMPTY; MAX_PROCESSES],
        }
    }

    /// Whether every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|slot| slot.element.is_some())
    }

    /// Number of live elements.
    pub fn live_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.element.is_some())
            .count()
    }

    /// Place `element` in the first vacant slot.
    ///
    /// # Returns
    /// The slot index, or the element back if every slot is occupied so
    /// the caller can release its arena.
    pub(crate) fn allocate(
        &mut self,
        element: SchedulerElement,
    ) -> Result<ElementIndex, SchedulerElement> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.element.is_none() {
                slot.element = Some(element);
                return Ok(ElementIndex(i as u8));
            }
        }
        Err(element)
    }

    /// Vacate a slot, bumping its generation so outstanding handles to
    /// the departed element go stale.
    pub(crate) fn release(&mut self, index: ElementIndex) -> SchedulerElement {
        let slot = &mut self.slots[index.as_usize()];
        slot.generation = slot.generation.wrapping_add(1);
        match slot.element.take() {
            Some(element) => element,
            None => panic!("kernel: releasing a vacant element slot"),
        }
    }

    /// # Panics
    /// If the slot is vacant — ring links only ever name live slots, so
    /// a vacant hit means corrupted scheduler state.
    pub fn get(&self, index: ElementIndex) -> &SchedulerElement {
        match self.slots[index.as_usize()].element.as_ref() {
            Some(element) => element,
            None => panic!("kernel: vacant element slot"),
        }
    }

    /// Mutable companion of [`ElementTable::get`].
    pub fn get_mut(&mut self, index: ElementIndex) -> &mut SchedulerElement {
        match self.slots[index.as_usize()].element.as_mut() {
            Some(element) => element,
            None => panic!("kernel: vacant element slot"),
        }
    }

    /// Current handle for the element in `index`.
    pub fn handle_of(&self, index: ElementIndex) -> ProcessHandle {
        ProcessHandle {
            index,
            generation: self.slots[index.as_usize()].generation,
        }
    }

    /// Check a handle against its slot's generation.
    ///
    /// # Returns
    /// `Err(KernelError::StaleHandle)` if the slot is vacant or has
    /// been recycled since the handle was issued.
    pub fn resolve(&self, handle: ProcessHandle) -> KernelResult<ElementIndex> {
        let slot = &self.slots[handle.index.as_usize()];
        if slot.element.is_none() || slot.generation != handle.generation {
            return Err(KernelError::StaleHandle);
        }
        Ok(handle.index)
    }
}

// ---------------------------------------------------------------------------
// Ring operations
// ---------------------------------------------------------------------------

/// Make `node` a ring of one (self-referential links). Also the shape
/// of a detached element.
pub fn ring_make_singleton(table: &mut ElementTable, kind: LinkKind, node: ElementIndex) {
    let links = table.get_mut(node).link_mut(kind);
    links.next = node;
    links.prev = node;
}

/// Successor of `node` on its ring.
pub fn ring_next(table: &ElementTable, kind: LinkKind, node: ElementIndex) -> ElementIndex {
    table.get(node).link(kind).next
}

/// Predecessor of `node` on its ring.
pub fn ring_prev(table: &ElementTable, kind: LinkKind, node: ElementIndex) -> ElementIndex {
    table.get(node).link(kind).prev
}

/// Whether `node` is alone on its ring.
pub fn ring_is_singleton(table: &ElementTable, kind: LinkKind, node: ElementIndex) -> bool {
    ring_next(table, kind, node) == node
}

/// Thread `new` onto `node`'s ring, immediately after `node`.
/// `new` must be detached (a singleton).
pub fn ring_insert_after(
    table: &mut ElementTable,
    kind: LinkKind,
    node: ElementIndex,
    new: ElementIndex,
) {
    let successor = ring_next(table, kind, node);
    {
        let links = table.get_mut(new).link_mut(kind);
        links.prev = node;
        links.next = successor;
    }
    table.get_mut(node).link_mut(kind).next = new;
    table.get_mut(successor).link_mut(kind).prev = new;
}

/// Thread `new` onto `node`'s ring, immediately before `node`. With
/// `node` being the head, this is a tail insert.
pub fn ring_insert_before(
    table: &mut ElementTable,
    kind: LinkKind,
    node: ElementIndex,
    new: ElementIndex,
) {
    let predecessor = ring_prev(table, kind, node);
    ring_insert_after(table, kind, predecessor, new);
}

/// Unthread `node` from its ring, leaving it a detached singleton.
///
/// # Returns
/// `node`'s former successor.
///
/// Removing the only element of a ring is the deadlock/last-process
/// condition; the caller must check [`ring_is_singleton`] first.
pub fn ring_remove(table: &mut ElementTable, kind: LinkKind, node: ElementIndex) -> ElementIndex {
    debug_assert!(
        !ring_is_singleton(table, kind, node),
        "removal from a singleton ring"
    );
    let Links { next, prev } = table.get(node).link(kind);
    table.get_mut(prev).link_mut(kind).next = next;
    table.get_mut(next).link_mut(kind).prev = prev;
    ring_make_singleton(table, kind, node);
    next
}

/// Splice ring `b` into ring `a` at `a`'s tail (immediately before
/// `a`), preserving both rings' internal order:
///
/// ```text
///   [a, a1, a2] ++ [b, b1]  ─►  [a, a1, a2, b, b1]
/// ```
///
/// `a` and `b` must be on different rings.
pub fn ring_concat(table: &mut ElementTable, kind: LinkKind, a: ElementIndex, b: ElementIndex) {
    debug_assert!(a != b, "splicing a ring into itself");
    let a_tail = ring_prev(table, kind, a);
    let b_tail = ring_prev(table, kind, b);
    table.get_mut(a_tail).link_mut(kind).next = b;
    table.get_mut(b).link_mut(kind).prev = a_tail;
    table.get_mut(b_tail).link_mut(kind).next = a;
    table.get_mut(a).link_mut(kind).prev = b_tail;
}

/// Number of elements on `start`'s ring.
///
/// # Panics
/// If the walk does not close within the table capacity, which means
/// the links are corrupted.
pub fn ring_len(table: &ElementTable, kind: LinkKind, start: ElementIndex) -> usize {
    let mut len = 1;
    let mut cursor = ring_next(table, kind, start);
    while cursor != start {
        len += 1;
        if len > MAX_PROCESSES {
            panic!("kernel: ring not closed");
        }
        cursor = ring_next(table, kind, cursor);
    }
    len
}

/// Whether `needle` is on the same ring as `start`.
pub fn ring_contains(
    table: &ElementTable,
    kind: LinkKind,
    start: ElementIndex,
    needle: ElementIndex,
) -> bool {
    ring_iter(table, kind, start).any(|index| index == needle)
}

/// Iterate `start`'s ring once, starting at `start`.
pub fn ring_iter(table: &ElementTable, kind: LinkKind, start: ElementIndex) -> RingIter<'_> {
    RingIter {
        table,
        kind,
        start,
        cursor: Some(start),
    }
}

/// Iterator over one full revolution of a ring.
pub struct RingIter<'a> {
    table: &'a ElementTable,
    kind: LinkKind,
    start: ElementIndex,
    cursor: Option<ElementIndex>,
}

impl<'a> Iterator for RingIter<'a> {
    type Item = ElementIndex;

    fn next(&mut self) -> Option<ElementIndex> {
        let current = self.cursor?;
        let next = ring_next(self.table, self.kind, current);
        self.cursor = if next == self.start { None } else { Some(next) };
        Some(current)
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
