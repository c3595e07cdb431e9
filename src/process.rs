//! # Process Model
//!
//! Defines the process-facing types (entry signature, descriptor,
//! requirements, handle) and the kernel's bookkeeping record for one
//! process, the [`SchedulerElement`].
//!
//! ## Lifecycle
//!
//! ```text
//!   create_process()          commit()
//!  ────────────────► Queued ───────────► Runnable ◄──┐
//!                      ▲                    │        │ policy
//!                      │ resume_process()   │        │ rotation
//!                      │                    ▼        │
//!                   Stopped ◄────────── stop_current└┘
//!                                        + commit()
//!
//!   terminate_current() + commit(): slot released, arena destroyed,
//!   handle goes stale.
//! ```
//!
//! Every live element sits on the **main ring** (creation order, never
//! reordered) from creation to termination, and on at most one of the
//! **runnable ring** or the **activation queue** at any instant. An
//! element on neither is stopped: it keeps its arena and saved stack
//! pointer until resumed or the device resets.
//!
//! ## Handles
//!
//! Elements live in a fixed slot table and are named externally by
//! [`ProcessHandle`], a slot index paired with the slot's generation at
//! the time the handle was issued. Releasing a slot bumps its
//! generation, so handles to terminated processes are detected and
//! rejected instead of touching a recycled slot.

use crate::arena::Arena;
use crate::config::{DESCRIPTOR_RESERVE, MAX_ACTIVITY_TIME_MS, MIN_STACK_SIZE};

// ---------------------------------------------------------------------------
// Process-facing types
// ---------------------------------------------------------------------------

/// Signature every process entry function must have. The kernel passes
/// the `args` pointer and length from the process's private descriptor
/// copy. Returning from the entry function terminates the process.
pub type ProcessEntry = extern "C" fn(args: *mut u8, args_len: usize);

/// What a process runs. Copied into the process's own arena at
/// creation, so the kernel-side original is free to be reused or
/// dropped the moment `create_process` returns.
#[derive(Debug, Clone, Copy)]
pub struct ProcessDescriptor {
    /// Entry function. Cannot be null — the type system guarantees it.
    pub entry: ProcessEntry,
    /// Argument blob handed to `entry`. May be null when `args_len` is 0.
    pub args: *mut u8,
    /// Length of the argument blob in bytes.
    pub args_len: usize,
}

impl ProcessDescriptor {
    /// # Panics
    /// If `args_len` is nonzero but `args` is null. A malformed
    /// descriptor at creation is a programming error, not a runtime
    /// condition.
    pub fn validate(&self) {
        if self.args.is_null() && self.args_len != 0 {
            panic!("kernel: descriptor has args_len without an args pointer");
        }
    }
}

/// Immutable resource requirements, supplied at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessRequirements {
    /// Total arena budget in bytes. Covers the stack, the descriptor
    /// copy and all process-private allocations.
    pub ram_size: usize,
    /// Stack size in bytes. Must be a multiple of 8 and at least
    /// `MIN_STACK_SIZE`.
    pub stack_size: usize,
    /// Time slice in milliseconds. Clamped to `MAX_ACTIVITY_TIME_MS`
    /// when the timer is programmed.
    pub activity_time: u32,
}

impl ProcessRequirements {
    /// # Panics
    /// If the requirements are inconsistent: zero activity time, a
    /// stack below `MIN_STACK_SIZE` or not 8-aligned, or a RAM budget
    /// too small to hold the stack plus the descriptor reserve.
    pub fn validate(&self) {
        if self.activity_time == 0 {
            panic!("kernel: requirements have zero activity time");
        }
        if self.stack_size < MIN_STACK_SIZE {
            panic!("kernel: stack size below minimum");
        }
        if self.stack_size % 8 != 0 {
            panic!("kernel: stack size not a multiple of 8");
        }
        if self.ram_size < self.stack_size + DESCRIPTOR_RESERVE {
            panic!("kernel: ram size too small for stack and descriptor");
        }
    }

    /// The activity time actually programmed into the time-slice timer.
    #[inline]
    pub const fn effective_activity_time(&self) -> u32 {
        if self.activity_time > MAX_ACTIVITY_TIME_MS {
            MAX_ACTIVITY_TIME_MS
        } else {
            self.activity_time
        }
    }
}

/// Externally-held name for a process: slot index plus the slot's
/// generation when the handle was issued. Stale after termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pub(crate) index: ElementIndex,
    pub(crate) generation: u16,
}

// ---------------------------------------------------------------------------
// Element bookkeeping
// ---------------------------------------------------------------------------

/// Index of an element slot in the table. Links between elements are
/// stored as these indices rather than pointers, so a corrupted or
/// stale reference can never dangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementIndex(pub(crate) u8);

impl ElementIndex {
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// One intrusive link pair. Self-referential links mean the element is
/// a singleton ring (or detached, which is the same shape).
#[derive(Debug, Clone, Copy)]
pub struct Links {
    pub(crate) next: ElementIndex,
    pub(crate) prev: ElementIndex,
}

impl Links {
    /// Links of a not-yet-threaded element. `ring_make_singleton`
    /// rewrites them as soon as the slot index is known.
    pub(crate) const fn detached() -> Self {
        Self {
            next: ElementIndex(0),
            prev: ElementIndex(0),
        }
    }
}

/// Which ring an element's link pair belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// The all-processes ring: every live element, creation order.
    Main,
    /// The status ring: runnable ring or, transiently, the activation
    /// queue.
    Status,
}

/// Where an element currently sits, status-wise. Exactly one of these
/// at any instant (exclusive membership).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementLocation {
    /// Threaded on the runnable ring.
    Runnable,
    /// Threaded on the activation queue, awaiting the next commit.
    Queued,
    /// On neither: stopped, arena retained.
    Stopped,
}

/// The kernel's bookkeeping record for one process.
///
/// The private descriptor copy is not recorded here: its pointer lives
/// in the synthetic frame's argument slot, where the entry trampoline
/// picks it up, and the arena frees it wholesale at termination.
pub struct SchedulerElement {
    /// Immutable resource requirements.
    pub requirements: ProcessRequirements,
    /// The process's memory: stack, descriptor copy, private heap.
    pub(crate) arena: Arena,
    /// Whether the element participates in scheduling (runnable or
    /// queued). False exactly when stopped.
    pub active: bool,
    /// Current status-ring membership.
    pub(crate) location: ElementLocation,
    /// Link pair threading the element onto the main ring.
    pub(crate) main_link: Links,
    /// Link pair threading the element onto the runnable ring or the
    /// activation queue.
    pub(crate) status_link: Links,
}

impl SchedulerElement {
    /// Element for a freshly created process: active and headed for the
    /// activation queue. Links are threaded by the caller once the slot
    /// index is known.
    pub(crate) fn new(requirements: ProcessRequirements, arena: Arena) -> Self {
        Self {
            requirements,
            arena,
            active: true,
            location: ElementLocation::Queued,
            main_link: Links::detached(),
            status_link: Links::detached(),
        }
    }

    pub(crate) fn link(&self, kind: LinkKind) -> Links {
        match kind {
            LinkKind::Main => self.main_link,
            LinkKind::Status => self.status_link,
        }
    }

    pub(crate) fn link_mut(&mut self, kind: LinkKind) -> &mut Links {
        match kind {
            LinkKind::Main => &mut self.main_link,
            LinkKind::Status => &mut self.status_link,
        }
    }

    /// The process's memory arena.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Mutable access to the arena, for stack-pointer recording and
    /// process-private allocation.
    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// Consume the element, keeping only its arena. Used at termination
    /// to destroy the arena after the slot is released.
    pub(crate) fn into_arena(self) -> Arena {
        self.arena
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

#[cfg(test)]
extern "C" fn test_entry(_args: *mut u8, _args_len: usize) {}

/// Descriptor with a no-op entry and no arguments.
#[cfg(test)]
pub(crate) fn test_descriptor() -> ProcessDescriptor {
    ProcessDescriptor {
        entry: test_entry,
        args: core::ptr::null_mut(),
        args_len: 0,
    }
}

/// Requirements small enough that several processes fit a test heap.
#[cfg(test)]
pub(crate) fn test_requirements() -> ProcessRequirements {
    ProcessRequirements {
        ram_size: 2048,
        stack_size: 512,
        activity_time: 10,
    }
}

/// Fully built element (arena, descriptor copy) ready for a table slot.
#[cfg(test)]
pub(crate) fn test_element(heap: &crate::heap::KernelHeap) -> SchedulerElement {
    let requirements = test_requirements();
    let mut arena = Arena::create(heap, requirements.ram_size).unwrap();
    arena.reset(requirements.stack_size).unwrap();
    arena.copy_descriptor_in(&test_descriptor()).unwrap();
    SchedulerElement::new(requirements, arena)
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
