//! # Kernel Heap
//!
//! Byte-granular first-fit allocator over a RAM region the firmware
//! donates once at boot. Every process arena is carved out of this heap
//! in a single allocation and returned in a single deallocation, so
//! fragmentation follows process churn, not per-object churn.
//!
//! The allocator state lives behind a `critical_section::Mutex`, making
//! `allocate`/`deallocate` safe to call from any context, including
//! interrupt handlers resuming processes. Each call masks interrupts
//! only for the duration of one free-list operation.

use core::alloc::Layout;
use core::cell::RefCell;
use core::ptr::NonNull;

use critical_section::Mutex;
use linked_list_allocator::Heap;

use crate::error::{KernelError, KernelResult};

/// The kernel-side allocator. Constructed empty (usable as a `static`),
/// then bound to a RAM region exactly once via [`KernelHeap::init`].
pub struct KernelHeap {
    inner: Mutex<RefCell<Option<Heap>>>,
}

impl KernelHeap {
    /// Create an unbound heap. All allocation attempts panic until
    /// `init` has been called.
    pub const fn empty() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Bind the heap to `[start, start + size)`.
    ///
    /// # Safety
    /// The region must be valid, unused by anything else, and live for
    /// the rest of the program. Must be called exactly once.
    pub unsafe fn init(&self, start: *mut u8, size: usize) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if inner.is_some() {
                panic!("kernel: heap already initialized");
            }
            *inner = Some(Heap::new(start, size));
        });
    }

    /// Allocate `layout` from the heap.
    ///
    /// # Returns
    /// - `Ok(ptr)` — the allocation.
    /// - `Err(KernelError::OutOfMemory)` — no hole fits `layout`. This
    ///   is the recoverable path: callers may retry with a smaller
    ///   request or drop the work item.
    ///
    /// # Panics
    /// If the heap has not been initialized.
    pub fn allocate(&self, layout: Layout) -> KernelResult<NonNull<u8>> {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            let heap = match inner.as_mut() {
                Some(heap) => heap,
                None => panic!("kernel: heap not initialized"),
            };
            heap.allocate_first_fit(layout)
                .map_err(|_| KernelError::OutOfMemory)
        })
    }

    /// Return an allocation to the heap.
    ///
    /// # Safety
    /// `ptr` must come from a previous `allocate` on this heap with the
    /// same `layout`, and must not be used afterwards.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            let heap = match inner.as_mut() {
                Some(heap) => heap,
                None => panic!("kernel: heap not initialized"),
            };
            heap.deallocate(ptr, layout);
        });
    }

    /// Bytes currently available. Zero before `init`.
    pub fn free_bytes(&self) -> usize {
        critical_section::with(|cs| {
            self.inner
                .borrow_ref(cs)
                .as_ref()
                .map_or(0, |heap| heap.free())
        })
    }

    /// Bytes currently allocated. Zero before `init`.
    pub fn used_bytes(&self) -> usize {
        critical_section::with(|cs| {
            self.inner
                .borrow_ref(cs)
                .as_ref()
                .map_or(0, |heap| heap.used())
        })
    }
}

/// Leak a fresh, initialized heap for use in unit tests. Each call gets
/// its own backing region so tests stay independent.
#[cfg(test)]
pub(crate) fn leaked_heap(size: usize) -> &'static KernelHeap {
    use std::boxed::Box;
    use std::vec;

    let region = Box::leak(vec![0u8; size].into_boxed_slice());
    let heap = Box::leak(Box::new(KernelHeap::empty()));
    unsafe { heap.init(region.as_mut_ptr(), region.len()) };
    heap
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
