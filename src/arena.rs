//! # Per-Process Memory Arena
//!
//! Each process owns one arena: a `ram_size` region carved out of the
//! kernel heap in a single piece. Inside it, a private first-fit
//! sub-allocator hands out:
//!
//! - the process **stack** (`stack_size` bytes, top 8-aligned per AAPCS),
//! - the process's **private descriptor copy** (so the kernel-side
//!   original can be reused the moment creation returns),
//! - anything the process allocates for itself at runtime.
//!
//! ## Ownership
//!
//! An arena is exclusively owned by exactly one scheduler element.
//! [`Arena::destroy`] consumes the arena by value, so releasing the same
//! region twice is a move error at compile time, not a runtime check.
//! Stopping a process leaves its arena untouched — including the saved
//! stack pointer — which is what makes stop/resume bit-for-bit
//! transparent to the process.
//!
//! The sub-allocator is not locked: the arena is only ever touched by
//! its owning process in thread mode, or by the scheduler while the
//! element is not yet (or no longer) visible to anyone else.

use core::alloc::Layout;
use core::ptr::NonNull;

use linked_list_allocator::Heap;

use crate::error::{KernelError, KernelResult};
use crate::heap::KernelHeap;
use crate::process::ProcessDescriptor;

/// Alignment of the arena region and of the stack, per AAPCS.
const ARENA_ALIGN: usize = 8;

/// One process's private memory: region, sub-allocator, carved stack,
/// and the saved stack pointer recorded at every context save.
pub struct Arena {
    region: NonNull<u8>,
    layout: Layout,
    inner: Heap,
    stack_top: *mut u8,
    stack_size: usize,
    saved_sp: *mut usize,
}

// The raw pointers all point into the arena's own region, which the
// arena exclusively owns.
unsafe impl Send for Arena {}

impl Arena {
    /// Allocate a `ram_size` arena from the kernel heap.
    ///
    /// The sub-allocator starts empty; call [`Arena::reset`] to make the
    /// region allocatable and carve the stack.
    ///
    /// # Returns
    /// `Err(KernelError::OutOfMemory)` if the kernel heap cannot supply
    /// the region. This is recoverable by design: process creation is
    /// reachable under normal load and must not halt the device.
    pub fn create(heap: &KernelHeap, ram_size: usize) -> KernelResult<Arena> {
        let layout = Layout::from_size_align(ram_size, ARENA_ALIGN)
            .map_err(|_| KernelError::OutOfMemory)?;
        let region = heap.allocate(layout)?;

        Ok(Arena {
            region,
            layout,
            inner: Heap::empty(),
            stack_top: core::ptr::null_mut(),
            stack_size: 0,
            saved_sp: core::ptr::null_mut(),
        })
    }

    /// Re-initialize the sub-allocator over the whole region and carve
    /// the stack, positioning the stack pointer at its 8-aligned top
    /// (stacks grow downward).
    ///
    /// Called once per process creation, before anything else is
    /// sub-allocated.
    pub fn reset(&mut self, stack_size: usize) -> KernelResult<()> {
        self.inner = unsafe { Heap::new(self.region.as_ptr(), self.layout.size()) };

        let stack_layout = Layout::from_size_align(stack_size, ARENA_ALIGN)
            .map_err(|_| KernelError::OutOfMemory)?;
        let stack = self
            .inner
            .allocate_first_fit(stack_layout)
            .map_err(|_| KernelError::OutOfMemory)?;

        let top = (stack.as_ptr() as usize + stack_size) & !(ARENA_ALIGN - 1);
        self.stack_top = top as *mut u8;
        self.stack_size = stack_size;
        self.saved_sp = top as *mut usize;
        Ok(())
    }

    /// Sub-allocate space for the descriptor and copy it in. The
    /// returned pointer is what the entry trampoline receives when the
    /// process first runs.
    pub fn copy_descriptor_in(
        &mut self,
        descriptor: &ProcessDescriptor,
    ) -> KernelResult<NonNull<ProcessDescriptor>> {
        let raw = self.alloc(Layout::new::<ProcessDescriptor>())?;
        let ptr = raw.cast::<ProcessDescriptor>();
        unsafe { ptr.as_ptr().write(*descriptor) };
        Ok(ptr)
    }

    /// Allocate from the process's own budget.
    pub fn alloc(&mut self, layout: Layout) -> KernelResult<NonNull<u8>> {
        self.inner
            .allocate_first_fit(layout)
            .map_err(|_| KernelError::OutOfMemory)
    }

    /// Return a process-private allocation.
    ///
    /// # Safety
    /// `ptr` must come from a previous [`Arena::alloc`] on this arena
    /// with the same `layout`, and must not be used afterwards.
    pub unsafe fn dealloc(&mut self, ptr: NonNull<u8>, layout: Layout) {
        self.inner.deallocate(ptr, layout);
    }

    /// Bytes still available to the process.
    pub fn free_bytes(&self) -> usize {
        self.inner.free()
    }

    /// Total size of the arena region.
    pub fn ram_size(&self) -> usize {
        self.layout.size()
    }

    /// 8-aligned top of the carved stack.
    pub fn stack_top(&self) -> *mut u8 {
        self.stack_top
    }

    /// Size of the carved stack in bytes.
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Record the process's stack pointer at a context save.
    pub fn record_stack_pointer(&mut self, sp: *mut usize) {
        self.saved_sp = sp;
    }

    /// The stack pointer recorded at the last context save.
    pub fn stack_pointer(&self) -> *mut usize {
        self.saved_sp
    }

    /// Whether `addr` falls inside the arena region. Used by tests and
    /// diagnostics to check that carved pointers stay in bounds.
    pub fn contains(&self, addr: usize) -> bool {
        let start = self.region.as_ptr() as usize;
        addr >= start && addr < start + self.layout.size()
    }

    /// Release the whole region — stack, descriptor copy and all
    /// process allocations — back to the kernel heap in one step.
    ///
    /// Consumes the arena: a second destroy of the same region cannot
    /// be written.
    pub fn destroy(self, heap: &KernelHeap) {
        unsafe { heap.deallocate(self.region, self.layout) };
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
