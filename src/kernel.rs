//! # Kernel
//!
//! The firmware-facing singleton and startup sequence.
//!
//! The scheduler itself is an explicit value (`scheduler::Scheduler`);
//! this module owns the one global instance, hands the exception layer
//! a raw pointer to it, and wraps its operations for foreground code.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset handler (consuming firmware)
//!   └─► main()
//!         ├─► kernel::init(heap, bootstrap desc/req)  ← heap + bootstrap process
//!         ├─► kernel::create_process(…)               ← initial processes (×N)
//!         └─► kernel::start(peripherals)              ← no return
//!               ├─► lowest priority for PendSV/SysTick
//!               ├─► SysTick armed with the first slice
//!               └─► arch::cortex_m4::start_first_process()
//! ```
//!
//! After `start`, every SysTick expiry pends PendSV, PendSV runs the
//! scheduler commit through the switch hook, and the bootstrap process
//! continues as an ordinary round-robin participant.
//!
//! # Safety Model
//!
//! All access to the global goes through `SCHEDULER_PTR`, set once in
//! `init`. Foreground wrappers rely on the scheduler's own internal
//! critical sections; the PendSV path accesses it with all same-or-
//! lower-priority exceptions implicitly masked. This is a single-core
//! kernel; there is no cross-core aliasing to defend against.

use core::ptr::addr_of_mut;

#[cfg(all(target_arch = "arm", target_os = "none"))]
use crate::arch::cortex_m4;
use crate::arena::Arena;
use crate::error::KernelResult;
use crate::heap::KernelHeap;
use crate::policy::SchedulingPolicy;
use crate::process::{ProcessDescriptor, ProcessHandle, ProcessRequirements};
use crate::scheduler::Scheduler;
use crate::sync;

// ---------------------------------------------------------------------------
// Global instances
// ---------------------------------------------------------------------------

/// The kernel heap every process arena is carved from.
static KERNEL_HEAP: KernelHeap = KernelHeap::empty();

/// Global scheduler instance.
static mut SCHEDULER: Scheduler = Scheduler::new();

/// Raw pointer to the global scheduler, for the exception layer (the
/// PendSV switch hook) where references are impractical.
///
/// # Safety
/// Set once during `init()`, read from ISR context afterwards.
#[unsafe(no_mangle)]
pub(crate) static mut SCHEDULER_PTR: *mut Scheduler = core::ptr::null_mut();

/// # Panics
/// If the kernel has not been initialized.
unsafe fn scheduler() -> &'static mut Scheduler {
    if SCHEDULER_PTR.is_null() {
        panic!("kernel: not initialized");
    }
    &mut *SCHEDULER_PTR
}

// ---------------------------------------------------------------------------
// Kernel API
// ---------------------------------------------------------------------------

/// Initialize the kernel: install the heap region and build the
/// bootstrap process. Must run before any other kernel function.
///
/// The bootstrap process is the caller's own continuation: after
/// [`start`], the code that called `init` keeps running inside it. It
/// anchors the main ring for the lifetime of the system and must never
/// be terminated.
///
/// # Returns
/// The bootstrap process's handle, or the arena-creation error.
///
/// # Safety
/// - Must be called exactly once, before `start`, from the main thread.
/// - `heap_start..heap_start + heap_size` must be writable RAM unused
///   by anything else for the lifetime of the kernel.
pub unsafe fn init(
    heap_start: *mut u8,
    heap_size: usize,
    descriptor: ProcessDescriptor,
    requirements: ProcessRequirements,
) -> KernelResult<ProcessHandle> {
    KERNEL_HEAP.init(heap_start, heap_size);
    SCHEDULER_PTR = addr_of_mut!(SCHEDULER);
    log::info!("kernel heap installed, {} bytes", heap_size);
    (*SCHEDULER_PTR).init(&KERNEL_HEAP, descriptor, requirements)
}

/// Create a process. It becomes runnable at the next commit; until
/// then it holds its arena and a synthetic first stack frame.
///
/// The descriptor is copied into the process's own arena, so the
/// caller's copy (and the `args` buffer it points at) may be reused as
/// soon as this returns.
///
/// # Returns
/// - `Ok(handle)` — created and queued for activation.
/// - `Err(OutOfMemory)` / `Err(TooManyProcesses)` — recoverable
///   exhaustion; nothing was created.
pub fn create_process(
    descriptor: ProcessDescriptor,
    requirements: ProcessRequirements,
) -> KernelResult<ProcessHandle> {
    unsafe { scheduler() }.create_process(descriptor, requirements)
}

/// Stop the calling process at the next commit and request one.
///
/// Returns the handle another process (or an ISR) can later pass to
/// [`resume_process`]. The caller keeps running until the pended
/// switch fires, which on target is immediate once no other handler
/// is active.
pub fn stop_current() -> ProcessHandle {
    let handle = unsafe { scheduler() }.stop_current();
    #[cfg(all(target_arch = "arm", target_os = "none"))]
    cortex_m4::trigger_pendsv();
    handle
}

/// Terminate the calling process at the next commit and request one.
/// Its slot and arena are reclaimed; outstanding handles go stale.
pub fn terminate_current() {
    unsafe { scheduler() }.terminate_current();
    #[cfg(all(target_arch = "arm", target_os = "none"))]
    cortex_m4::trigger_pendsv();
}

/// Terminate the calling process and wait for the switch to take it.
/// This is the entry trampoline's landing path for a process whose
/// entry function returned.
pub fn exit_current() -> ! {
    terminate_current();
    loop {
        cortex_m::asm::wfi();
    }
}

/// Reactivate a stopped process. It rejoins the runnable ring at the
/// next commit, at the tail of the round-robin order, and continues
/// from its saved context.
///
/// # Returns
/// `Err(StaleHandle)` if the process has been terminated since the
/// handle was issued.
pub fn resume_process(handle: ProcessHandle) -> KernelResult<()> {
    unsafe { scheduler() }.resume_process(handle)
}

/// Install a scheduling policy; `None` restores the built-in
/// round-robin. Takes effect at the next commit.
pub fn set_policy(policy: Option<&'static dyn SchedulingPolicy>) {
    sync::critical_section(|_cs| unsafe { scheduler() }.set_policy(policy));
}

/// Handle of the calling process.
pub fn current_process() -> ProcessHandle {
    sync::critical_section(|_cs| unsafe { scheduler() }.current())
}

/// Requirements the calling process was created with.
pub fn current_requirements() -> ProcessRequirements {
    sync::critical_section(|_cs| unsafe { scheduler() }.current_requirements())
}

/// Run `f` with the calling process's own arena, for allocations from
/// the process's private budget.
pub fn with_current_arena<R>(f: impl FnOnce(&mut Arena) -> R) -> R {
    sync::critical_section(|_cs| f(unsafe { scheduler() }.current_arena_mut()))
}

/// Number of live processes, bootstrap included.
pub fn process_count() -> usize {
    sync::critical_section(|_cs| unsafe { scheduler() }.process_count())
}

/// Free bytes remaining on the kernel heap. Useful when sizing process
/// RAM budgets at boot.
pub fn heap_free_bytes() -> usize {
    KERNEL_HEAP.free_bytes()
}

/// Bytes currently allocated from the kernel heap.
pub fn heap_used_bytes() -> usize {
    KERNEL_HEAP.used_bytes()
}

/// Start preemptive scheduling. **Does not return.**
///
/// Configures exception priorities, arms SysTick with the bootstrap
/// process's time slice and enters the bootstrap process through the
/// ordinary context-restore path.
///
/// # Panics
/// If `init` has not been called.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn start(mut core_peripherals: cortex_m::Peripherals) -> ! {
    // Interrupts stay off until the first process is entered, so a
    // SysTick cannot fire into a half-configured switch path.
    cortex_m::interrupt::disable();

    let (first_sp, first_slice) = {
        let scheduler = unsafe { scheduler() };
        (
            scheduler.current_stack_pointer(),
            scheduler.current_requirements().effective_activity_time(),
        )
    };

    cortex_m4::set_interrupt_priorities();
    cortex_m4::configure_systick(&mut core_peripherals.SYST, first_slice);

    log::info!("kernel started, first slice {} ms", first_slice);
    unsafe { cortex_m4::start_first_process(first_sp) }
}
