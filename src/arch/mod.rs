//! # Architecture Layer
//!
//! The boundary between the portable scheduler core and the processor.
//! Three concerns live here:
//!
//! - the **synthetic stack frame** a new process starts from, built by
//!   [`init_stack`] so the very first switch into the process restores
//!   it exactly like any preempted one;
//! - the **entry/exit trampolines** that frame points at, which unpack
//!   the process descriptor on the way in and turn a plain `return`
//!   from the entry function into a terminate request on the way out;
//! - the **switch hook**, the function the PendSV handler calls with
//!   the preempted stack pointer and whose return value it restores.
//!
//! The frame builder and the reload arithmetic use `usize` words so
//! they compile and run on the host; on the target a word is 32 bits
//! and the layout matches the Cortex-M4F exception frame exactly. All
//! asm and peripheral access is confined to [`cortex_m4`], which only
//! exists for `thumbv7em` builds.
//!
//! ## Frame Layout
//!
//! `init_stack` seeds 17 words below the stack top, mirroring what
//! PendSV saves for a basic (FPU-inactive) frame:
//!
//! ```text
//!   stack top ─►  ┌──────────────┐
//!                 │ xPSR         │  Thumb bit set
//!                 │ PC           │  entry_trampoline
//!                 │ LR           │  exit_trampoline
//!                 │ R12, R3–R1   │  0
//!                 │ R0           │  private descriptor pointer
//!                 ├──────────────┤  ◄─ hardware-restored part
//!                 │ EXC_RETURN   │  thread mode, PSP, basic frame
//!                 │ R11–R4       │  0
//!   initial SP ─► └──────────────┘  ◄─ software-restored part
//! ```

use core::ptr::NonNull;

use crate::config::{MAX_ACTIVITY_TIME_MS, SYSTICK_CLOCKS_PER_MS};
use crate::process::ProcessDescriptor;
use crate::sync;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m4;

// ---------------------------------------------------------------------------
// Stack frame constants
// ---------------------------------------------------------------------------

/// Words in the synthetic frame: 8 hardware-stacked registers, R4–R11
/// and the saved EXC_RETURN.
pub const STACK_FRAME_WORDS: usize = 17;

/// xPSR with the Thumb bit set; everything else cleared.
pub const XPSR_THUMB: usize = 0x0100_0000;

/// EXC_RETURN for thread mode, process stack, basic (no FPU) frame.
/// Bit 4 set tells the lazy-stacking check there is no S16–S31 block
/// to restore.
pub const EXC_RETURN_THREAD_PSP: usize = 0xFFFF_FFFD;

// ---------------------------------------------------------------------------
// Synthetic stack frame
// ---------------------------------------------------------------------------

/// Seed a process stack with the frame the context switch restores on
/// the process's first activation.
///
/// `stack_top` must be the 8-aligned top of a stack at least
/// `MIN_STACK_SIZE` bytes deep, and `descriptor` the process's private
/// descriptor copy inside its own arena.
///
/// # Returns
/// The initial stack pointer to record for the process.
pub fn init_stack(stack_top: *mut u8, descriptor: NonNull<ProcessDescriptor>) -> *mut usize {
    let top = stack_top as *mut usize;
    unsafe {
        let sp = top.sub(STACK_FRAME_WORDS);
        // Software-restored part: R4-R11 cleared, then EXC_RETURN.
        for word in 0..8 {
            sp.add(word).write(0);
        }
        sp.add(8).write(EXC_RETURN_THREAD_PSP);
        // Hardware-restored part: R0 carries the descriptor, LR catches
        // a stray return, PC enters through the trampoline.
        sp.add(9).write(descriptor.as_ptr() as usize); // R0
        sp.add(10).write(0); // R1
        sp.add(11).write(0); // R2
        sp.add(12).write(0); // R3
        sp.add(13).write(0); // R12
        sp.add(14).write(exit_trampoline as *const () as usize); // LR
        sp.add(15).write(entry_trampoline as *const () as usize); // PC
        sp.add(16).write(XPSR_THUMB); // xPSR
        sp
    }
}

/// First code a new process executes, in thread mode on its own stack.
/// Unpacks the private descriptor and calls the entry function; a
/// normal return from the entry terminates the process.
extern "C" fn entry_trampoline(descriptor: *mut ProcessDescriptor) -> ! {
    let descriptor = unsafe { &*descriptor };
    (descriptor.entry)(descriptor.args, descriptor.args_len);
    exit_trampoline()
}

/// Termination path for a process whose entry function has returned.
/// Also planted in the synthetic frame's LR slot, so even a corrupted
/// return lands here rather than in arbitrary memory.
extern "C" fn exit_trampoline() -> ! {
    crate::kernel::exit_current()
}

// ---------------------------------------------------------------------------
// Switch hook
// ---------------------------------------------------------------------------

/// The function PendSV calls between saving and restoring registers.
/// Receives the preempted process's stack pointer, returns the stack
/// pointer to restore.
pub type SwitchHook = unsafe fn(saved_sp: *mut usize) -> *mut usize;

/// Installed hook. Written under a critical section, read from PendSV
/// where exception priority serializes access.
static mut SWITCH_HOOK: SwitchHook = default_switch_hook;

/// Replace the context-switch pipeline.
///
/// # Safety
/// `hook` runs at exception level with the scheduler lock implicitly
/// held. It must record or discard `saved_sp` and return a stack
/// pointer carrying a valid frame, typically by delegating to
/// [`default_switch_hook`] around its own bookkeeping.
pub unsafe fn install_switch_hook(hook: SwitchHook) {
    sync::critical_section(|_cs| SWITCH_HOOK = hook);
}

/// The standard pipeline: record the preempted stack pointer, commit
/// pending scheduler work, reprogram the time slice for the elected
/// process and hand back its saved stack pointer.
///
/// # Safety
/// Requires an initialized kernel. Must only run at the lowest
/// exception priority (the PendSV contract).
pub unsafe fn default_switch_hook(saved_sp: *mut usize) -> *mut usize {
    let scheduler = &mut *crate::kernel::SCHEDULER_PTR;
    scheduler.record_stack_pointer(saved_sp);
    scheduler.commit();
    #[cfg(all(target_arch = "arm", target_os = "none"))]
    cortex_m4::reload_time_slice(scheduler.current_requirements().effective_activity_time());
    scheduler.current_stack_pointer()
}

/// Entry point for the PendSV helper.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub(crate) unsafe fn invoke_switch_hook(saved_sp: *mut usize) -> *mut usize {
    (SWITCH_HOOK)(saved_sp)
}

// ---------------------------------------------------------------------------
// Time slice arithmetic
// ---------------------------------------------------------------------------

/// SysTick reload value for an activity time in milliseconds, clamped
/// to the 24-bit reload register.
pub fn systick_reload(activity_time_ms: u32) -> u32 {
    let clamped = if activity_time_ms > MAX_ACTIVITY_TIME_MS {
        MAX_ACTIVITY_TIME_MS
    } else {
        activity_time_ms
    };
    (clamped * SYSTICK_CLOCKS_PER_MS).saturating_sub(1).min(0x00FF_FFFF)
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
