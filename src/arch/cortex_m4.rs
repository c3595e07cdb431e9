//! # Cortex-M4F Port
//!
//! Hardware-specific code for the ARM Cortex-M4F (Thumb-2, FPv4-SP).
//! Implements the context switch via PendSV, the per-process time slice
//! via SysTick, and exception priority setup.
//!
//! ## Context Switch Mechanism
//!
//! The port uses the Cortex-M split-stack model:
//! - **MSP** (Main Stack Pointer): exception handlers
//! - **PSP** (Process Stack Pointer): processes in Thread mode
//!
//! On exception entry the hardware stacks R0–R3, R12, LR, PC and xPSR
//! onto the process stack, plus S0–S15/FPSCR when the FPU is in use.
//! The PendSV handler completes the save with R4–R11, the EXC_RETURN
//! value and, for an FPU-active process, S16–S31. The EXC_RETURN is
//! kept in the frame because its bit 4 records whether the FPU block
//! exists, which the restore path must know per process.
//!
//! ## Exception Priorities
//!
//! SysTick and PendSV both run at priority 0xFF, the lowest. SysTick
//! only pends PendSV, and PendSV (which runs the scheduler commit)
//! therefore never preempts another handler and never nests with
//! itself. Application interrupts at any higher priority preempt both
//! freely.

use core::arch::{asm, naked_asm};
use cortex_m::peripheral::syst::SystClkSource;

use crate::arch;

// ---------------------------------------------------------------------------
// SysTick time slice
// ---------------------------------------------------------------------------

/// Configure SysTick for the first process's time slice and start it.
///
/// Subsequent slices are programmed by [`reload_time_slice`] from the
/// switch path, so this runs once during `kernel::start`.
pub fn configure_systick(syst: &mut cortex_m::peripheral::SYST, activity_time_ms: u32) {
    syst.set_clock_source(SystClkSource::Core);
    syst.set_reload(arch::systick_reload(activity_time_ms));
    syst.clear_current();
    syst.enable_counter();
    syst.enable_interrupt();
}

/// Reprogram the running SysTick for the next process's slice.
///
/// Called from the switch hook inside PendSV, where the `SYST`
/// peripheral proxy is out of reach, so the reload and current-value
/// registers are written directly. Writing CVR zeroes the counter and
/// forces the next countdown to start from the new reload value.
pub fn reload_time_slice(activity_time_ms: u32) {
    // SYST_RVR: 0xE000_E014, SYST_CVR: 0xE000_E018
    const SYST_RVR: *mut u32 = 0xE000_E014 as *mut u32;
    const SYST_CVR: *mut u32 = 0xE000_E018 as *mut u32;
    unsafe {
        core::ptr::write_volatile(SYST_RVR, arch::systick_reload(activity_time_ms));
        core::ptr::write_volatile(SYST_CVR, 0);
    }
}

// ---------------------------------------------------------------------------
// PendSV trigger
// ---------------------------------------------------------------------------

/// Pend a PendSV exception to request a context switch.
///
/// PendSV is the standard Cortex-M deferred-switch mechanism: it fires
/// only once no higher-priority handler is active, so the commit never
/// interrupts application ISRs.
///
/// Sets the PENDSVSET bit in the Interrupt Control and State Register.
#[inline]
pub fn trigger_pendsv() {
    // ICSR address: 0xE000_ED04, PENDSVSET = bit 28
    const ICSR: *mut u32 = 0xE000_ED04 as *mut u32;
    unsafe {
        core::ptr::write_volatile(ICSR, 1 << 28);
    }
}

// ---------------------------------------------------------------------------
// Exception priority configuration
// ---------------------------------------------------------------------------

/// Set PendSV and SysTick to the lowest exception priority.
///
/// This is what makes the commit contract hold: PendSV runs only when
/// nothing else is active, so the scheduler's critical sections are
/// the sole serialization the core state needs.
pub fn set_interrupt_priorities() {
    unsafe {
        // System Handler Priority Register 3 (SHPR3): 0xE000_ED20
        // Bits [23:16] = PendSV priority
        // Bits [31:24] = SysTick priority
        let shpr3: *mut u32 = 0xE000_ED20 as *mut u32;
        let val = core::ptr::read_volatile(shpr3);
        let val = val | (0xFF << 16) | (0xFF << 24);
        core::ptr::write_volatile(shpr3, val);
    }
}

// ---------------------------------------------------------------------------
// First process launch
// ---------------------------------------------------------------------------

/// Enter the first process from the kernel's main thread.
///
/// Called once from `kernel::start` with interrupts disabled and never
/// returns. Consumes the synthetic frame the scheduler built: switches
/// Thread mode onto PSP, pops the hardware part of the frame manually
/// (there is no exception to return from yet) and branches to the
/// stacked PC with interrupts enabled.
///
/// # Safety
/// `sp` must point at a synthetic frame built by `arch::init_stack`,
/// and the scheduler must consider that process current.
pub unsafe fn start_first_process(sp: *mut usize) -> ! {
    asm!(
        // Skip the software part: R4-R11 and EXC_RETURN are all
        // synthetic on a first activation (9 words).
        "adds r0, #36",
        "msr psp, r0",
        // Thread mode onto PSP; CONTROL.FPCA cleared, no FPU frame yet.
        "movs r0, #2",
        "msr control, r0",
        "isb",
        // Pop the hardware frame through the now-active PSP.
        "pop {{r0-r3, r12}}",
        "pop {{r4}}", // LR slot (exit trampoline)
        "pop {{r5}}", // PC slot (entry trampoline)
        "pop {{r6}}", // xPSR slot (discarded)
        "mov lr, r4",
        "cpsie i",
        "bx r5",
        in("r0") sp,
        options(noreturn)
    );
}

// ---------------------------------------------------------------------------
// PendSV handler (context switch)
// ---------------------------------------------------------------------------

/// PendSV exception handler: the context switch itself.
///
/// ## Sequence
/// 1. Read the preempted process's PSP.
/// 2. If its FPU state is live (EXC_RETURN bit 4 clear), save S16–S31.
/// 3. Save R4–R11 and EXC_RETURN below the hardware frame.
/// 4. Call the switch hook with the resulting stack pointer; the
///    default hook records it, runs the scheduler commit, reprograms
///    the time slice and returns the elected process's stack pointer.
/// 5. Restore R4–R11 and EXC_RETURN, then S16–S31 if that process had
///    FPU state.
/// 6. `bx lr` — the exception return unstacks the hardware frame.
///
/// # Safety
/// Entered only by the NVIC at the lowest exception priority; follows
/// the Cortex-M4F exception entry/exit convention exactly.
#[unsafe(no_mangle)]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "mrs r0, psp",
        "tst lr, #0x10",
        "it eq",
        "vstmdbeq r0!, {{s16-s31}}",
        "stmdb r0!, {{r4-r11, lr}}",
        "bl {switch}",
        "ldmia r0!, {{r4-r11, lr}}",
        "tst lr, #0x10",
        "it eq",
        "vldmiaeq r0!, {{s16-s31}}",
        "msr psp, r0",
        "bx lr",
        switch = sym switch_context,
    );
}

/// Rust side of the PendSV switch: dispatches to the installed hook.
///
/// # Safety
/// Called from the PendSV assembly with the saved stack pointer in
/// `r0`; returns the next stack pointer in `r0`.
#[unsafe(no_mangle)]
unsafe extern "C" fn switch_context(saved_sp: *mut usize) -> *mut usize {
    arch::invoke_switch_hook(saved_sp)
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

/// SysTick exception handler: the current slice has expired.
///
/// Merely pends PendSV; the commit and the election of the next
/// process happen there, after any active handlers drain.
#[unsafe(no_mangle)]
pub extern "C" fn SysTick() {
    trigger_pendsv();
}
