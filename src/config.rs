//! # Rotor Configuration
//!
//! Compile-time constants governing the scheduler and memory model.
//! All limits are fixed at compile time — the slot table, ring links and
//! queue bookkeeping never allocate.

/// Maximum number of live processes (bootstrap included). This bounds
/// the static slot table. Increase with care — each live process also
/// holds a `ram_size` arena on the kernel heap.
pub const MAX_PROCESSES: usize = 8;

/// System clock frequency in Hz (default for STM32F4 at 16 MHz HSI).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// SysTick clocks per millisecond, derived from the core clock.
/// Activity times are specified in milliseconds and converted to
/// reload values with this factor.
pub const SYSTICK_CLOCKS_PER_MS: u32 = SYSTEM_CLOCK_HZ / 1000;

/// Largest activity time (time slice) in milliseconds that still fits
/// the 24-bit SysTick reload register. Requirements beyond this are
/// clamped when the timer is programmed.
pub const MAX_ACTIVITY_TIME_MS: u32 = 0x00FF_FFFF / SYSTICK_CLOCKS_PER_MS;

/// Minimum per-process stack size in bytes. Must cover the deepest call
/// chain plus the hardware exception frame (32 bytes), the software
/// saved context (36 bytes for R4–R11 + EXC_RETURN) and the FPU lazy
/// stacking area (64 bytes for S16–S31) on M4F parts.
pub const MIN_STACK_SIZE: usize = 256;

/// Arena bytes reserved beyond the stack for the process's private
/// descriptor copy and sub-allocator bookkeeping. `ram_size` must be at
/// least `stack_size + DESCRIPTOR_RESERVE`.
pub const DESCRIPTOR_RESERVE: usize = 64;
