//! # Synchronization Primitives
//!
//! Interrupt-safe critical section abstractions. All shared scheduler
//! state must be accessed within a critical section to prevent data
//! races between foreground code and interrupt handlers.
//!
//! The kernel uses two sizes of critical section, both built on the same
//! primitive:
//!
//! - **producer-sized**: a single activation-queue splice or heap
//!   allocation. Paid by interrupt handlers resuming processes and by
//!   foreground code creating them.
//! - **commit-sized**: the full ring surgery in `Scheduler::commit`.
//!   Paid only at the lowest exception priority, from PendSV.
//!
//! Keeping the producer path down to one splice is what bounds interrupt
//! latency: no producer ever waits on a scheduling pass.

use critical_section::CriticalSection;

/// Execute a closure within a critical section (interrupts disabled on
/// the single-core target; a process lock under the host test harness).
///
/// This is the primary mechanism for safely accessing shared mutable
/// state in the kernel. Interrupts are disabled on entry and restored on
/// exit, ensuring atomicity of the enclosed operation.
///
/// # Usage
/// ```ignore
/// sync::critical_section(|_cs| {
///     // Access shared state safely
/// });
/// ```
///
/// # Performance
/// Keep critical sections as short as possible to minimize interrupt
/// latency. The Cortex-M4's interrupt tail-chaining makes short critical
/// sections relatively inexpensive.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}
