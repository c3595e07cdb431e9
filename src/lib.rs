//! # Rotor — preemptive process kernel
//!
//! A preemptive round-robin process kernel for ARM Cortex-M4F
//! microcontrollers, built for firmware that runs several independent
//! units of work (motion control, command parsing, I/O servicing)
//! without a hosted operating system.
//!
//! ## Overview
//!
//! Rotor manages lightweight **processes**, each owning a private memory
//! **arena** that holds its stack, its descriptor copy, and whatever the
//! process allocates for itself. Scheduling is cooperative at the
//! data-structure level and preemptive at the timer level:
//!
//! - **No blocking locks** — all shared state is touched inside short
//!   critical sections, sized so interrupt latency stays bounded.
//! - **Deferred mutation** — stop and terminate requests are flags,
//!   applied at the next commit point, never mid-ring-surgery.
//! - **Stale-proof handles** — processes live in a fixed slot table and
//!   handles carry a generation counter, so a handle to a terminated
//!   process is rejected instead of corrupting a recycled slot.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                  Application Processes                  │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │   init() · create_process() · start() · stop_current() │
//! │   resume_process() · terminate_current() · set_policy()│
//! ├──────────────┬────────────────────┬────────────────────┤
//! │  Scheduler   │  Activation Queue  │  Policy            │
//! │  scheduler.rs│  queue.rs          │  policy.rs         │
//! │  ─ commit()  │  ─ push()          │  ─ arbitrate()     │
//! │  ─ create()  │  ─ drain_all()     │  ─ RoundRobin      │
//! ├──────────────┴────────────────────┴────────────────────┤
//! │        Element Table + Rings (process.rs, ring.rs)      │
//! │    SchedulerElement · main ring · runnable ring         │
//! ├────────────────────────────────────────────────────────┤
//! │      Memory Arenas (arena.rs) over KernelHeap (heap.rs)│
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cortex_m4.rs)                │
//! │    PendSV · SysTick · Context Switch · Stack Init      │
//! ├────────────────────────────────────────────────────────┤
//! │         ARM Cortex-M4F Hardware (Thumb-2, FPv4)         │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Process Model
//!
//! Every live process is a [`process::SchedulerElement`] threaded onto two
//! intrusive rings at once:
//!
//! | Ring | Membership | Order |
//! |------|------------|-------|
//! | **main** | every live process | creation order, never reordered |
//! | **runnable** | processes eligible for CPU time | policy-defined |
//!
//! A process that is neither on the runnable ring nor in the activation
//! queue is **stopped**: it keeps its arena and saved stack pointer and
//! can be resumed later, bit-for-bit where it left off.
//!
//! The first process, created by [`kernel::init`], is the **bootstrap**
//! process. It anchors the main ring for the lifetime of the system and
//! must never be terminated.
//!
//! ## Commit Point
//!
//! All ring surgery happens in [`scheduler::Scheduler::commit`], which
//! runs only from the PendSV handler at the lowest exception priority.
//! Interrupt handlers and foreground code communicate with the scheduler
//! through the activation queue and the pending stop/terminate flags, so
//! producers only ever pay for a queue splice, never for a full
//! scheduling pass.
//!
//! ## Memory Model
//!
//! - **One kernel heap** ([`heap::KernelHeap`]): byte-granular first-fit
//!   allocator over a region the firmware donates at boot.
//! - **Per-process arenas**: each process's RAM budget is carved out of
//!   the kernel heap in one piece and sub-allocated privately; destroying
//!   the process returns the whole piece in one step.
//! - **Fixed slot table**: `[Slot; MAX_PROCESSES]`, no kernel-side
//!   allocation per element, links are indices rather than pointers.
//!
//! ## Host Testing
//!
//! Everything above the arch port is portable and unit-tested on the
//! host: preemption is simulated by calling `commit()` directly, and the
//! `critical-section` std implementation stands in for the single-core
//! one. Only `arch::cortex_m4` and `kernel::start` compile exclusively
//! for `thumbv7em-none-eabihf`.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod error;
pub mod heap;
pub mod arena;
pub mod process;
pub mod ring;
pub mod queue;
pub mod policy;
pub mod scheduler;
pub mod arch;
pub mod kernel;
pub mod sync;
