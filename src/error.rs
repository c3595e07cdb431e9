//! # Kernel Error Types
//!
//! Structured errors for the recoverable failure paths of the kernel.
//!
//! Only resource exhaustion and stale handles are recoverable. Invariant
//! violations — invalid requirements, resuming a process that is already
//! active, terminating the bootstrap process, emptying the runnable
//! ring — are programming errors and panic instead: on the target the
//! firmware's panic handler halts the device, which is the correct
//! response to a corrupted control flow.

/// Recoverable kernel errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The kernel heap cannot supply the requested arena.
    OutOfMemory,
    /// The slot table is full (`MAX_PROCESSES` live processes).
    TooManyProcesses,
    /// The handle's generation does not match its slot: the process it
    /// named has been terminated (and the slot possibly reused).
    StaleHandle,
}

impl KernelError {
    /// Human-readable description of the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "kernel heap exhausted",
            Self::TooManyProcesses => "process slot table full",
            Self::StaleHandle => "handle refers to a terminated process",
        }
    }
}

impl core::fmt::Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
