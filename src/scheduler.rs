//! # Scheduler Core
//!
//! Lifecycle operations, the two rings, the pending-request flags and
//! the commit algorithm. The scheduler is an explicit value: the
//! firmware-facing singleton lives in `kernel.rs`, and unit tests build
//! as many independent instances as they need, driving preemption by
//! calling [`Scheduler::commit`] directly.
//!
//! ## Commit Algorithm
//!
//! `commit` runs only at the lowest exception priority (from PendSV),
//! never re-entrantly. Inside one commit-sized critical section:
//!
//! 1. Take the current head of the runnable ring.
//! 2. If a terminate is pending: reject emptying the ring (fatal
//!    deadlock) and terminating the bootstrap element (fatal), then
//!    unthread the head from both rings, release its slot and destroy
//!    its arena. A pending stop of the same element is subsumed.
//! 3. Else if a stop is pending: same deadlock check, then unthread the
//!    head from the runnable ring only, keeping its arena and marking
//!    it inactive.
//! 4. Drain the activation queue into a standalone ring, marking the
//!    drained elements runnable.
//! 5. Hand the table, the head and the drained ring to the installed
//!    policy, which splices the arrivals in and selects the next head.
//!
//! When step 2 or 3 removes the head, the head is first repositioned to
//! its predecessor so the policy's advance lands on the departed
//! element's natural successor.
//!
//! ## Deferred Requests
//!
//! `stop_current` and `terminate_current` only set a flag; the ring
//! surgery happens at the next commit. Both flags necessarily target
//! the element that is current at that commit, which is why a single
//! pending request of each kind suffices and why an applied terminate
//! also clears a pending stop. Callers must not assume memory is freed
//! or a slot reusable until the commit has run.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch;
use crate::arena::Arena;
use crate::error::{KernelError, KernelResult};
use crate::heap::KernelHeap;
use crate::policy::{SchedulingPolicy, ROUND_ROBIN};
use crate::process::{
    ElementIndex, ElementLocation, LinkKind, ProcessDescriptor, ProcessHandle,
    ProcessRequirements, SchedulerElement,
};
use crate::queue::ActivationQueue;
use crate::ring::{self, ElementTable};
use crate::sync;

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// The central scheduler state: slot table, ring heads, activation
/// queue, pending flags, policy and heap binding.
pub struct Scheduler {
    /// Storage for all live elements; rings are threaded through it.
    table: ElementTable,

    /// The bootstrap element, head of the main ring. Lives for the
    /// lifetime of the system.
    bootstrap: Option<ElementIndex>,

    /// Head of the runnable ring: the element currently running.
    run_head: Option<ElementIndex>,

    /// FIFO of elements awaiting merge into the runnable ring.
    activation: ActivationQueue,

    /// Pending stop of the current element, applied at next commit.
    stop_requested: AtomicBool,

    /// Pending terminate of the current element, applied at next
    /// commit. Takes precedence over a pending stop.
    terminate_requested: AtomicBool,

    /// Installed policy; `None` selects the built-in round-robin.
    policy: Option<&'static dyn SchedulingPolicy>,

    /// The kernel heap arenas are carved from. Bound at `init`.
    heap: Option<&'static KernelHeap>,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            table: ElementTable::new(),
            bootstrap: None,
            run_head: None,
            activation: ActivationQueue::new(),
            stop_requested: AtomicBool::new(false),
            terminate_requested: AtomicBool::new(false),
            policy: None,
            heap: None,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Hand-build the bootstrap process and make it the sole member of
    /// both rings, active and current — no activation-queue step.
    ///
    /// The bootstrap element gets a full arena and synthetic stack
    /// frame like any other process, so `start` can enter it through
    /// the ordinary restore path.
    ///
    /// # Panics
    /// If called twice, or if `descriptor`/`requirements` are invalid.
    pub fn init(
        &mut self,
        heap: &'static KernelHeap,
        descriptor: ProcessDescriptor,
        requirements: ProcessRequirements,
    ) -> KernelResult<ProcessHandle> {
        descriptor.validate();
        requirements.validate();
        if self.run_head.is_some() {
            panic!("kernel: scheduler already initialized");
        }
        self.heap = Some(heap);

        let element = Self::build_element(heap, descriptor, requirements)?;
        let index = match self.table.allocate(element) {
            Ok(index) => index,
            Err(element) => {
                element.into_arena().destroy(heap);
                return Err(KernelError::TooManyProcesses);
            }
        };
        ring::ring_make_singleton(&mut self.table, LinkKind::Main, index);
        ring::ring_make_singleton(&mut self.table, LinkKind::Status, index);
        self.table.get_mut(index).location = ElementLocation::Runnable;
        self.bootstrap = Some(index);
        self.run_head = Some(index);

        log::debug!("bootstrap process in slot {}", index.as_usize());
        Ok(self.table.handle_of(index))
    }

    /// Create a process: build its arena and synthetic first stack
    /// frame, thread it onto the main ring tail, and queue it for
    /// activation at the next commit.
    ///
    /// # Returns
    /// - `Ok(handle)` — the new process's handle.
    /// - `Err(KernelError::OutOfMemory)` — the kernel heap cannot
    ///   supply the arena. Recoverable; the caller may retry or drop
    ///   the request.
    /// - `Err(KernelError::TooManyProcesses)` — no vacant slot.
    ///
    /// # Panics
    /// If `descriptor`/`requirements` are invalid, or the scheduler is
    /// not initialized.
    pub fn create_process(
        &mut self,
        descriptor: ProcessDescriptor,
        requirements: ProcessRequirements,
    ) -> KernelResult<ProcessHandle> {
        descriptor.validate();
        requirements.validate();
        let (bootstrap, heap) = match (self.bootstrap, self.heap) {
            (Some(bootstrap), Some(heap)) => (bootstrap, heap),
            _ => panic!("kernel: create_process before scheduler init"),
        };
        if self.table.is_full() {
            return Err(KernelError::TooManyProcesses);
        }

        // The arena build happens outside any critical section: the
        // element is invisible to other contexts until threaded below.
        let element = Self::build_element(heap, descriptor, requirements)?;

        sync::critical_section(|_cs| {
            let index = match self.table.allocate(element) {
                Ok(index) => index,
                Err(element) => {
                    element.into_arena().destroy(heap);
                    return Err(KernelError::TooManyProcesses);
                }
            };
            // Main ring tail: creation order, bootstrap at the head.
            ring::ring_insert_before(&mut self.table, LinkKind::Main, bootstrap, index);
            ring::ring_make_singleton(&mut self.table, LinkKind::Status, index);
            self.activation.push(&mut self.table, index);

            log::debug!("process created in slot {}", index.as_usize());
            Ok(self.table.handle_of(index))
        })
    }

    /// Request that the current process be stopped at the next commit.
    /// Its arena and saved stack pointer are retained; the returned
    /// handle resumes it later.
    pub fn stop_current(&mut self) -> ProcessHandle {
        let head = match self.run_head {
            Some(head) => head,
            None => panic!("kernel: stop_current before scheduler init"),
        };
        self.stop_requested.store(true, Ordering::Relaxed);
        self.table.handle_of(head)
    }

    /// Request that the current process be terminated at the next
    /// commit: unthreaded from both rings, slot released, arena
    /// destroyed.
    pub fn terminate_current(&mut self) {
        if self.run_head.is_none() {
            panic!("kernel: terminate_current before scheduler init");
        }
        self.terminate_requested.store(true, Ordering::Relaxed);
    }

    /// Reactivate a stopped process: mark it active and queue it for
    /// merge at the next commit, where the policy reinserts it at the
    /// tail of the runnable order.
    ///
    /// # Returns
    /// `Err(KernelError::StaleHandle)` if the process behind `handle`
    /// has been terminated (and its slot possibly reused).
    ///
    /// # Panics
    /// If the element is live but not stopped — resuming a running or
    /// queued process is a programming error.
    pub fn resume_process(&mut self, handle: ProcessHandle) -> KernelResult<()> {
        sync::critical_section(|_cs| {
            let index = self.table.resolve(handle)?;
            if self.table.get(index).active {
                panic!("kernel: resuming an active process");
            }
            self.table.get_mut(index).active = true;
            self.activation.push(&mut self.table, index);

            log::debug!("process in slot {} resumed", index.as_usize());
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------------

    /// Apply pending requests, merge activations, and select the next
    /// current element. See the module docs for the full sequence.
    ///
    /// Must be invoked only from the lowest interrupt priority level,
    /// never re-entrantly with itself. On target that caller is the
    /// PendSV handler; host tests call it directly to simulate
    /// preemption.
    pub fn commit(&mut self) {
        sync::critical_section(|_cs| {
            let mut head = match self.run_head {
                Some(head) => head,
                None => panic!("kernel: commit before scheduler init"),
            };

            if self.terminate_requested.swap(false, Ordering::Relaxed) {
                // Both flags target the same current element, so an
                // applied terminate subsumes a pending stop.
                self.stop_requested.store(false, Ordering::Relaxed);
                head = self.apply_terminate(head);
            } else if self.stop_requested.swap(false, Ordering::Relaxed) {
                head = self.apply_stop(head);
            }

            let incoming = self.activation.drain_all();
            if let Some(first) = incoming {
                self.mark_runnable(first);
            }

            let policy = self.policy.unwrap_or(&ROUND_ROBIN);
            policy.arbitrate(&mut self.table, &mut head, incoming);
            self.run_head = Some(head);

            log::trace!("commit: slot {} runs next", head.as_usize());
        });
    }

    /// Terminate the current head. Returns the repositioned head (the
    /// departed element's predecessor).
    fn apply_terminate(&mut self, head: ElementIndex) -> ElementIndex {
        if ring::ring_is_singleton(&self.table, LinkKind::Status, head) {
            panic!("kernel: deadlock, terminating the last runnable process");
        }
        if Some(head) == self.bootstrap {
            panic!("kernel: terminating the bootstrap process");
        }
        let new_head = ring::ring_prev(&self.table, LinkKind::Status, head);
        ring::ring_remove(&mut self.table, LinkKind::Status, head);
        ring::ring_remove(&mut self.table, LinkKind::Main, head);
        let element = self.table.release(head);
        let heap = match self.heap {
            Some(heap) => heap,
            None => panic!("kernel: scheduler has no heap"),
        };
        element.into_arena().destroy(heap);

        log::debug!("process in slot {} terminated", head.as_usize());
        new_head
    }

    /// Stop the current head, retaining its arena. Returns the
    /// repositioned head.
    fn apply_stop(&mut self, head: ElementIndex) -> ElementIndex {
        if ring::ring_is_singleton(&self.table, LinkKind::Status, head) {
            panic!("kernel: deadlock, stopping the last runnable process");
        }
        let new_head = ring::ring_prev(&self.table, LinkKind::Status, head);
        ring::ring_remove(&mut self.table, LinkKind::Status, head);
        let element = self.table.get_mut(head);
        element.active = false;
        element.location = ElementLocation::Stopped;

        log::debug!("process in slot {} stopped", head.as_usize());
        new_head
    }

    /// Walk a drained activation ring and mark every element runnable.
    fn mark_runnable(&mut self, first: ElementIndex) {
        let mut cursor = first;
        loop {
            self.table.get_mut(cursor).location = ElementLocation::Runnable;
            cursor = ring::ring_next(&self.table, LinkKind::Status, cursor);
            if cursor == first {
                break;
            }
        }
    }

    /// Build arena, descriptor copy and synthetic stack frame for a new
    /// element, releasing the arena on any failure along the way.
    fn build_element(
        heap: &KernelHeap,
        descriptor: ProcessDescriptor,
        requirements: ProcessRequirements,
    ) -> KernelResult<SchedulerElement> {
        let mut arena = Arena::create(heap, requirements.ram_size)?;
        if let Err(e) = arena.reset(requirements.stack_size) {
            arena.destroy(heap);
            return Err(e);
        }
        let private = match arena.copy_descriptor_in(&descriptor) {
            Ok(ptr) => ptr,
            Err(e) => {
                arena.destroy(heap);
                return Err(e);
            }
        };
        let sp = arch::init_stack(arena.stack_top(), private);
        arena.record_stack_pointer(sp);
        Ok(SchedulerElement::new(requirements, arena))
    }

    // -----------------------------------------------------------------------
    // Policy
    // -----------------------------------------------------------------------

    /// Install a custom policy; `None` restores the built-in
    /// round-robin. Takes effect at the next commit.
    pub fn set_policy(&mut self, policy: Option<&'static dyn SchedulingPolicy>) {
        self.policy = policy;
        log::debug!(
            "scheduling policy {}",
            if policy.is_some() { "installed" } else { "reset" }
        );
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    fn current_index(&self) -> ElementIndex {
        match self.run_head {
            Some(head) => head,
            None => panic!("kernel: scheduler not initialized"),
        }
    }

    /// Handle of the currently running process.
    pub fn current(&self) -> ProcessHandle {
        self.table.handle_of(self.current_index())
    }

    /// Requirements of the currently running process.
    pub fn current_requirements(&self) -> ProcessRequirements {
        self.table.get(self.current_index()).requirements
    }

    /// Arena of the currently running process.
    pub fn current_arena(&self) -> &Arena {
        self.table.get(self.current_index()).arena()
    }

    /// Mutable arena of the currently running process.
    pub fn current_arena_mut(&mut self) -> &mut Arena {
        let index = self.current_index();
        self.table.get_mut(index).arena_mut()
    }

    /// Record the current process's stack pointer at a context save.
    pub fn record_stack_pointer(&mut self, sp: *mut usize) {
        self.current_arena_mut().record_stack_pointer(sp);
    }

    /// The stack pointer to restore for the current process.
    pub fn current_stack_pointer(&self) -> *mut usize {
        self.current_arena().stack_pointer()
    }

    /// Whether `handle` still names a live process.
    pub fn handle_is_live(&self, handle: ProcessHandle) -> bool {
        self.table.resolve(handle).is_ok()
    }

    /// Number of live processes (bootstrap included).
    pub fn process_count(&self) -> usize {
        self.table.live_count()
    }

    /// Number of elements on the runnable ring.
    pub fn runnable_count(&self) -> usize {
        match self.run_head {
            Some(head) => ring::ring_len(&self.table, LinkKind::Status, head),
            None => 0,
        }
    }

    /// Enumerate all live processes in creation order, bootstrap first.
    pub fn processes(&self) -> impl Iterator<Item = ProcessHandle> + '_ {
        let start = match self.bootstrap {
            Some(bootstrap) => bootstrap,
            None => panic!("kernel: scheduler not initialized"),
        };
        ring::ring_iter(&self.table, LinkKind::Main, start).map(|index| self.table.handle_of(index))
    }

    /// Whether `init` has run.
    pub fn is_initialized(&self) -> bool {
        self.run_head.is_some()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::leaked_heap;
    use crate::process::{test_descriptor, test_requirements};
    use std::vec::Vec;

    fn fresh_scheduler() -> (Scheduler, ProcessHandle) {
        let heap = leaked_heap(64 * 1024);
        let mut scheduler = Scheduler::new();
        let bootstrap = scheduler
            .init(heap, test_descriptor(), test_requirements())
            .unwrap();
        (scheduler, bootstrap)
    }

    /// Exclusive-membership invariant: every live element is on the
    /// runnable ring, on the activation queue, or stopped — never more
    /// than one at once.
    fn assert_exclusive_membership(scheduler: &Scheduler) {
        let head = scheduler.run_head.unwrap();
        let bootstrap = scheduler.bootstrap.unwrap();
        for index in ring::ring_iter(&scheduler.table, LinkKind::Main, bootstrap) {
            let element = scheduler.table.get(index);
            let on_runnable = ring::ring_contains(&scheduler.table, LinkKind::Status, head, index);
            let on_queue = scheduler.activation.contains(&scheduler.table, index);
            match element.location {
                ElementLocation::Runnable => {
                    assert!(on_runnable && !on_queue);
                    assert!(element.active);
                }
                ElementLocation::Queued => {
                    assert!(!on_runnable && on_queue);
                    assert!(element.active);
                }
                ElementLocation::Stopped => {
                    assert!(!on_runnable && !on_queue);
                    assert!(!element.active);
                }
            }
        }
    }

    #[test]
    fn test_init_builds_bootstrap() {
        let (scheduler, bootstrap) = fresh_scheduler();
        assert!(scheduler.is_initialized());
        assert_eq!(scheduler.current(), bootstrap);
        assert_eq!(scheduler.process_count(), 1);
        assert_eq!(scheduler.runnable_count(), 1);
        assert!(!scheduler.current_stack_pointer().is_null());
        assert_exclusive_membership(&scheduler);
    }

    #[test]
    fn test_created_process_waits_for_commit() {
        let (mut scheduler, bootstrap) = fresh_scheduler();
        let p1 = scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();

        // Threaded on the main ring at once, runnable only after commit.
        assert_eq!(scheduler.process_count(), 2);
        assert_eq!(scheduler.runnable_count(), 1);
        assert_eq!(scheduler.current(), bootstrap);
        assert_exclusive_membership(&scheduler);

        scheduler.commit();
        assert_eq!(scheduler.runnable_count(), 2);
        assert!(scheduler.handle_is_live(p1));
        assert_exclusive_membership(&scheduler);
    }

    #[test]
    fn test_round_robin_fairness_period_three() {
        let (mut scheduler, p0) = fresh_scheduler();
        let p1 = scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();
        let p2 = scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();

        let mut selected = Vec::new();
        for _ in 0..6 {
            scheduler.commit();
            selected.push(scheduler.current());
        }
        assert_eq!(selected, [p0, p1, p2, p0, p1, p2]);
    }

    #[test]
    fn test_main_ring_keeps_creation_order() {
        let (mut scheduler, p0) = fresh_scheduler();
        let p1 = scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();
        let p2 = scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();

        // Rotation must not reorder the main ring.
        scheduler.commit();
        scheduler.commit();
        let order: Vec<_> = scheduler.processes().collect();
        assert_eq!(order, [p0, p1, p2]);
    }

    #[test]
    fn test_terminate_removes_frees_and_stales() {
        let (mut scheduler, p0) = fresh_scheduler();
        let heap = scheduler.heap.unwrap();
        let free_before_p1 = heap.free_bytes();

        let p1 = scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();
        let p2 = scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();
        assert!(heap.free_bytes() < free_before_p1);

        // Rotate until P1 is current, then terminate it.
        scheduler.commit();
        scheduler.commit();
        assert_eq!(scheduler.current(), p1);
        scheduler.terminate_current();
        scheduler.commit();

        let order: Vec<_> = scheduler.processes().collect();
        assert_eq!(order, [p0, p2]);
        assert!(!scheduler.handle_is_live(p1));
        assert_eq!(scheduler.resume_process(p1), Err(KernelError::StaleHandle));
        assert_exclusive_membership(&scheduler);

        // Terminating P2 as well returns the heap to its pre-create level.
        while scheduler.current() != p2 {
            scheduler.commit();
        }
        scheduler.terminate_current();
        scheduler.commit();
        assert_eq!(heap.free_bytes(), free_before_p1);
    }

    #[test]
    fn test_stop_resume_round_trip() {
        let (mut scheduler, p0) = fresh_scheduler();
        let p1 = scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();
        let p2 = scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();

        // Rotate until P2 is current.
        scheduler.commit();
        scheduler.commit();
        scheduler.commit();
        assert_eq!(scheduler.current(), p2);
        let sp_before = scheduler.current_stack_pointer();

        let stopped = scheduler.stop_current();
        assert_eq!(stopped, p2);
        scheduler.commit();

        // P2 is off the runnable ring, arena retained, still resolvable.
        assert_eq!(scheduler.runnable_count(), 2);
        assert_eq!(scheduler.process_count(), 3);
        assert!(scheduler.handle_is_live(p2));
        assert_exclusive_membership(&scheduler);

        // The natural successor of P2 runs next.
        assert_eq!(scheduler.current(), p0);

        scheduler.resume_process(p2).unwrap();
        scheduler.commit();

        // Reinserted at the tail: current rotated to P1, then P0, and
        // only then P2 gets its slice again.
        assert_eq!(scheduler.current(), p1);
        scheduler.commit();
        assert_eq!(scheduler.current(), p0);
        scheduler.commit();
        assert_eq!(scheduler.current(), p2);

        // Bit-for-bit where it left off.
        assert_eq!(scheduler.current_stack_pointer(), sp_before);
        assert_exclusive_membership(&scheduler);
    }

    #[test]
    fn test_stopping_the_bootstrap_is_legal_while_others_run() {
        let (mut scheduler, p0) = fresh_scheduler();
        let p1 = scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();
        scheduler.commit();
        assert_eq!(scheduler.current(), p0);

        let stopped = scheduler.stop_current();
        assert_eq!(stopped, p0);
        scheduler.commit();

        // P1 carries on alone; the bootstrap stays on the main ring.
        assert_eq!(scheduler.current(), p1);
        assert_eq!(scheduler.runnable_count(), 1);
        let order: Vec<_> = scheduler.processes().collect();
        assert_eq!(order, [p0, p1]);
        assert_exclusive_membership(&scheduler);

        scheduler.resume_process(p0).unwrap();
        scheduler.commit();
        assert_eq!(scheduler.runnable_count(), 2);
    }

    #[test]
    #[should_panic(expected = "deadlock")]
    fn test_stopping_the_last_runnable_is_fatal() {
        let (mut scheduler, _p0) = fresh_scheduler();
        scheduler.stop_current();
        scheduler.commit();
    }

    #[test]
    #[should_panic(expected = "deadlock")]
    fn test_stopping_everyone_hits_the_deadlock_path() {
        let (mut scheduler, _p0) = fresh_scheduler();
        scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();
        scheduler.commit();

        // Stop the bootstrap, then the sole survivor.
        scheduler.stop_current();
        scheduler.commit();
        scheduler.stop_current();
        scheduler.commit();
    }

    #[test]
    #[should_panic(expected = "deadlock")]
    fn test_pending_arrivals_do_not_excuse_emptying_the_ring() {
        let (mut scheduler, _p0) = fresh_scheduler();
        scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();

        // The queued process is not runnable yet; pending requests are
        // applied before the queue is drained.
        scheduler.stop_current();
        scheduler.commit();
    }

    #[test]
    #[should_panic(expected = "bootstrap")]
    fn test_terminating_the_bootstrap_is_fatal() {
        let (mut scheduler, _p0) = fresh_scheduler();
        scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();
        scheduler.commit();

        scheduler.terminate_current();
        scheduler.commit();
    }

    #[test]
    #[should_panic(expected = "resuming an active process")]
    fn test_resuming_a_running_process_is_fatal() {
        let (mut scheduler, p0) = fresh_scheduler();
        let _ = scheduler.resume_process(p0);
    }

    #[test]
    fn test_arena_exhaustion_is_recoverable() {
        let heap = leaked_heap(3 * 1024);
        let mut scheduler = Scheduler::new();
        let p0 = scheduler
            .init(heap, test_descriptor(), test_requirements())
            .unwrap();

        let err = scheduler.create_process(test_descriptor(), test_requirements());
        assert_eq!(err.err(), Some(KernelError::OutOfMemory));

        // The failed creation left no trace.
        assert_eq!(scheduler.process_count(), 1);
        scheduler.commit();
        assert_eq!(scheduler.current(), p0);
        assert_exclusive_membership(&scheduler);
    }

    #[test]
    fn test_slot_exhaustion_is_recoverable() {
        let heap = leaked_heap(64 * 1024);
        let mut scheduler = Scheduler::new();
        scheduler
            .init(heap, test_descriptor(), test_requirements())
            .unwrap();
        for _ in 1..crate::config::MAX_PROCESSES {
            scheduler
                .create_process(test_descriptor(), test_requirements())
                .unwrap();
        }

        let err = scheduler.create_process(test_descriptor(), test_requirements());
        assert_eq!(err.err(), Some(KernelError::TooManyProcesses));
        assert_eq!(scheduler.process_count(), crate::config::MAX_PROCESSES);
    }

    #[test]
    fn test_terminate_subsumes_pending_stop() {
        let (mut scheduler, p0) = fresh_scheduler();
        let p1 = scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();
        let p2 = scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();
        scheduler.commit();
        scheduler.commit();
        assert_eq!(scheduler.current(), p1);

        // Stop then terminate before the commit: terminate wins, and
        // the stale stop must not hit the next current element.
        scheduler.stop_current();
        scheduler.terminate_current();
        scheduler.commit();

        assert!(!scheduler.handle_is_live(p1));
        assert_eq!(scheduler.current(), p2);
        assert_eq!(scheduler.runnable_count(), 2);
        assert!(!scheduler.stop_requested.load(Ordering::Relaxed));

        scheduler.commit();
        assert_eq!(scheduler.current(), p0);
        assert_eq!(scheduler.runnable_count(), 2);
    }

    struct StickyPolicy;

    impl SchedulingPolicy for StickyPolicy {
        fn arbitrate(
            &self,
            table: &mut ElementTable,
            run_head: &mut ElementIndex,
            incoming: Option<ElementIndex>,
        ) {
            if let Some(first) = incoming {
                ring::ring_concat(table, LinkKind::Status, *run_head, first);
            }
        }
    }

    static STICKY: StickyPolicy = StickyPolicy;

    #[test]
    fn test_custom_policy_install_and_reset() {
        let (mut scheduler, p0) = fresh_scheduler();
        let p1 = scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();

        scheduler.set_policy(Some(&STICKY));
        scheduler.commit();
        scheduler.commit();
        assert_eq!(scheduler.current(), p0);
        assert_eq!(scheduler.runnable_count(), 2);

        // Back to round-robin: rotation resumes.
        scheduler.set_policy(None);
        scheduler.commit();
        assert_eq!(scheduler.current(), p1);
    }

    #[test]
    fn test_queries_track_the_current_element() {
        let (mut scheduler, _p0) = fresh_scheduler();
        let slow = ProcessRequirements {
            activity_time: 25,
            ..test_requirements()
        };
        let p1 = scheduler.create_process(test_descriptor(), slow).unwrap();

        scheduler.commit();
        scheduler.commit();
        assert_eq!(scheduler.current(), p1);
        assert_eq!(scheduler.current_requirements().activity_time, 25);
        assert_eq!(scheduler.current_arena().ram_size(), slow.ram_size);
    }

    #[test]
    fn test_stack_pointer_recording_round_trip() {
        let (mut scheduler, _p0) = fresh_scheduler();
        let parked = scheduler.current_stack_pointer().wrapping_sub(4);
        scheduler.record_stack_pointer(parked);
        assert_eq!(scheduler.current_stack_pointer(), parked);
    }

    #[test]
    fn test_frame_argument_carries_the_private_descriptor_copy() {
        let (mut scheduler, _p0) = fresh_scheduler();

        let mut blob = [0x5au8; 12];
        let descriptor = ProcessDescriptor {
            args: blob.as_mut_ptr(),
            args_len: blob.len(),
            ..test_descriptor()
        };
        scheduler
            .create_process(descriptor, test_requirements())
            .unwrap();
        scheduler.commit();
        scheduler.commit();

        // R0 slot: nine software-frame words sit below the hardware frame.
        let argument = unsafe { scheduler.current_stack_pointer().add(9).read() };
        let private = argument as *const ProcessDescriptor;

        // The entry function receives a copy inside the arena, not the
        // caller's original, and the copy matches field for field.
        assert_ne!(private, &descriptor as *const ProcessDescriptor);
        let copy = unsafe { private.read() };
        assert_eq!(copy.entry as *const (), descriptor.entry as *const ());
        assert_eq!(copy.args, descriptor.args);
        assert_eq!(copy.args_len, blob.len());
    }

    #[test]
    #[should_panic(expected = "commit before scheduler init")]
    fn test_commit_before_init_is_fatal() {
        Scheduler::new().commit();
    }

    #[test]
    fn test_exclusive_membership_through_full_lifecycle() {
        let (mut scheduler, _p0) = fresh_scheduler();
        let p1 = scheduler
            .create_process(test_descriptor(), test_requirements())
            .unwrap();
        assert_exclusive_membership(&scheduler);

        scheduler.commit();
        assert_exclusive_membership(&scheduler);

        while scheduler.current() != p1 {
            scheduler.commit();
        }
        scheduler.stop_current();
        scheduler.commit();
        assert_exclusive_membership(&scheduler);

        scheduler.resume_process(p1).unwrap();
        assert_exclusive_membership(&scheduler);

        scheduler.commit();
        assert_exclusive_membership(&scheduler);

        while scheduler.current() != p1 {
            scheduler.commit();
        }
        scheduler.terminate_current();
        scheduler.commit();
        assert_exclusive_membership(&scheduler);
        assert!(!scheduler.handle_is_live(p1));
    }
}
