// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Scheduler implementation
//!
//! Strict round-robin scheduler over the thread table. Every operation
//! either fully applies or returns an error before touching any state.
//! Operations that take the running thread off the CPU return the
//! [`Switch`] the caller has to carry out.

use core::mem;

use super::state::{RunQueue, ThreadState};
use super::table::ThreadTable;
use super::thread::{EntryPoint, Stack, Thread, ThreadId, MAIN_THREAD_ID};
use crate::config::Config;
use crate::error::{InvalidArgument, Result};

/// Why the running thread is leaving the CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchReason {
    /// The quantum expired; the running thread goes back to the queue tail
    Preempted,
    /// The running thread blocked, slept or terminated and must not be requeued
    Voluntary,
}

/// Context transfer decided by the scheduler
#[derive(Debug)]
pub struct Switch {
    /// Thread whose context is saved
    pub from: ThreadId,
    /// Thread whose context is restored
    pub to: ThreadId,
    /// Stack of `from` if it terminated itself
    ///
    /// `from` is still executing on this stack, so it must outlive the
    /// transfer and is freed by whichever thread runs next.
    pub retired: Option<Stack>,
}

impl Switch {
    /// Check if the switch leaves the same thread running
    pub fn is_noop(&self) -> bool {
        self.from == self.to && self.retired.is_none()
    }
}

/// Outcome of a successful terminate
#[derive(Debug)]
pub enum Termination {
    /// The main thread terminated; the whole process has to exit
    Process,
    /// A thread that was not running has been removed
    Removed,
    /// The running thread removed itself; carry out the switch
    Switch(Switch),
}

/// Scheduler
///
/// Owns the thread table and the run queue.
#[derive(Debug)]
pub struct Scheduler {
    /// All live threads
    threads: ThreadTable,
    /// Threads eligible to run, in round-robin order
    run_queue: RunQueue,
    /// Currently running thread
    current: ThreadId,
    /// Quanta started since initialization
    total_quanta: u64,
    /// Stack size for spawned threads
    stack_size: usize,
}

impl Scheduler {
    /// Create a scheduler whose only thread is the running main thread
    ///
    /// # Returns
    ///
    /// * `Ok(Scheduler)` - Quantum 1 has started on the main thread
    /// * `Err(Error::InvalidArgument)` - `config` failed validation
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            threads: ThreadTable::new(config.max_threads),
            run_queue: RunQueue::with_capacity(config.max_threads),
            current: MAIN_THREAD_ID,
            total_quanta: 1,
            stack_size: config.stack_size,
        })
    }

    /// Create a new thread at the tail of the run queue
    ///
    /// # Returns
    ///
    /// * `Ok(ThreadId)` - ID of the new thread (never 0)
    /// * `Err(Error::InvalidArgument)` - No entry point was given
    /// * `Err(Error::CapacityExceeded)` - The thread table is full
    /// * `Err(Error::StackAllocation)` - Fatal: no memory for the stack
    pub fn spawn(&mut self, entry_point: Option<EntryPoint>) -> Result<ThreadId> {
        let entry_point = entry_point.ok_or(InvalidArgument::NullEntryPoint)?;
        let stack_size = self.stack_size;

        let id = self.threads.insert_with(|id| {
            let stack = Stack::allocate(stack_size)?;
            Ok(Thread::new(id, entry_point, stack))
        })?;
        self.run_queue.push(id);

        Ok(id)
    }

    /// Terminate a thread
    ///
    /// Terminating the main thread does not change any state: the caller
    /// is expected to release the stacks and exit the process.
    pub fn terminate(&mut self, tid: ThreadId) -> Result<Termination> {
        self.thread(tid)?;

        if tid == MAIN_THREAD_ID {
            return Ok(Termination::Process);
        }

        self.run_queue.remove(tid);
        let retired = self
            .threads
            .remove(tid)
            .and_then(Thread::into_stack);

        if tid != self.current {
            return Ok(Termination::Removed);
        }

        let mut switch = self.tick(SwitchReason::Voluntary);
        switch.retired = retired;
        Ok(Termination::Switch(switch))
    }

    /// Block a thread until it is resumed
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Switch))` - The running thread blocked itself
    /// * `Ok(None)` - Another thread was blocked, or it was already blocked
    /// * `Err(Error::InvalidArgument)` - `tid` is the main thread or unknown
    pub fn block(&mut self, tid: ThreadId) -> Result<Option<Switch>> {
        if tid == MAIN_THREAD_ID {
            return Err(InvalidArgument::BlockMainThread.into());
        }

        let thread = self.thread_mut(tid)?;
        if thread.is_blocked() {
            return Ok(None);
        }
        thread.set_blocked(true);
        self.run_queue.remove(tid);

        if tid == self.current {
            return Ok(Some(self.tick(SwitchReason::Voluntary)));
        }

        Ok(None)
    }

    /// Resume a blocked thread
    ///
    /// A thread that is still sleeping stays off the run queue until its
    /// countdown expires.
    pub fn resume(&mut self, tid: ThreadId) -> Result<()> {
        let thread = self.thread_mut(tid)?;
        if !thread.is_blocked() {
            return Ok(());
        }
        thread.set_blocked(false);

        if !thread.is_sleeping() {
            self.run_queue.push(tid);
        }

        Ok(())
    }

    /// Put the running thread to sleep for `num_quantums` quanta
    ///
    /// The countdown starts at `num_quantums + 1` because the quantum the
    /// call is made in is already partly consumed.
    pub fn sleep(&mut self, num_quantums: u32) -> Result<Switch> {
        if self.current == MAIN_THREAD_ID {
            return Err(InvalidArgument::SleepMainThread.into());
        }

        let current = self.current;
        self.thread_mut(current)?
            .start_sleep(num_quantums.saturating_add(1));
        self.run_queue.remove(current);

        Ok(self.tick(SwitchReason::Voluntary))
    }

    /// Advance the scheduler by one tick and pick the next thread
    ///
    /// This implements the core scheduling algorithm:
    /// 1. Count down every sleeping thread; an expired sleeper that is not
    ///    blocked goes to the queue tail
    /// 2. If preempted, the running thread goes to the queue tail
    /// 3. The queue head becomes the running thread and is charged a quantum
    pub fn tick(&mut self, reason: SwitchReason) -> Switch {
        for thread in self.threads.iter_mut() {
            if thread.tick_sleep() && !thread.is_blocked() {
                self.run_queue.push(thread.id());
            }
        }

        if reason == SwitchReason::Preempted {
            self.run_queue.push(self.current);
        }

        // The main thread can never block or sleep, so the queue holds it
        // whenever another thread gives up the CPU.
        debug_assert!(!self.run_queue.is_empty(), "run queue drained");
        let next = self.run_queue.pop().unwrap_or(MAIN_THREAD_ID);

        let from = mem::replace(&mut self.current, next);
        self.total_quanta += 1;
        if let Some(thread) = self.threads.get_mut(next) {
            thread.account_quantum();
        }

        Switch {
            from,
            to: next,
            retired: None,
        }
    }

    /// Drop every stack except the running thread's
    ///
    /// Used on the way to process exit. The running thread may be executing
    /// on its own stack, which the exit reclaims instead.
    pub fn release_stacks(&mut self) {
        let current = self.current;
        for thread in self.threads.iter_mut().filter(|t| t.id() != current) {
            thread.release_stack();
        }
    }

    /// Get the running thread
    pub fn current(&self) -> ThreadId {
        self.current
    }

    /// Get the number of quanta started since initialization
    pub fn total_quanta(&self) -> u64 {
        self.total_quanta
    }

    /// Get the number of quanta a thread has run
    pub fn quanta(&self, tid: ThreadId) -> Result<u64> {
        Ok(self.thread(tid)?.quantum_count())
    }

    /// Get the state of a thread
    pub fn state(&self, tid: ThreadId) -> Result<ThreadState> {
        let thread = self.thread(tid)?;
        if tid == self.current {
            return Ok(ThreadState::Running);
        }
        Ok(ThreadState::from_flags(thread.flags()))
    }

    /// Look up a live thread
    pub fn thread(&self, tid: ThreadId) -> Result<&Thread> {
        self.threads
            .get(tid)
            .ok_or_else(|| InvalidArgument::UnknownThread(tid).into())
    }

    /// Look up a live thread (mutable)
    pub fn thread_mut(&mut self, tid: ThreadId) -> Result<&mut Thread> {
        self.threads
            .get_mut(tid)
            .ok_or_else(|| InvalidArgument::UnknownThread(tid).into())
    }

    /// Get the thread table
    pub fn threads(&self) -> &ThreadTable {
        &self.threads
    }

    /// Get the run queue
    pub fn run_queue(&self) -> &RunQueue {
        &self.run_queue
    }

    /// Check every scheduler invariant, panicking on the first violation
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        use std::collections::BTreeSet;

        let queued: Vec<ThreadId> = self.run_queue.iter().collect();
        let unique: BTreeSet<ThreadId> = queued.iter().copied().collect();
        assert_eq!(unique.len(), queued.len(), "duplicate in run queue {queued:?}");
        assert!(!unique.contains(&self.current), "running thread queued");

        for thread in self.threads.iter() {
            let eligible = thread.id() != self.current && thread.is_runnable();
            assert_eq!(
                unique.contains(&thread.id()),
                eligible,
                "thread {} queued={} eligible={}",
                thread.id(),
                unique.contains(&thread.id()),
                eligible
            );
        }
        for id in &unique {
            assert!(self.threads.get(*id).is_some(), "dead thread {id} queued");
        }
        assert!(self.threads.get(self.current).is_some(), "running thread is dead");

        let main = self.threads.get(MAIN_THREAD_ID).expect("main thread missing");
        assert!(main.is_runnable());
        assert!(main.stack().is_none());

        let ids = self.threads.ids();
        let allocated: BTreeSet<ThreadId> = ids.allocated().collect();
        let free: BTreeSet<ThreadId> = ids.free().collect();
        assert!(allocated.is_disjoint(&free));
        assert_eq!(allocated.len() + free.len(), ids.max());
        assert!(!free.contains(&MAIN_THREAD_ID));
        for id in 0..ids.max() {
            assert_eq!(allocated.contains(&id), self.threads.get(id).is_some());
        }
    }
}
