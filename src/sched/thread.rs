// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread representation and management
//!
//! Defines the thread control block and the stack it owns.

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Thread ID type
pub type ThreadId = usize;

/// Function entry point type
pub type EntryPoint = extern "C" fn();

/// ID of the thread that called `init`
pub const MAIN_THREAD_ID: ThreadId = 0;

bitflags! {
    /// Scheduling flags of a thread
    ///
    /// Blocking and sleeping are tracked independently: a thread can be
    /// both, and only leaves the blocked state through an explicit resume.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ThreadFlags: u8 {
        /// Blocked until resumed
        const BLOCKED = 1 << 0;
        /// Waiting for its sleep countdown to expire
        const SLEEPING = 1 << 1;
    }
}

/// Stack memory owned by a spawned thread
///
/// The buffer is heap allocated and never moves, so a context built on
/// top of it stays valid for as long as the `Stack` is alive.
pub struct Stack {
    mem: Box<[u8]>,
}

impl Stack {
    /// Allocate a zeroed stack of `size` bytes
    ///
    /// # Returns
    ///
    /// * `Ok(Stack)` - The stack memory
    /// * `Err(Error::StackAllocation)` - The allocator could not satisfy the request
    pub fn allocate(size: usize) -> Result<Self> {
        let mut mem = Vec::new();
        mem.try_reserve_exact(size)
            .map_err(|_| Error::StackAllocation { size })?;
        mem.resize(size, 0);

        Ok(Self {
            mem: mem.into_boxed_slice(),
        })
    }

    /// Lowest address of the stack
    pub fn base_mut(&mut self) -> *mut u8 {
        self.mem.as_mut_ptr()
    }

    /// Size of the stack in bytes
    pub fn len(&self) -> usize {
        self.mem.len()
    }

    /// Check if the stack has no memory
    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }
}

impl core::fmt::Debug for Stack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stack")
            .field("base", &self.mem.as_ptr())
            .field("len", &self.mem.len())
            .finish()
    }
}

/// Thread control block
#[derive(Debug)]
pub struct Thread {
    /// Thread ID
    id: ThreadId,
    /// Quanta this thread has started as the running thread
    quantum_count: u64,
    /// Thread entry point (`None` for the main thread)
    entry_point: Option<EntryPoint>,
    /// Stack memory (`None` for the main thread)
    stack: Option<Stack>,
    /// Block/sleep flags
    flags: ThreadFlags,
    /// Ticks left before the sleep expires
    sleep_count: u32,
}

impl Thread {
    /// Create the control block of the main thread
    ///
    /// The main thread is already running when it is created, so it
    /// starts with one quantum on its account.
    pub fn main() -> Self {
        Self {
            id: MAIN_THREAD_ID,
            quantum_count: 1,
            entry_point: None,
            stack: None,
            flags: ThreadFlags::empty(),
            sleep_count: 0,
        }
    }

    /// Create a new spawned thread
    pub fn new(id: ThreadId, entry_point: EntryPoint, stack: Stack) -> Self {
        Self {
            id,
            quantum_count: 0,
            entry_point: Some(entry_point),
            stack: Some(stack),
            flags: ThreadFlags::empty(),
            sleep_count: 0,
        }
    }

    /// Get the thread ID
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Get the number of quanta this thread has run
    pub fn quantum_count(&self) -> u64 {
        self.quantum_count
    }

    /// Get the entry point
    pub fn entry_point(&self) -> Option<EntryPoint> {
        self.entry_point
    }

    /// Get the stack
    pub fn stack(&self) -> Option<&Stack> {
        self.stack.as_ref()
    }

    /// Get the stack (mutable)
    pub fn stack_mut(&mut self) -> Option<&mut Stack> {
        self.stack.as_mut()
    }

    /// Give up the stack
    pub fn into_stack(self) -> Option<Stack> {
        self.stack
    }

    /// Drop the stack
    pub(crate) fn release_stack(&mut self) {
        self.stack = None;
    }

    /// Get the scheduling flags
    pub fn flags(&self) -> ThreadFlags {
        self.flags
    }

    /// Check if the thread is blocked
    pub fn is_blocked(&self) -> bool {
        self.flags.contains(ThreadFlags::BLOCKED)
    }

    /// Check if the thread is sleeping
    pub fn is_sleeping(&self) -> bool {
        self.flags.contains(ThreadFlags::SLEEPING)
    }

    /// Check if the thread may sit in the run queue
    pub fn is_runnable(&self) -> bool {
        self.flags.is_empty()
    }

    /// Ticks left before the sleep expires
    pub fn sleep_count(&self) -> u32 {
        self.sleep_count
    }

    pub(crate) fn set_blocked(&mut self, blocked: bool) {
        self.flags.set(ThreadFlags::BLOCKED, blocked);
    }

    /// Put the thread to sleep for `ticks` scheduler ticks
    pub(crate) fn start_sleep(&mut self, ticks: u32) {
        self.flags.insert(ThreadFlags::SLEEPING);
        self.sleep_count = ticks;
    }

    /// Count down one tick of sleep
    ///
    /// # Returns
    ///
    /// `true` if the sleep expired on this tick
    pub(crate) fn tick_sleep(&mut self) -> bool {
        if !self.is_sleeping() {
            return false;
        }

        self.sleep_count = self.sleep_count.saturating_sub(1);
        if self.sleep_count == 0 {
            self.flags.remove(ThreadFlags::SLEEPING);
            return true;
        }

        false
    }

    /// Account for one more quantum as the running thread
    pub(crate) fn account_quantum(&mut self) {
        self.quantum_count += 1;
    }
}
