// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread state and run queue
//!
//! Defines thread states and the FIFO run queue.

use std::collections::VecDeque;

use super::thread::{ThreadFlags, ThreadId};

/// Thread states
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Thread is ready to run
    Ready,
    /// Thread is currently running
    Running,
    /// Thread is blocked until resumed
    Blocked,
    /// Thread is sleeping
    Sleeping,
    /// Thread is blocked and its sleep has not expired yet
    BlockedSleeping,
}

impl ThreadState {
    /// Derive the state of a thread that is not running
    pub fn from_flags(flags: ThreadFlags) -> Self {
        let blocked = flags.contains(ThreadFlags::BLOCKED);
        let sleeping = flags.contains(ThreadFlags::SLEEPING);
        match (blocked, sleeping) {
            (true, true) => Self::BlockedSleeping,
            (true, false) => Self::Blocked,
            (false, true) => Self::Sleeping,
            (false, false) => Self::Ready,
        }
    }
}

/// Run queue
///
/// Plain round-robin FIFO of thread IDs. The backing buffer is reserved
/// up front for the whole thread table, so pushing from the signal
/// handler never reallocates.
#[derive(Debug)]
pub struct RunQueue {
    ids: VecDeque<ThreadId>,
}

impl RunQueue {
    /// Create a new empty run queue for up to `capacity` threads
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: VecDeque::with_capacity(capacity),
        }
    }

    /// Add a thread to the tail of the run queue
    pub fn push(&mut self, thread_id: ThreadId) {
        debug_assert!(!self.contains(thread_id), "thread {thread_id} queued twice");
        self.ids.push_back(thread_id);
    }

    /// Remove the thread at the head of the run queue
    pub fn pop(&mut self) -> Option<ThreadId> {
        self.ids.pop_front()
    }

    /// Remove a specific thread from the run queue
    ///
    /// # Returns
    ///
    /// `true` if the thread was queued
    pub fn remove(&mut self, thread_id: ThreadId) -> bool {
        match self.ids.iter().position(|&id| id == thread_id) {
            Some(index) => {
                self.ids.remove(index);
                true
            }
            None => false,
        }
    }

    /// Check if a thread is queued
    pub fn contains(&self, thread_id: ThreadId) -> bool {
        self.ids.contains(&thread_id)
    }

    /// Iterate over the queued IDs, head first
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.ids.iter().copied()
    }

    /// Check if the run queue is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Get the number of threads in the run queue
    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

impl Default for RunQueue {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_queue_fifo() {
        let mut queue = RunQueue::with_capacity(4);
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_run_queue_remove_middle() {
        let mut queue = RunQueue::with_capacity(4);
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert!(queue.remove(2));
        assert!(!queue.remove(2));
        assert_eq!(queue.iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_thread_state_from_flags() {
        assert_eq!(ThreadState::from_flags(ThreadFlags::empty()), ThreadState::Ready);
        assert_eq!(ThreadState::from_flags(ThreadFlags::BLOCKED), ThreadState::Blocked);
        assert_eq!(ThreadState::from_flags(ThreadFlags::SLEEPING), ThreadState::Sleeping);
        assert_eq!(
            ThreadState::from_flags(ThreadFlags::all()),
            ThreadState::BlockedSleeping
        );
    }
}
