// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Thread Table
//!
//! Fixed-size table of thread control blocks indexed by thread ID, plus
//! the allocator that hands those IDs out.

use std::collections::BTreeSet;

use super::thread::{Thread, ThreadId, MAIN_THREAD_ID};
use crate::error::{Error, Result};

/// ============================================================================
/// ID Allocator
/// ============================================================================

/// Thread ID allocator
///
/// Always hands out the smallest free ID, so reuse is deterministic.
/// ID 0 belongs to the main thread and is never in the free set.
#[derive(Debug)]
pub struct IdAllocator {
    free: BTreeSet<ThreadId>,
    allocated: BTreeSet<ThreadId>,
    max: usize,
}

impl IdAllocator {
    /// Create an allocator for IDs `0..max`, with ID 0 taken
    pub fn new(max: usize) -> Self {
        Self {
            free: (1..max).collect(),
            allocated: BTreeSet::from([MAIN_THREAD_ID]),
            max,
        }
    }

    /// Smallest free ID, without taking it
    pub fn peek(&self) -> Result<ThreadId> {
        self.free
            .first()
            .copied()
            .ok_or(Error::CapacityExceeded { max: self.max })
    }

    /// Take the smallest free ID
    pub fn allocate(&mut self) -> Result<ThreadId> {
        let id = self.peek()?;
        self.free.remove(&id);
        self.allocated.insert(id);
        Ok(id)
    }

    /// Return an ID to the free pool
    pub fn release(&mut self, id: ThreadId) {
        if id != MAIN_THREAD_ID && self.allocated.remove(&id) {
            self.free.insert(id);
        }
    }

    /// Check if an ID belongs to a live thread
    #[cfg(test)]
    pub(crate) fn is_allocated(&self, id: ThreadId) -> bool {
        self.allocated.contains(&id)
    }

    /// IDs of live threads, ascending
    pub fn allocated(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.allocated.iter().copied()
    }

    /// IDs available for reuse, ascending
    pub fn free(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.free.iter().copied()
    }

    /// Size of the ID space
    pub fn max(&self) -> usize {
        self.max
    }
}

/// ============================================================================
/// Thread Table
/// ============================================================================

/// Thread table
///
/// Slot `i` holds the control block of thread `i`. The table owns every
/// spawned thread's stack through its control block.
#[derive(Debug)]
pub struct ThreadTable {
    slots: Vec<Option<Thread>>,
    ids: IdAllocator,
}

impl ThreadTable {
    /// Create a table of `max` slots holding only the main thread
    pub fn new(max: usize) -> Self {
        let mut slots: Vec<Option<Thread>> = (0..max).map(|_| None).collect();
        slots[MAIN_THREAD_ID] = Some(Thread::main());

        Self {
            slots,
            ids: IdAllocator::new(max),
        }
    }

    /// Insert a new thread under the smallest free ID
    ///
    /// `build` receives the chosen ID; the ID is only taken once the
    /// control block exists.
    pub fn insert_with(&mut self, build: impl FnOnce(ThreadId) -> Result<Thread>) -> Result<ThreadId> {
        let id = self.ids.peek()?;
        let thread = build(id)?;
        let taken = self.ids.allocate()?;
        debug_assert_eq!(id, taken);
        self.slots[id] = Some(thread);
        Ok(id)
    }

    /// Remove a thread and release its ID
    pub fn remove(&mut self, id: ThreadId) -> Option<Thread> {
        if id == MAIN_THREAD_ID {
            return None;
        }
        let thread = self.slots.get_mut(id)?.take()?;
        self.ids.release(id);
        Some(thread)
    }

    /// Get a thread
    pub fn get(&self, id: ThreadId) -> Option<&Thread> {
        self.slots.get(id)?.as_ref()
    }

    /// Get a thread (mutable)
    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.slots.get_mut(id)?.as_mut()
    }

    /// Iterate over live threads in ID order
    pub fn iter(&self) -> impl Iterator<Item = &Thread> {
        self.slots.iter().flatten()
    }

    /// Iterate over live threads in ID order (mutable)
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Thread> {
        self.slots.iter_mut().flatten()
    }

    /// Number of live threads
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.iter().count()
    }

    /// Get the ID allocator
    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::thread::Stack;

    extern "C" fn entry() {}

    fn spawn(table: &mut ThreadTable) -> Result<ThreadId> {
        table.insert_with(|id| Ok(Thread::new(id, entry, Stack::allocate(4096)?)))
    }

    #[test]
    fn test_allocator_smallest_first() {
        let mut ids = IdAllocator::new(5);
        assert_eq!(ids.allocate().unwrap(), 1);
        assert_eq!(ids.allocate().unwrap(), 2);
        assert_eq!(ids.allocate().unwrap(), 3);
        ids.release(2);
        ids.release(1);
        assert_eq!(ids.allocate().unwrap(), 1);
        assert_eq!(ids.allocate().unwrap(), 2);
    }

    #[test]
    fn test_allocator_capacity() {
        let mut ids = IdAllocator::new(3);
        ids.allocate().unwrap();
        ids.allocate().unwrap();
        assert!(matches!(ids.allocate(), Err(Error::CapacityExceeded { max: 3 })));
    }

    #[test]
    fn test_allocator_never_frees_main() {
        let mut ids = IdAllocator::new(3);
        ids.release(MAIN_THREAD_ID);
        assert!(ids.is_allocated(MAIN_THREAD_ID));
        assert_eq!(ids.free().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_table_insert_remove() {
        let mut table = ThreadTable::new(4);
        assert_eq!(table.len(), 1);
        let a = spawn(&mut table).unwrap();
        let b = spawn(&mut table).unwrap();
        assert_eq!((a, b), (1, 2));

        let removed = table.remove(a).unwrap();
        assert_eq!(removed.id(), a);
        assert!(table.get(a).is_none());
        assert!(!table.ids().is_allocated(a));

        assert_eq!(spawn(&mut table).unwrap(), a);
    }

    #[test]
    fn test_table_failed_build_keeps_id() {
        let mut table = ThreadTable::new(4);
        let result = table.insert_with(|_| Err(Error::StackAllocation { size: 1 }));
        assert!(result.is_err());
        assert_eq!(table.ids().free().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_table_main_not_removable() {
        let mut table = ThreadTable::new(2);
        assert!(table.remove(MAIN_THREAD_ID).is_none());
        assert!(table.get(MAIN_THREAD_ID).is_some());
    }
}
