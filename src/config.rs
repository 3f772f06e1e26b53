// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Runtime Configuration
//!
//! The thread table and stacks are sized once, at [`init`](crate::init),
//! and never grow afterwards.

use crate::error::{InvalidArgument, Result};

/// Default maximum number of live threads, main thread included
pub const MAX_THREAD_NUM: usize = 100;

/// Default stack size for each spawned thread, in bytes
pub const STACK_SIZE: usize = 64 * 1024;

/// Smallest stack a thread is allowed to run on
///
/// The signal handler executes on the interrupted thread's stack, so
/// this has to leave room for the kernel's signal frame as well.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Length of one scheduling quantum in microseconds
    pub quantum_usecs: i64,
    /// Size of the thread table (main thread included)
    pub max_threads: usize,
    /// Stack size for spawned threads in bytes
    pub stack_size: usize,
}

impl Config {
    /// Create a configuration with the default table and stack sizes
    pub const fn new(quantum_usecs: i64) -> Self {
        Self {
            quantum_usecs,
            max_threads: MAX_THREAD_NUM,
            stack_size: STACK_SIZE,
        }
    }

    /// Set the size of the thread table
    pub const fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Set the stack size of spawned threads
    pub const fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Check the configuration before anything is allocated
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The runtime can be built from this configuration
    /// * `Err(Error::InvalidArgument)` - A bound is out of range
    pub fn validate(&self) -> Result<()> {
        if self.quantum_usecs <= 0 {
            return Err(InvalidArgument::Quantum(self.quantum_usecs).into());
        }
        if self.max_threads < 2 {
            return Err(InvalidArgument::MaxThreads(self.max_threads).into());
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(InvalidArgument::StackSize(self.stack_size).into());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(100_000)
    }
}
