// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! # uthreads - Preemptive User-Level Threads
//!
//! uthreads multiplexes many logical threads onto the single OS thread
//! that calls [`init`]. A virtual interval timer delivers `SIGVTALRM` at
//! every quantum boundary and the signal handler switches to the next
//! thread in strict round-robin order.
//!
//! ## Architecture
//!
//! ```text
//! src/
//! ├── arch/              # Context capture/restore (ucontext)
//! ├── sched/             # Thread table, ready queue, scheduler core
//! ├── sync/              # Preemption guard (signal masking)
//! ├── timer.rs           # SIGVTALRM interval timer
//! ├── runtime.rs         # Global instance and switch routine
//! ├── api.rs             # Public entry points
//! ├── ffi.rs             # C ABI (uthread_*)
//! └── lib.rs             # This file
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! extern "C" fn worker() {
//!     loop {
//!         uthreads::sleep(2).ok();
//!     }
//! }
//!
//! uthreads::init(100_000)?;
//! let tid = uthreads::spawn(worker)?;
//! assert_eq!(uthreads::current_id(), 0);
//! ```
//!
//! ## Caveats
//!
//! A thread can be preempted at any instruction that runs with the
//! preemption signal unmasked. Thread bodies that touch non-reentrant
//! process-wide state (stdio, the allocator) must do so inside
//! [`without_preemption`].

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
compile_error!("uthreads requires the glibc ucontext API (linux-gnu targets)");

// Context primitive
pub mod arch;

// Fixed configuration
pub mod config;

// Error types
pub mod error;

// Scheduler state machine
pub mod sched;

// Critical sections
pub mod sync;

// Preemption timer
pub mod timer;

// Global runtime
mod runtime;

// Public entry points
mod api;

// C ABI
pub mod ffi;

pub use api::{
    block, current_id, init, init_with_config, quanta, resume, sleep, spawn, terminate,
    thread_state, total_quanta, without_preemption,
};

pub use config::{Config, MAX_THREAD_NUM, MIN_STACK_SIZE, STACK_SIZE};

pub use error::{Error, InvalidArgument, Result};

pub use sched::{
    EntryPoint, Scheduler, Stack, SwitchReason, Termination, Thread, ThreadFlags, ThreadId,
    ThreadState, MAIN_THREAD_ID,
};

// Property tests (only compiled in test mode)
#[cfg(test)]
mod tests;
