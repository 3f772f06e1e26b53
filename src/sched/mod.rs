// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Scheduler and thread management
//!
//! This module holds the scheduler state machine. Nothing in here touches
//! signals or machine contexts: every operation returns a [`Switch`]
//! describing which context to leave and which to enter, and the runtime
//! performs the transfer.
//!
//! # Example
//! ```ignore
//! use uthreads::{Config, Scheduler, SwitchReason};
//!
//! let mut scheduler = Scheduler::new(&Config::new(100_000))?;
//! let a = scheduler.spawn(Some(entry))?;
//! let switch = scheduler.tick(SwitchReason::Preempted);
//! assert_eq!(switch.to, a);
//! ```

pub mod thread;
pub mod state;
pub mod table;
pub mod scheduler;

pub use thread::{Thread, ThreadId, EntryPoint, Stack, ThreadFlags, MAIN_THREAD_ID};
pub use state::{ThreadState, RunQueue};
pub use table::{IdAllocator, ThreadTable};
pub use scheduler::{Scheduler, Switch, SwitchReason, Termination};
