// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Synchronization Primitives
//!
//! Logical threads never run in parallel, so the only thing scheduler
//! state needs protection from is the preemption signal firing halfway
//! through a mutation.
//!
//! # Primitives
//!
//! - **PreemptGuard**: masks the preemption signal for as long as it lives
//!
//! Global scheduler state additionally sits behind a `spin::Mutex`, which
//! is only ever locked while a [`PreemptGuard`] is held and is never held
//! across a context switch.

pub mod preempt;

// Re-exports
pub use preempt::{PreemptGuard, PREEMPT_SIGNAL};
