// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Public API
//!
//! Thin entry points over the global runtime. Each one runs with
//! preemption disabled; a call that takes the running thread off the CPU
//! returns once that thread is scheduled again.

use log::debug;

use crate::config::Config;
use crate::error::Result;
use crate::runtime::{self, Step};
use crate::sched::{EntryPoint, Termination, ThreadId, ThreadState, MAIN_THREAD_ID};
use crate::sync::PreemptGuard;

/// Initialize the library with quanta of `quantum_usecs` microseconds
///
/// The caller becomes thread 0 (the main thread) and the preemption
/// timer starts.
///
/// # Returns
///
/// * `Ok(())` - The library is running
/// * `Err(Error::InvalidArgument)` - The quantum is not positive, or the
///   library is already initialized
pub fn init(quantum_usecs: i64) -> Result<()> {
    init_with_config(Config::new(quantum_usecs))
}

/// Initialize the library with explicit table and stack sizes
pub fn init_with_config(config: Config) -> Result<()> {
    runtime::init(config)
}

/// Create a thread running `entry_point`
///
/// The thread is appended to the tail of the ready queue.
///
/// # Returns
///
/// * `Ok(ThreadId)` - The smallest free thread ID
/// * `Err(Error::CapacityExceeded)` - The thread table is full
pub fn spawn(entry_point: EntryPoint) -> Result<ThreadId> {
    spawn_entry(Some(entry_point))
}

/// Create a thread from an entry point that may be missing
pub(crate) fn spawn_entry(entry_point: Option<EntryPoint>) -> Result<ThreadId> {
    runtime::dispatch(|rt| {
        let tid = rt.spawn(entry_point)?;
        debug!("spawned thread {tid}");
        Ok(Step::Done(tid))
    })
}

/// Terminate a thread
///
/// Terminating thread 0 releases every stack and exits the process with
/// status 0. Terminating the running thread does not return.
pub fn terminate(tid: ThreadId) -> Result<()> {
    runtime::dispatch(|rt| {
        let step = match rt.sched.terminate(tid)? {
            Termination::Process => Step::Exit,
            Termination::Removed => Step::Done(()),
            Termination::Switch(switch) => Step::Switch(switch, ()),
        };
        debug!("terminated thread {tid}");
        Ok(step)
    })
}

/// Block a thread until [`resume`] is called on it
///
/// Blocking an already blocked thread does nothing. A thread blocking
/// itself returns once it has been resumed and scheduled again.
pub fn block(tid: ThreadId) -> Result<()> {
    runtime::dispatch(|rt| {
        let switch = rt.sched.block(tid)?;
        debug!("blocked thread {tid}");
        Ok(match switch {
            Some(switch) => Step::Switch(switch, ()),
            None => Step::Done(()),
        })
    })
}

/// Resume a blocked thread
///
/// Resuming a thread that is not blocked does nothing.
pub fn resume(tid: ThreadId) -> Result<()> {
    runtime::dispatch(|rt| {
        rt.sched.resume(tid)?;
        debug!("resumed thread {tid}");
        Ok(Step::Done(()))
    })
}

/// Put the running thread to sleep for `num_quantums` quanta
///
/// Not allowed on the main thread.
pub fn sleep(num_quantums: u32) -> Result<()> {
    runtime::dispatch(|rt| {
        let switch = rt.sched.sleep(num_quantums)?;
        debug!("thread {} sleeping for {num_quantums} quanta", switch.from);
        Ok(Step::Switch(switch, ()))
    })
}

/// Get the ID of the running thread (0 before `init`)
pub fn current_id() -> ThreadId {
    runtime::query(|sched| sched.current()).unwrap_or(MAIN_THREAD_ID)
}

/// Get the number of quanta started since `init` (0 before `init`)
pub fn total_quanta() -> u64 {
    runtime::query(|sched| sched.total_quanta()).unwrap_or(0)
}

/// Get the number of quanta a thread has run
pub fn quanta(tid: ThreadId) -> Result<u64> {
    runtime::dispatch(|rt| Ok(Step::Done(rt.sched.quanta(tid)?)))
}

/// Get the scheduling state of a thread
pub fn thread_state(tid: ThreadId) -> Result<ThreadState> {
    runtime::dispatch(|rt| Ok(Step::Done(rt.sched.state(tid)?)))
}

/// Run `f` with preemption disabled
///
/// Thread bodies use this around anything that is not reentrant across
/// logical threads, such as printing or allocating.
pub fn without_preemption<R>(f: impl FnOnce() -> R) -> R {
    let _guard = PreemptGuard::enter();
    f()
}
