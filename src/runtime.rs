// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Global Runtime
//!
//! The single scheduler instance of the process, the per-slot saved
//! contexts and the preemption timer, plus the switch routine shared by
//! the signal handler and the voluntary paths.
//!
//! # Locking
//!
//! ```text
//! PreemptGuard::enter()        mask SIGVTALRM
//!   RUNTIME.lock()             spin lock, never contended
//!     mutate scheduler
//!   drop lock                  before any context switch
//!   swapcontext / setcontext
//! drop guard                   previous mask restored
//! ```
//!
//! The lock is never taken without the guard, so the handler can never
//! find it held.

use std::process;

use log::{debug, error, info, warn};
use spin::{Mutex, MutexGuard};

use crate::arch::{context, Context};
use crate::config::Config;
use crate::error::{Error, InvalidArgument, Result};
use crate::sched::{EntryPoint, Scheduler, Stack, Switch, SwitchReason, ThreadId};
use crate::sync::PreemptGuard;
use crate::timer::PreemptionTimer;

/// ============================================================================
/// Global Runtime Instance
/// ============================================================================

/// Global runtime, `None` until `init`
static RUNTIME: Mutex<Option<Runtime>> = Mutex::new(None);

type RuntimeLock = MutexGuard<'static, Option<Runtime>>;

/// Scheduler plus everything needed to act on its decisions
pub(crate) struct Runtime {
    /// Scheduler state machine
    pub(crate) sched: Scheduler,
    /// Saved context of every thread slot, indexed by thread ID
    contexts: Box<[Context]>,
    /// Preemption timer
    timer: PreemptionTimer,
    /// Stack of a thread that terminated itself, freed once off it
    retired: Option<Stack>,
}

impl Runtime {
    fn new(config: &Config) -> Result<Self> {
        let sched = Scheduler::new(config)?;
        let timer = PreemptionTimer::new(config.quantum_usecs)?;
        let contexts = (0..config.max_threads).map(|_| Context::empty()).collect();

        Ok(Self {
            sched,
            contexts,
            timer,
            retired: None,
        })
    }

    /// Spawn a thread and build its first context
    pub(crate) fn spawn(&mut self, entry_point: Option<EntryPoint>) -> Result<ThreadId> {
        let tid = self.sched.spawn(entry_point)?;
        if let Some(stack) = self.sched.thread_mut(tid)?.stack_mut() {
            self.contexts[tid].setup(stack, thread_start)?;
        }
        Ok(tid)
    }
}

/// What the caller of [`dispatch`] must do after the scheduler ran
pub(crate) enum Step<R> {
    /// Nothing further; return the value
    Done(R),
    /// Switch contexts, then return the value once resumed
    Switch(Switch, R),
    /// Tear down and exit the process with status 0
    Exit,
}

/// How the thread leaving the CPU gets back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    /// Resumed inside a public entry point; free retired stacks there
    Voluntary,
    /// Resumed inside the signal handler; must not touch the allocator
    Handler,
}

/// ============================================================================
/// Lifecycle
/// ============================================================================

/// Create the runtime, install the handler and start the first quantum
pub(crate) fn init(config: Config) -> Result<()> {
    let _guard = PreemptGuard::enter();
    let mut lock = RUNTIME.lock();

    if lock.is_some() {
        return Err(report(InvalidArgument::AlreadyInitialized.into()));
    }

    let mut runtime = Runtime::new(&config).map_err(report)?;
    if let Err(err) = runtime.timer.install(on_quantum_expired) {
        *lock = Some(runtime);
        fatal(lock, err);
    }

    *lock = Some(runtime);
    let armed = lock.as_mut().map_or(Ok(()), |rt| rt.timer.arm());
    if let Err(err) = armed {
        fatal(lock, err);
    }

    info!(
        "uthreads initialized: quantum {}us, {} thread slots, {} byte stacks",
        config.quantum_usecs, config.max_threads, config.stack_size
    );
    Ok(())
}

/// Release owned stacks and exit
fn exit_process(mut lock: RuntimeLock, code: i32) -> ! {
    if let Some(rt) = lock.as_mut() {
        rt.timer.disarm();
        rt.sched.release_stacks();
        rt.retired = None;
    }
    process::exit(code)
}

/// Log an environment error, release owned stacks and exit with status 1
fn fatal(lock: RuntimeLock, err: Error) -> ! {
    error!("{err}");
    exit_process(lock, 1)
}

/// Fatal error inside the signal handler
///
/// Logging and `exit` are not async-signal-safe, so only a fixed message
/// is written before `_exit`. The OS reclaims the stacks.
fn fatal_in_handler(err: &Error) -> ! {
    let msg = handler_message(err);
    // SAFETY: write(2) and _exit(2) are async-signal-safe
    unsafe {
        libc::write(libc::STDERR_FILENO, msg.as_ptr().cast(), msg.len());
        libc::_exit(1)
    }
}

/// Fixed text for a fatal error raised inside the signal handler
fn handler_message(err: &Error) -> &'static [u8] {
    match err {
        Error::TimerArm(_) => b"system error: failed to arm the preemption timer\n",
        Error::ContextSetup(_) => b"system error: failed to prepare a thread context\n",
        _ => b"system error: preemption failed\n",
    }
}

/// End the process from the switch routine
fn fatal_on(resume: Resume, lock: RuntimeLock, err: Error) -> ! {
    match resume {
        Resume::Voluntary => fatal(lock, err),
        Resume::Handler => fatal_in_handler(&err),
    }
}

/// Log a library error on its way back to the caller
fn report(err: Error) -> Error {
    warn!("{err}");
    err
}

/// ============================================================================
/// Entry Points
/// ============================================================================

/// Run a scheduler operation inside a critical section and act on it
///
/// Library errors are logged and returned with no state changed; fatal
/// errors end the process.
pub(crate) fn dispatch<R>(op: impl FnOnce(&mut Runtime) -> Result<Step<R>>) -> Result<R> {
    let _guard = PreemptGuard::enter();
    let mut lock = RUNTIME.lock();

    let step = match lock.as_mut() {
        Some(rt) => op(rt),
        None => Err(InvalidArgument::NotInitialized.into()),
    };

    match step {
        Ok(Step::Done(value)) => Ok(value),
        Ok(Step::Switch(switch, value)) => {
            // SAFETY: the guard is held and the lock is handed over
            unsafe { transfer(lock, switch, Resume::Voluntary) };
            Ok(value)
        }
        Ok(Step::Exit) => {
            info!("main thread terminated, exiting");
            exit_process(lock, 0)
        }
        Err(err) if err.is_fatal() => fatal(lock, err),
        Err(err) => Err(report(err)),
    }
}

/// Read scheduler state inside a critical section
///
/// # Returns
///
/// `None` before `init`
pub(crate) fn query<R>(read: impl FnOnce(&Scheduler) -> R) -> Option<R> {
    let _guard = PreemptGuard::enter();
    let lock = RUNTIME.lock();
    lock.as_ref().map(|rt| read(&rt.sched))
}

/// ============================================================================
/// Switch Routine
/// ============================================================================

/// Rearm the timer and move the CPU from `switch.from` to `switch.to`
///
/// Returns once `switch.from` is scheduled again, or never if it
/// terminated itself.
///
/// # Safety
///
/// Must be called with a [`PreemptGuard`] held (or from the signal
/// handler). `lock` is released before the context switch.
unsafe fn transfer(mut lock: RuntimeLock, switch: Switch, resume: Resume) {
    let Some(rt) = lock.as_mut() else { return };

    if let Err(err) = rt.timer.arm() {
        fatal_on(resume, lock, err);
    }
    if switch.is_noop() {
        return;
    }

    let to = rt.contexts[switch.to].as_ptr();

    if let Some(stack) = switch.retired {
        // The dying thread is still on this stack until setcontext returns
        // into `to`; any older retired stack is unused and can go.
        rt.retired = Some(stack);
        drop(lock);
        context::restore(to);
    }

    let from = rt.contexts[switch.from].as_mut_ptr();
    drop(lock);

    if let Err(err) = context::switch(from, to) {
        fatal_on(resume, RUNTIME.lock(), Error::ContextSetup(err));
    }

    if resume == Resume::Voluntary {
        reclaim_retired();
    }
}

/// Free the stack of a thread that terminated itself
fn reclaim_retired() {
    let retired = RUNTIME.lock().as_mut().and_then(|rt| rt.retired.take());
    drop(retired);
}

/// Timer handler: preempt the running thread
extern "C" fn on_quantum_expired(_signum: libc::c_int) {
    let _guard = PreemptGuard::enter();
    let mut lock = RUNTIME.lock();

    let switch = match lock.as_mut() {
        Some(rt) => rt.sched.tick(SwitchReason::Preempted),
        None => return,
    };

    // SAFETY: the signal is masked for the whole handler
    unsafe { transfer(lock, switch, Resume::Handler) };
}

/// First function of every spawned thread
///
/// Runs the thread's entry point, then terminates the thread if the
/// entry point returns.
extern "C" fn thread_start() {
    reclaim_retired_guarded();

    let entry = query(|sched| {
        sched
            .thread(sched.current())
            .ok()
            .and_then(|thread| thread.entry_point())
    })
    .flatten();

    if let Some(entry) = entry {
        entry();
    }

    let tid = crate::api::current_id();
    let _guard = PreemptGuard::enter();
    debug!("thread {tid} returned from its entry point");
    if let Err(err) = crate::api::terminate(tid) {
        error!("thread {tid} could not terminate: {err}");
    }
    process::abort()
}

fn reclaim_retired_guarded() {
    let _guard = PreemptGuard::enter();
    reclaim_retired();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn os_error() -> io::Error {
        io::Error::from_raw_os_error(libc::EINVAL)
    }

    #[test]
    fn test_handler_message_matches_error_text() {
        for err in [Error::TimerArm(os_error()), Error::ContextSetup(os_error())] {
            let msg = core::str::from_utf8(handler_message(&err)).unwrap();
            assert_eq!(msg, format!("{err}\n"));
        }
    }

    #[test]
    fn test_handler_message_fallback() {
        let msg = handler_message(&Error::StackAllocation { size: 4096 });
        assert!(msg.starts_with(b"system error:"));
        assert!(msg.ends_with(b"\n"));
    }
}
