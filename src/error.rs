// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Error Types
//!
//! Errors come in two tiers:
//!
//! - **Library errors** ([`Error::InvalidArgument`],
//!   [`Error::CapacityExceeded`]) are returned to the caller. The failed
//!   operation has not changed any scheduler state.
//! - **Fatal errors** (timer, stack or context setup failures) cannot be
//!   recovered from. The runtime releases every stack it owns and exits
//!   the process with status 1.

use std::io;

use thiserror::Error;

use crate::sched::ThreadId;

/// Status returned by the C surface for every library error
pub const STATUS_ERROR: i32 = -1;

/// Reason an argument was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidArgument {
    #[error("quantum_usecs must be a positive integer, got {0}")]
    Quantum(i64),

    #[error("the thread table must have room for more than the main thread, got {0}")]
    MaxThreads(usize),

    #[error("stack size of {0} bytes is too small")]
    StackSize(usize),

    #[error("entry_point can not be null")]
    NullEntryPoint,

    #[error("thread with id {0} does not exist")]
    UnknownThread(ThreadId),

    #[error("thread with id {0} does not exist")]
    NegativeThreadId(i64),

    #[error("the main thread can not be blocked")]
    BlockMainThread,

    #[error("the main thread can't be put to sleep state")]
    SleepMainThread,

    #[error("number of quanta to sleep must not be negative, got {0}")]
    NegativeSleep(i64),

    #[error("the library is already initialized")]
    AlreadyInitialized,

    #[error("the library is not initialized")]
    NotInitialized,
}

/// uthreads error
#[derive(Debug, Error)]
pub enum Error {
    #[error("thread library error: {0}")]
    InvalidArgument(#[from] InvalidArgument),

    #[error("thread library error: you have reached the maximal number of threads ({max})")]
    CapacityExceeded { max: usize },

    #[error("system error: failed to install the preemption signal handler")]
    TimerInstall(#[source] io::Error),

    #[error("system error: failed to arm the preemption timer")]
    TimerArm(#[source] io::Error),

    #[error("system error: failed to allocate a {size} byte stack")]
    StackAllocation { size: usize },

    #[error("system error: failed to prepare a thread context")]
    ContextSetup(#[source] io::Error),
}

impl Error {
    /// Check if the error must end the process
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TimerInstall(_)
                | Self::TimerArm(_)
                | Self::StackAllocation { .. }
                | Self::ContextSetup(_)
        )
    }

    /// Integer status for the C surface
    pub const fn status(&self) -> i32 {
        STATUS_ERROR
    }
}

/// uthreads result type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_tiers() {
        assert!(!Error::from(InvalidArgument::NullEntryPoint).is_fatal());
        assert!(!Error::CapacityExceeded { max: 4 }.is_fatal());
        assert!(Error::StackAllocation { size: 4096 }.is_fatal());
        assert!(Error::TimerArm(io::Error::from_raw_os_error(libc::EINVAL)).is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::from(InvalidArgument::UnknownThread(7));
        assert_eq!(err.to_string(), "thread library error: thread with id 7 does not exist");

        let err = Error::TimerInstall(io::Error::from_raw_os_error(libc::EINVAL));
        assert!(err.to_string().starts_with("system error:"));
        assert_eq!(err.status(), STATUS_ERROR);
    }
}
