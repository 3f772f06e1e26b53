// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Preemption Timer
//!
//! Periodic `ITIMER_VIRTUAL` timer delivering [`PREEMPT_SIGNAL`] once per
//! quantum of consumed CPU time.
//!
//! # Design
//!
//! - **Installed once**: the handler is registered at init and restored
//!   to the previous disposition when the timer is dropped
//! - **Rearmed on dispatch**: every context switch restarts the interval,
//!   so an incoming thread always gets a full quantum
//! - **Signal-safe**: [`PreemptionTimer::arm`] only calls `setitimer`, so it
//!   may run from the handler

use core::mem::MaybeUninit;
use core::ptr;
use std::io;

use crate::error::{Error, InvalidArgument, Result};
use crate::sync::preempt::{preempt_sigset, PREEMPT_SIGNAL};

/// Signal handler signature
pub type SignalHandler = extern "C" fn(libc::c_int);

const USECS_PER_SEC: i64 = 1_000_000;

/// Timer state
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// No handler installed yet
    Idle = 0,
    /// Handler installed, timer stopped
    Installed = 1,
    /// Timer counting down
    Armed = 2,
}

/// Interval timer driving preemption
pub struct PreemptionTimer {
    /// Quantum as an initial value and reload interval
    quantum: libc::itimerval,
    /// Disposition to restore on drop
    previous: Option<libc::sigaction>,
    /// Timer state
    state: TimerState,
}

impl PreemptionTimer {
    /// Create a timer for quanta of `quantum_usecs` microseconds
    ///
    /// # Returns
    ///
    /// * `Ok(PreemptionTimer)` - An idle timer
    /// * `Err(Error::InvalidArgument)` - The quantum is not positive
    pub fn new(quantum_usecs: i64) -> Result<Self> {
        if quantum_usecs <= 0 {
            return Err(InvalidArgument::Quantum(quantum_usecs).into());
        }

        let interval = libc::timeval {
            tv_sec: (quantum_usecs / USECS_PER_SEC) as libc::time_t,
            tv_usec: (quantum_usecs % USECS_PER_SEC) as libc::suseconds_t,
        };

        Ok(Self {
            quantum: libc::itimerval {
                it_interval: interval,
                it_value: interval,
            },
            previous: None,
            state: TimerState::Idle,
        })
    }

    /// Register `handler` for [`PREEMPT_SIGNAL`]
    ///
    /// The signal stays masked while the handler runs.
    pub fn install(&mut self, handler: SignalHandler) -> Result<()> {
        // SAFETY: both sigaction structs are fully initialized before use
        unsafe {
            let mut action = MaybeUninit::<libc::sigaction>::zeroed().assume_init();
            action.sa_sigaction = handler as libc::sighandler_t;
            action.sa_mask = preempt_sigset();
            action.sa_flags = libc::SA_RESTART;

            let mut previous = MaybeUninit::<libc::sigaction>::zeroed().assume_init();
            if libc::sigaction(PREEMPT_SIGNAL, &action, &mut previous) != 0 {
                return Err(Error::TimerInstall(io::Error::last_os_error()));
            }
            if self.previous.is_none() {
                self.previous = Some(previous);
            }
        }

        self.state = TimerState::Installed;
        Ok(())
    }

    /// Start a fresh quantum
    pub fn arm(&mut self) -> Result<()> {
        // SAFETY: `quantum` is a valid itimerval
        let rc = unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, &self.quantum, ptr::null_mut()) };
        if rc != 0 {
            return Err(Error::TimerArm(io::Error::last_os_error()));
        }

        self.state = TimerState::Armed;
        Ok(())
    }

    /// Stop the timer
    pub fn disarm(&mut self) {
        if self.state != TimerState::Armed {
            return;
        }

        // SAFETY: an all-zero itimerval stops the timer
        unsafe {
            let stopped = MaybeUninit::<libc::itimerval>::zeroed().assume_init();
            libc::setitimer(libc::ITIMER_VIRTUAL, &stopped, ptr::null_mut());
        }
        self.state = TimerState::Installed;
    }

    /// Get the timer state
    #[cfg(test)]
    pub(crate) fn state(&self) -> TimerState {
        self.state
    }

    /// Quantum length in microseconds
    #[cfg(test)]
    pub(crate) fn quantum_usecs(&self) -> i64 {
        let interval = self.quantum.it_interval;
        interval.tv_sec as i64 * USECS_PER_SEC + interval.tv_usec as i64
    }
}

impl Drop for PreemptionTimer {
    fn drop(&mut self) {
        self.disarm();
        if let Some(previous) = self.previous.take() {
            // SAFETY: `previous` came from sigaction
            unsafe {
                libc::sigaction(PREEMPT_SIGNAL, &previous, ptr::null_mut());
            }
        }
    }
}
