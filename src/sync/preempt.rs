// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Preemption Guard
//!
//! RAII critical section: masks [`PREEMPT_SIGNAL`] on creation and puts
//! the previous mask back on drop. Guards nest, and a guard created
//! inside the signal handler (where the kernel already masks the signal)
//! leaves it masked until the handler returns.

use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr;

/// Signal raised by the preemption timer
pub const PREEMPT_SIGNAL: libc::c_int = libc::SIGVTALRM;

/// Signal set holding only [`PREEMPT_SIGNAL`]
pub(crate) fn preempt_sigset() -> libc::sigset_t {
    // SAFETY: sigemptyset initializes the whole set before sigaddset reads it
    unsafe {
        let mut set = MaybeUninit::<libc::sigset_t>::zeroed().assume_init();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, PREEMPT_SIGNAL);
        set
    }
}

/// Critical section with preemption disabled
///
/// The guard must be dropped on the logical thread that created it. It
/// is neither `Send` nor `Sync`.
pub struct PreemptGuard {
    previous: libc::sigset_t,
    _not_send: PhantomData<*const ()>,
}

impl PreemptGuard {
    /// Disable preemption until the guard is dropped
    pub fn enter() -> Self {
        let set = preempt_sigset();
        // SAFETY: both sets are valid; `previous` is fully written by the call
        let previous = unsafe {
            let mut previous = MaybeUninit::<libc::sigset_t>::zeroed().assume_init();
            let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &set, &mut previous);
            debug_assert_eq!(rc, 0, "pthread_sigmask(SIG_BLOCK) failed");
            previous
        };

        Self {
            previous,
            _not_send: PhantomData,
        }
    }

    /// Check if the preemption signal is currently masked
    pub fn is_active() -> bool {
        // SAFETY: a null `set` only queries the current mask
        unsafe {
            let mut current = MaybeUninit::<libc::sigset_t>::zeroed().assume_init();
            libc::pthread_sigmask(libc::SIG_BLOCK, ptr::null(), &mut current);
            libc::sigismember(&current, PREEMPT_SIGNAL) == 1
        }
    }
}

impl Drop for PreemptGuard {
    fn drop(&mut self) {
        // SAFETY: `previous` was produced by pthread_sigmask
        let rc = unsafe { libc::pthread_sigmask(libc::SIG_SETMASK, &self.previous, ptr::null_mut()) };
        debug_assert_eq!(rc, 0, "pthread_sigmask(SIG_SETMASK) failed");
    }
}

// ============================================================================
// Tests
// ============================================================================
