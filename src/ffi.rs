// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! C ABI
//!
//! `uthread_*` entry points for C callers. Every function returns `-1`
//! on a library error; the reason is logged.
//!
//! ```c
//! int uthread_init(int quantum_usecs);
//! int uthread_spawn(void (*entry_point)(void));
//! int uthread_terminate(int tid);
//! int uthread_block(int tid);
//! int uthread_resume(int tid);
//! int uthread_sleep(int num_quantums);
//! int uthread_get_tid(void);
//! int uthread_get_total_quantums(void);
//! int uthread_get_quantums(int tid);
//! ```

use libc::c_int;
use log::warn;

use crate::api;
use crate::error::{Error, InvalidArgument, Result, STATUS_ERROR};
use crate::sched::{EntryPoint, ThreadId};

/// Collapse a result into a C status
fn status<T>(result: Result<T>, value: impl FnOnce(T) -> c_int) -> c_int {
    match result {
        Ok(v) => value(v),
        Err(err) => err.status(),
    }
}

/// Saturating conversion for counters that outgrow `int`
fn clamp(count: u64) -> c_int {
    c_int::try_from(count).unwrap_or(c_int::MAX)
}

/// Validate a thread ID coming from C
///
/// Negative IDs name no thread.
fn thread_id(tid: c_int) -> Result<ThreadId> {
    ThreadId::try_from(tid).map_err(|_| {
        let err = Error::from(InvalidArgument::NegativeThreadId(i64::from(tid)));
        warn!("{err}");
        err
    })
}

#[no_mangle]
pub extern "C" fn uthread_init(quantum_usecs: c_int) -> c_int {
    status(api::init(i64::from(quantum_usecs)), |()| 0)
}

#[no_mangle]
pub extern "C" fn uthread_spawn(entry_point: Option<EntryPoint>) -> c_int {
    status(api::spawn_entry(entry_point), |tid| tid as c_int)
}

#[no_mangle]
pub extern "C" fn uthread_terminate(tid: c_int) -> c_int {
    status(thread_id(tid).and_then(api::terminate), |()| 0)
}

#[no_mangle]
pub extern "C" fn uthread_block(tid: c_int) -> c_int {
    status(thread_id(tid).and_then(api::block), |()| 0)
}

#[no_mangle]
pub extern "C" fn uthread_resume(tid: c_int) -> c_int {
    status(thread_id(tid).and_then(api::resume), |()| 0)
}

#[no_mangle]
pub extern "C" fn uthread_sleep(num_quantums: c_int) -> c_int {
    let quanta = match u32::try_from(num_quantums) {
        Ok(quanta) => quanta,
        Err(_) => {
            let err = Error::from(InvalidArgument::NegativeSleep(i64::from(num_quantums)));
            warn!("{err}");
            return STATUS_ERROR;
        }
    };
    status(api::sleep(quanta), |()| 0)
}

#[no_mangle]
pub extern "C" fn uthread_get_tid() -> c_int {
    api::current_id() as c_int
}

#[no_mangle]
pub extern "C" fn uthread_get_total_quantums() -> c_int {
    clamp(api::total_quanta())
}

#[no_mangle]
pub extern "C" fn uthread_get_quantums(tid: c_int) -> c_int {
    status(thread_id(tid).and_then(api::quanta), clamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_ids_rejected() {
        assert!(thread_id(-1).is_err());
        assert_eq!(thread_id(5).unwrap(), 5);
        assert_eq!(uthread_block(-3), STATUS_ERROR);
        assert_eq!(uthread_get_quantums(-1), STATUS_ERROR);
    }

    #[test]
    fn test_negative_sleep_rejected() {
        assert_eq!(uthread_sleep(-1), STATUS_ERROR);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(7), 7);
        assert_eq!(clamp(u64::MAX), c_int::MAX);
    }

    #[test]
    fn test_calls_before_init() {
        assert_eq!(uthread_get_tid(), 0);
        assert_eq!(uthread_get_total_quantums(), 0);
        assert_eq!(uthread_spawn(None), STATUS_ERROR);
        assert_eq!(uthread_resume(1), STATUS_ERROR);
    }
}
