// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Execution Context
//!
//! Saved machine state of a logical thread, built on the glibc
//! `ucontext` API. A saved context holds the callee-visible registers,
//! the stack and instruction pointers, the FPU environment and the
//! signal mask, so a thread switched out inside a masked critical
//! section comes back with the same mask.
//!
//! `makecontext` writes the stack and instruction pointers itself. Unlike
//! a `jmp_buf`, a `ucontext_t` keeps them unmangled, so no pointer-guard
//! transform is applied when synthesizing a first context.

use core::mem::MaybeUninit;
use core::ptr;
use std::io;

use crate::error::{Error, Result};
use crate::sched::Stack;

/// First function a new context executes
pub type ContextEntry = extern "C" fn();

/// Saved execution context of one thread slot
#[repr(transparent)]
pub struct Context {
    uc: libc::ucontext_t,
}

// A context only holds addresses into stacks owned by the thread table.
// It is never touched outside the preemption guard.
unsafe impl Send for Context {}

impl Context {
    /// Create an empty context slot
    ///
    /// An empty slot must not be restored; it is filled either by
    /// [`Context::setup`] or by being the saving side of a switch.
    pub fn empty() -> Self {
        // SAFETY: ucontext_t is plain data; all-zero is a valid bit pattern.
        let uc = unsafe { MaybeUninit::<libc::ucontext_t>::zeroed().assume_init() };
        Self { uc }
    }

    /// Synthesize the first context of a thread
    ///
    /// The context starts executing `entry` at the top of `stack` with an
    /// empty signal mask. `entry` must never return: the context has no
    /// successor.
    ///
    /// # Arguments
    ///
    /// * `stack` - Stack the thread runs on; must outlive the context
    /// * `entry` - Function the first restore jumps to
    pub fn setup(&mut self, stack: &mut Stack, entry: ContextEntry) -> Result<()> {
        // SAFETY: self.uc is a valid ucontext_t; getcontext only fills it
        // in and is never resumed at this point.
        unsafe {
            if libc::getcontext(&mut self.uc) != 0 {
                return Err(Error::ContextSetup(io::Error::last_os_error()));
            }

            self.uc.uc_stack.ss_sp = stack.base_mut().cast();
            self.uc.uc_stack.ss_size = stack.len();
            self.uc.uc_stack.ss_flags = 0;
            self.uc.uc_link = ptr::null_mut();
            libc::sigemptyset(&mut self.uc.uc_sigmask);

            libc::makecontext(&mut self.uc, entry, 0);
        }
        Ok(())
    }

    /// Raw pointer for the saving side of a switch
    pub fn as_mut_ptr(&mut self) -> *mut libc::ucontext_t {
        &mut self.uc
    }

    /// Raw pointer for the restoring side of a switch
    pub fn as_ptr(&self) -> *const libc::ucontext_t {
        &self.uc
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::empty()
    }
}

/// Capture the running context into `from` and restore `to`
///
/// Returns once some other thread restores `from`.
///
/// # Safety
///
/// - `from` must point to a context slot that stays valid until restored
/// - `to` must have been filled by [`Context::setup`] or by an earlier
///   switch, and its stack must still be alive
/// - No lock may be held across the call
pub unsafe fn switch(from: *mut libc::ucontext_t, to: *const libc::ucontext_t) -> io::Result<()> {
    if libc::swapcontext(from, to) != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Restore `to` without saving the running context
///
/// Used by a thread that terminated itself and has nothing to come back to.
///
/// # Safety
///
/// Same requirements on `to` as [`switch`].
pub unsafe fn restore(to: *const libc::ucontext_t) -> ! {
    libc::setcontext(to);
    // setcontext only returns if `to` is malformed
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    extern "C" fn never_run() {}

    #[test]
    fn test_setup_installs_stack() {
        let mut stack = Stack::allocate(crate::config::MIN_STACK_SIZE).unwrap();
        let base = stack.base_mut();
        let mut ctx = Context::empty();
        ctx.setup(&mut stack, never_run).unwrap();

        assert_eq!(ctx.uc.uc_stack.ss_sp, base.cast());
        assert_eq!(ctx.uc.uc_stack.ss_size, crate::config::MIN_STACK_SIZE);
        assert!(ctx.uc.uc_link.is_null());
        // SAFETY: the mask was initialized by sigemptyset
        let blocked = unsafe { libc::sigismember(&ctx.uc.uc_sigmask, libc::SIGVTALRM) };
        assert_eq!(blocked, 0);
    }

    static mut PING: Option<Context> = None;
    static mut PONG: Option<Context> = None;
    static HITS: AtomicU32 = AtomicU32::new(0);

    extern "C" fn pong() {
        // SAFETY: single-threaded ping-pong between two contexts of this test
        unsafe {
            HITS.fetch_add(1, Ordering::SeqCst);
            let ping = (*ptr::addr_of_mut!(PING)).as_mut().unwrap().as_ptr();
            let pong = (*ptr::addr_of_mut!(PONG)).as_mut().unwrap().as_mut_ptr();
            switch(pong, ping).unwrap();
            HITS.fetch_add(1, Ordering::SeqCst);
            restore(ping);
        }
    }

    #[test]
    fn test_switch_round_trip() {
        let mut stack = Stack::allocate(crate::config::MIN_STACK_SIZE).unwrap();

        // SAFETY: both contexts live in statics for the whole test and the
        // stack outlives every switch into `pong`.
        unsafe {
            PING = Some(Context::empty());
            PONG = Some(Context::empty());
            (*ptr::addr_of_mut!(PONG)).as_mut().unwrap().setup(&mut stack, pong).unwrap();

            let ping = (*ptr::addr_of_mut!(PING)).as_mut().unwrap().as_mut_ptr();
            let pong = (*ptr::addr_of_mut!(PONG)).as_mut().unwrap().as_ptr();
            switch(ping, pong).unwrap();
            assert_eq!(HITS.load(Ordering::SeqCst), 1);

            let ping = (*ptr::addr_of_mut!(PING)).as_mut().unwrap().as_mut_ptr();
            let pong = (*ptr::addr_of_mut!(PONG)).as_mut().unwrap().as_ptr();
            switch(ping, pong).unwrap();
            assert_eq!(HITS.load(Ordering::SeqCst), 2);
        }
    }
}
