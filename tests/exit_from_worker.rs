// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Process Exit From a Worker
//!
//! A spawned thread terminates thread 0 while another worker is still
//! live. The process must exit with status 0 from inside that call; any
//! other outcome fails this binary.

use std::process;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use uthreads::{ThreadState, MAIN_THREAD_ID};

const QUANTUM_USECS: i64 = 2_000;
const DEADLINE: Duration = Duration::from_secs(20);

static SPINS: AtomicU64 = AtomicU64::new(0);
static SPINNER: AtomicUsize = AtomicUsize::new(0);

extern "C" fn spinner() {
    loop {
        SPINS.fetch_add(1, Ordering::Relaxed);
    }
}

extern "C" fn killer() {
    // Wait until the spinner has run so it is provably live
    while SPINS.load(Ordering::Relaxed) == 0 {
        std::hint::spin_loop();
    }

    let spinner = SPINNER.load(Ordering::Relaxed);
    if !matches!(uthreads::thread_state(spinner), Ok(ThreadState::Ready)) {
        process::abort();
    }

    let _ = uthreads::terminate(MAIN_THREAD_ID);
    // Reached only if the process survived terminate(0)
    process::abort();
}

fn main() {
    let _ = env_logger::builder().is_test(true).try_init();

    uthreads::init(QUANTUM_USECS).unwrap();
    let spinner_id = uthreads::spawn(spinner).unwrap();
    SPINNER.store(spinner_id, Ordering::Relaxed);
    let killer_id = uthreads::spawn(killer).unwrap();
    assert_eq!((spinner_id, killer_id), (1, 2));

    let start = Instant::now();
    while start.elapsed() < DEADLINE {
        std::hint::spin_loop();
    }

    uthreads::without_preemption(|| eprintln!("exit_from_worker: process outlived terminate(0)"));
    process::exit(1);
}
