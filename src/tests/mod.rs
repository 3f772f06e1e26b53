// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Scheduler Property Tests
//!
//! These tests drive the scheduler state machine with random operation
//! sequences and check that its invariants hold after every step.
