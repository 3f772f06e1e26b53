// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Architecture-specific code
//!
//! The context primitive is the only part of the crate that manipulates
//! raw machine state. Everything above it treats a [`Context`] as an
//! opaque slot with three operations: setup, switch (capture + restore)
//! and restore.

pub mod context;

pub use context::{Context, ContextEntry};
