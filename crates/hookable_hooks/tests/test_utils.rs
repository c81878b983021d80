//! Shared test utilities for `hookable_hooks` integration tests.
//!
//! Import via `mod test_utils;` in test files.

#![allow(
    dead_code,
    missing_docs,
    reason = "shared test utilities — not all items used in every test binary"
)]

use std::sync::Arc;

use hookable_hooks::clock::{Clock, MockClock};
use hookable_hooks::{Args, Value};
use parking_lot::Mutex;

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDING
// ═══════════════════════════════════════════════════════════════════════════════

/// Append-only log shared between listeners and the test body.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLOCK
// ═══════════════════════════════════════════════════════════════════════════════

/// Returns a mock clock and a `Clock` backed by it.
pub fn mock_clock() -> (Arc<MockClock>, Clock) {
    let mock = Arc::new(MockClock::new());
    let clock = Clock::with_provider(mock.clone());
    (mock, clock)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ARGUMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds positional arguments from anything convertible to `Value`.
pub fn args<const N: usize, T: Into<Value>>(values: [T; N]) -> Args {
    values.into_iter().map(Into::into).collect()
}
