//! Shared test utilities for `hookable_plugin` integration tests.
//!
//! Import via `mod test_utils;` in test files.

#![allow(
    dead_code,
    missing_docs,
    reason = "shared test utilities — not all items used in every test binary"
)]

use core::sync::atomic::{AtomicUsize, Ordering};
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

    pub fn joined(&self) -> String {
        self.0.lock().concat()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Collects values seen inside listeners so tests can assert on them after
/// `emit` returns. Listener panics are isolated by the hook, so assertions
/// belong in the test body.
#[derive(Clone)]
pub struct Collector<T>(Arc<Mutex<Vec<T>>>);

impl<T: Clone> Collector<T> {
    pub fn new() -> Self {
        Self(Arc::default())
    }

    pub fn push(&self, item: T) {
        self.0.lock().push(item);
    }

    pub fn entries(&self) -> Vec<T> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Shared invocation counter.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
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
// VALUES
// ═══════════════════════════════════════════════════════════════════════════════

/// Builds positional arguments from anything convertible to `Value`.
pub fn args<const N: usize, T: Into<Value>>(values: [T; N]) -> Args {
    values.into_iter().map(Into::into).collect()
}

/// Converts a JSON literal into a fresh `Value`.
pub fn value(json: serde_json::Value) -> Value {
    Value::from(json)
}
