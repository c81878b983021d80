//! Listener results: immediate or deferred.
//!
//! Async-capable hooks accept listeners that either finish on the spot or
//! hand back a future. [`Step`] captures both, so a listener that has
//! nothing to await does not pay for a boxed future, and the parallel
//! strategy can dispatch every listener before awaiting any of them.
//!
//! Series and waterfall hooks additionally let a listener stop the chain by
//! returning [`Flow::Halt`].

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use std::panic::{AssertUnwindSafe, catch_unwind};

use futures::FutureExt;

use crate::error::ListenerError;
use crate::value::Value;

/// A boxed future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The outcome of one listener invocation.
pub type ListenerResult<T = ()> = Result<T, ListenerError>;

// ─────────────────────────────────────────────────────────────────────────────
// Flow
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a series or waterfall chain keeps going.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Continue with the given value.
    Continue(Value),
    /// Stop; remaining listeners are skipped.
    Halt,
}

impl Flow {
    /// Returns `true` for [`Flow::Halt`].
    #[must_use]
    pub fn is_halt(&self) -> bool {
        matches!(self, Self::Halt)
    }

    /// Returns the carried value, or `None` if the chain halted.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Continue(value) => Some(value),
            Self::Halt => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Step
// ─────────────────────────────────────────────────────────────────────────────

/// A listener's answer: already settled, or a future to await.
pub enum Step<T> {
    /// Settled during the call.
    Ready(ListenerResult<T>),
    /// Settles when the future completes.
    Deferred(BoxFuture<'static, ListenerResult<T>>),
}

impl<T> Step<T> {
    /// A successful, immediate result.
    #[must_use]
    pub fn ready(value: T) -> Self {
        Self::Ready(Ok(value))
    }

    /// An immediate failure.
    #[must_use]
    pub fn fail(error: impl Into<ListenerError>) -> Self {
        Self::Ready(Err(error.into()))
    }

    /// Defers to a future.
    #[must_use]
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = ListenerResult<T>> + Send + 'static,
    {
        Self::Deferred(Box::pin(future))
    }

    /// Returns `true` if this step still has to be awaited.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Awaits the step. A panic inside a deferred future settles as
    /// [`ListenerError::Panicked`].
    pub(crate) async fn settle(self) -> ListenerResult<T> {
        match self {
            Self::Ready(result) => result,
            Self::Deferred(future) => AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(ListenerError::from_panic(payload))),
        }
    }
}

impl Step<Flow> {
    /// Continue without contributing a value.
    #[must_use]
    pub fn proceed() -> Self {
        Self::ready(Flow::Continue(Value::Null))
    }

    /// Continue with a value.
    #[must_use]
    pub fn carry(value: impl Into<Value>) -> Self {
        Self::ready(Flow::Continue(value.into()))
    }

    /// Stop the chain.
    #[must_use]
    pub fn halt() -> Self {
        Self::ready(Flow::Halt)
    }
}

impl<T> From<ListenerResult<T>> for Step<T> {
    fn from(result: ListenerResult<T>) -> Self {
        Self::Ready(result)
    }
}

impl<T: fmt::Debug> fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// IntoListenerResult
// ─────────────────────────────────────────────────────────────────────────────

/// Return types accepted from synchronous listeners.
///
/// Lets plain closures return `()` while fallible ones return
/// [`ListenerResult`].
pub trait IntoListenerResult {
    /// Normalizes into a [`ListenerResult`].
    fn into_listener_result(self) -> ListenerResult;
}

impl IntoListenerResult for () {
    fn into_listener_result(self) -> ListenerResult {
        Ok(())
    }
}

impl IntoListenerResult for ListenerResult {
    fn into_listener_result(self) -> ListenerResult {
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Panic isolation
// ─────────────────────────────────────────────────────────────────────────────

/// Runs a synchronous listener, converting a panic into a failure.
pub(crate) fn guarded<T>(call: impl FnOnce() -> ListenerResult<T>) -> ListenerResult<T> {
    catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|payload| Err(ListenerError::from_panic(payload)))
}

/// Calls an async-capable listener, converting a panic during the call
/// itself into a settled failure.
pub(crate) fn guarded_step<T>(call: impl FnOnce() -> Step<T>) -> Step<T> {
    catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|payload| Step::Ready(Err(ListenerError::from_panic(payload))))
}
