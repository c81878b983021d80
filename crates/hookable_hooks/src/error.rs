//! Error types for hooks and listeners.

use core::any::Any;
use core::error::Error;

/// Errors returned by hook operations.
///
/// Listener failures are never surfaced here. They are isolated and reported
/// on the hook's error channel instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    /// The registry is locked; listeners cannot be added or removed.
    #[error("hook '{hook}' is locked")]
    Locked {
        /// Name of the locked hook.
        hook: String,
    },
    /// A waterfall hook was emitted with a payload that is not an object.
    #[error("'{hook}' hook response data must be an object")]
    InvalidPayload {
        /// Name of the hook.
        hook: String,
    },
    /// A waterfall listener returned a value that drops keys of its input.
    #[error("the return value of hook '{hook}' is incorrect")]
    MalformedReturn {
        /// Name of the hook.
        hook: String,
    },
}

/// A failure raised by a single listener invocation.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The listener reported a failure.
    #[error("{0}")]
    Failed(String),
    /// The listener panicked.
    #[error("listener panicked: {0}")]
    Panicked(String),
    /// The listener failed with an underlying error.
    #[error("{0}")]
    Source(Box<dyn Error + Send + Sync>),
}

impl ListenerError {
    /// Creates a [`ListenerError::Failed`] from a message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Wraps any error as a [`ListenerError::Source`].
    #[must_use]
    pub fn source(error: impl Error + Send + Sync + 'static) -> Self {
        Self::Source(Box::new(error))
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Self::Panicked(message)
    }
}

impl From<Box<dyn Error + Send + Sync>> for ListenerError {
    fn from(error: Box<dyn Error + Send + Sync>) -> Self {
        Self::Source(error)
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self::Failed(message)
    }
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self::Failed(message.to_owned())
    }
}
