//! Per-hook error channel.
//!
//! When a listener fails, the hook keeps going and publishes an
//! [`ExecErrorEvent`] here instead. With no subscribers the failure is logged
//! at `warn` so it is never silently lost.

use core::fmt;
use std::sync::{Arc, Weak};

use crate::error::ListenerError;
use crate::meta::HookKind;
use crate::registry::{ListenerId, Registry};
use crate::step::guarded;

/// Callback type for error channel subscribers.
pub type ErrorFn = dyn Fn(&ExecErrorEvent) + Send + Sync;

/// A listener failure observed on a hook.
#[derive(Debug, Clone)]
pub struct ExecErrorEvent {
    /// Name of the hook the listener belongs to.
    pub name: Arc<str>,
    /// Strategy of the hook.
    pub kind: HookKind,
    /// Tag of the failing listener, if it had one.
    pub tag: Option<Arc<str>>,
    /// Identity of the failing listener.
    pub listener: ListenerId,
    /// What went wrong.
    pub error: Arc<ListenerError>,
}

pub(crate) struct ErrorChannel {
    observers: Arc<Registry<ErrorFn>>,
}

impl ErrorChannel {
    pub(crate) fn new() -> Self {
        Self {
            observers: Arc::new(Registry::new()),
        }
    }

    pub(crate) fn subscribe(&self, observer: Arc<ErrorFn>) -> Unsubscribe {
        let id = self.observers.insert(None, observer, false);
        Unsubscribe {
            registry: Arc::downgrade(&self.observers),
            id,
        }
    }

    pub(crate) fn report(&self, event: ExecErrorEvent) {
        let observers = self.observers.snapshot();
        if observers.is_empty() {
            tracing::warn!(
                hook = %event.name,
                kind = %event.kind,
                tag = event.tag.as_deref(),
                listener = %event.listener,
                error = %event.error,
                "listener failed"
            );
            return;
        }

        tracing::debug!(
            hook = %event.name,
            listener = %event.listener,
            error = %event.error,
            "listener failed; notifying error observers"
        );
        for observer in &observers {
            let outcome = guarded(|| {
                (observer.callback)(&event);
                Ok(())
            });
            if let Err(err) = outcome {
                tracing::warn!(hook = %event.name, error = %err, "error observer failed");
            }
        }
    }
}

/// Handle returned by error-channel subscription.
///
/// Dropping the handle keeps the subscription; call
/// [`unsubscribe`](Unsubscribe::unsubscribe) to end it.
pub struct Unsubscribe {
    registry: Weak<Registry<ErrorFn>>,
    id: ListenerId,
}

impl Unsubscribe {
    /// Returns the subscription's identifier.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Ends the subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.id))
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe").field("id", &self.id).finish()
    }
}
