//! State and bookkeeping shared by all hook strategies.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::channel::{ErrorChannel, ErrorFn, ExecErrorEvent, Unsubscribe};
use crate::clock::Clock;
use crate::error::{HookError, ListenerError};
use crate::meta::HookKind;
use crate::registry::{Entry, ListenerId, Registry};
use crate::value::Value;

pub(crate) struct HookCore<F: ?Sized, M> {
    pub(crate) kind: HookKind,
    name: RwLock<Arc<str>>,
    pub(crate) context: Value,
    clock: RwLock<Clock>,
    locked: AtomicBool,
    pub(crate) registry: Registry<F>,
    errors: ErrorChannel,
    pub(crate) meta: M,
}

impl<F: ?Sized, M> HookCore<F, M> {
    pub(crate) fn new(kind: HookKind, context: Value, meta: M) -> Self {
        Self {
            kind,
            name: RwLock::new(Arc::from(kind.as_str())),
            context,
            clock: RwLock::new(Clock::default()),
            locked: AtomicBool::new(false),
            registry: Registry::new(),
            errors: ErrorChannel::new(),
            meta,
        }
    }

    /// A new, empty, unlocked core with the same kind, name, context and clock.
    pub(crate) fn fork(&self, meta: M) -> Self {
        let fork = Self::new(self.kind, self.context.clone(), meta);
        *fork.name.write() = self.name();
        *fork.clock.write() = self.clock();
        fork
    }

    pub(crate) fn name(&self) -> Arc<str> {
        Arc::clone(&self.name.read())
    }

    pub(crate) fn set_name(&self, name: &str) {
        *self.name.write() = Arc::from(name);
    }

    pub(crate) fn clock(&self) -> Clock {
        self.clock.read().clone()
    }

    pub(crate) fn set_clock(&self, clock: Clock) {
        *self.clock.write() = clock;
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub(crate) fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::Release);
    }

    fn ensure_unlocked(&self) -> Result<(), HookError> {
        if self.is_locked() {
            return Err(HookError::Locked {
                hook: self.name().to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn register(
        &self,
        tag: Option<&str>,
        callback: Arc<F>,
        once: bool,
    ) -> Result<ListenerId, HookError> {
        self.ensure_unlocked()?;
        let id = self.registry.insert(tag.map(Arc::from), callback, once);
        tracing::trace!(hook = %self.name(), listener = %id, tag, once, "listener registered");
        Ok(id)
    }

    pub(crate) fn remove(&self, id: ListenerId) -> Result<bool, HookError> {
        self.ensure_unlocked()?;
        Ok(self.registry.remove(id))
    }

    pub(crate) fn remove_tagged(&self, tag: &str) -> Result<usize, HookError> {
        self.ensure_unlocked()?;
        Ok(self.registry.remove_tagged(tag))
    }

    pub(crate) fn remove_all(&self) -> Result<(), HookError> {
        self.ensure_unlocked()?;
        self.registry.clear();
        Ok(())
    }

    pub(crate) fn listen_error(&self, observer: Arc<ErrorFn>) -> Result<Unsubscribe, HookError> {
        self.ensure_unlocked()?;
        Ok(self.errors.subscribe(observer))
    }

    /// Claims an entry for this emission, dropping once-listeners from the
    /// registry as they are claimed. Removal here ignores the lock.
    pub(crate) fn claim(&self, entry: &Entry<F>) -> bool {
        if !entry.claim() {
            return false;
        }
        if entry.is_once() {
            self.registry.remove(entry.id);
        }
        true
    }

    pub(crate) fn report(&self, entry: &Entry<F>, error: ListenerError) {
        self.errors.report(ExecErrorEvent {
            name: self.name(),
            kind: self.kind,
            tag: entry.tag.clone(),
            listener: entry.id,
            error: Arc::new(error),
        });
    }
}

/// Expands to the registry, lock, and identity methods every hook handle
/// exposes. The handle must have a `core: Arc<HookCore<$callback, M>>`
/// field where `M: Instrumentation<$args>`.
macro_rules! hook_handle_methods {
    ($callback:ty, $args:ty) => {
        /// Registers a shared listener callback.
        ///
        /// Registering a callback allocation that is already present returns
        /// the existing id and leaves the registry unchanged.
        ///
        /// # Errors
        ///
        /// Returns [`HookError::Locked`] while the hook is locked.
        pub fn register(
            &self,
            tag: Option<&str>,
            callback: Arc<$callback>,
            once: bool,
        ) -> Result<ListenerId, HookError> {
            self.core.register(tag, callback, once)
        }

        /// Removes a listener. Returns `false` if it was not registered.
        ///
        /// # Errors
        ///
        /// Returns [`HookError::Locked`] while the hook is locked.
        pub fn remove(&self, id: ListenerId) -> Result<bool, HookError> {
            self.core.remove(id)
        }

        /// Removes every listener carrying `tag`, returning how many were removed.
        ///
        /// # Errors
        ///
        /// Returns [`HookError::Locked`] while the hook is locked.
        pub fn remove_tagged(&self, tag: &str) -> Result<usize, HookError> {
            self.core.remove_tagged(tag)
        }

        /// Removes every listener.
        ///
        /// # Errors
        ///
        /// Returns [`HookError::Locked`] while the hook is locked.
        pub fn remove_all(&self) -> Result<(), HookError> {
            self.core.remove_all()
        }

        /// Returns `true` if no listeners are registered.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.core.registry.is_empty()
        }

        /// Returns the number of registered listeners.
        #[must_use]
        pub fn len(&self) -> usize {
            self.core.registry.len()
        }

        /// Returns `true` if `id` is currently registered.
        #[must_use]
        pub fn contains(&self, id: ListenerId) -> bool {
            self.core.registry.contains(id)
        }

        /// Freezes the registry (and the meta-hooks' registries).
        /// Emission is unaffected.
        pub fn lock(&self) {
            self.core.set_locked(true);
            $crate::meta::Instrumentation::<$args>::set_locked(&self.core.meta, true);
        }

        /// Reverses [`lock`](Self::lock).
        pub fn unlock(&self) {
            self.core.set_locked(false);
            $crate::meta::Instrumentation::<$args>::set_locked(&self.core.meta, false);
        }

        /// Returns `true` while the hook is locked.
        #[must_use]
        pub fn is_locked(&self) -> bool {
            self.core.is_locked()
        }

        /// Subscribes to listener failures on this hook.
        ///
        /// # Errors
        ///
        /// Returns [`HookError::Locked`] while the hook is locked.
        pub fn listen_error<F>(&self, observer: F) -> Result<Unsubscribe, HookError>
        where
            F: Fn(&ExecErrorEvent) + Send + Sync + 'static,
        {
            self.core.listen_error(Arc::new(observer))
        }

        /// Returns the hook's strategy.
        #[must_use]
        pub fn kind(&self) -> HookKind {
            self.core.kind
        }

        /// Returns the hook's name. Defaults to the strategy name.
        #[must_use]
        pub fn name(&self) -> Arc<str> {
            self.core.name()
        }

        /// Renames the hook. Affects subsequent events and errors.
        pub fn set_name(&self, name: &str) {
            self.core.set_name(name);
        }

        /// Returns the context value passed to every listener.
        #[must_use]
        pub fn context(&self) -> &Value {
            &self.core.context
        }

        /// Replaces the clock used for listener timing.
        #[must_use]
        pub fn with_clock(self, clock: Clock) -> Self {
            self.core.set_clock(clock);
            self
        }

        /// Creates an independent hook with the same strategy, name, context,
        /// and clock, and no listeners.
        #[must_use]
        pub fn clone_empty(&self) -> Self {
            Self {
                core: Arc::new(
                    self.core
                        .fork($crate::meta::Instrumentation::<$args>::create()),
                ),
            }
        }
    };
}

pub(crate) use hook_handle_methods;
