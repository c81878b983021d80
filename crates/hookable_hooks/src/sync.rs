//! Sequential synchronous hook.
//!
//! [`SyncHook`] calls every listener in registration order on the caller's
//! thread. Results are ignored; a failing or panicking listener is reported
//! on the error channel and the remaining listeners still run.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use hookable_hooks::{SyncHook, Value};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let hook: SyncHook = SyncHook::new();
//! let log = Arc::clone(&seen);
//! hook.on_tagged("logger", move |_ctx, args| {
//!     log.lock().unwrap().push(args[0].clone());
//! })
//! .expect("unlocked");
//!
//! hook.emit(vec![Value::from("started")]);
//! assert_eq!(*seen.lock().unwrap(), vec![Value::from("started")]);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::channel::{ExecErrorEvent, Unsubscribe};
use crate::clock::Clock;
use crate::error::HookError;
use crate::meta::{Bare, HookKind, Instrumentation, Instrumented, MetaHook};
use crate::registry::ListenerId;
use crate::shared::{HookCore, hook_handle_methods};
use crate::step::{IntoListenerResult, ListenerResult, guarded};
use crate::value::{Args, Value};

/// Listener callback type for [`SyncHook`].
pub type SyncFn<A> = dyn Fn(&Value, &A) -> ListenerResult + Send + Sync;

/// Sequential synchronous hook with arguments of type `A`.
///
/// `M` selects whether the hook carries `before`/`after` meta-hooks
/// ([`Instrumented`], the default) or not ([`Bare`]).
///
/// Handles are cheap to clone and clones share listeners. Use
/// [`clone_empty`](SyncHook::clone_empty) for an independent hook.
pub struct SyncHook<A = Args, M = Instrumented<A>> {
    core: Arc<HookCore<SyncFn<A>, M>>,
}

impl<A, M> Clone for SyncHook<A, M> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<A, M> fmt::Debug for SyncHook<A, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHook").finish_non_exhaustive()
    }
}

impl<A> SyncHook<A, Instrumented<A>>
where
    A: Clone + Send + Sync + 'static,
{
    /// Creates an instrumented hook with a null context.
    #[must_use]
    pub fn new() -> Self {
        Self::with_context(Value::Null)
    }

    /// The meta-hook emitted before listeners run.
    #[must_use]
    pub fn before(&self) -> &MetaHook<A> {
        self.core.meta.before()
    }

    /// The meta-hook emitted after listeners finish.
    #[must_use]
    pub fn after(&self) -> &MetaHook<A> {
        self.core.meta.after()
    }
}

impl<A> SyncHook<A, Bare>
where
    A: Clone + Send + Sync + 'static,
{
    /// Creates a hook without meta-hooks.
    #[must_use]
    pub fn bare() -> Self {
        Self::with_context(Value::Null)
    }
}

impl<A> Default for SyncHook<A, Instrumented<A>>
where
    A: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, M> SyncHook<A, M> {
    pub(crate) fn set_lock_flag(&self, locked: bool) {
        self.core.set_locked(locked);
    }
}

impl<A, M> SyncHook<A, M>
where
    A: Clone + Send + Sync + 'static,
    M: Instrumentation<A>,
{
    /// Creates a hook whose listeners receive `context`.
    #[must_use]
    pub fn with_context(context: impl Into<Value>) -> Self {
        Self {
            core: Arc::new(HookCore::new(HookKind::SyncHook, context.into(), M::create())),
        }
    }

    hook_handle_methods!(SyncFn<A>, A);

    /// Registers a listener.
    ///
    /// The closure may return `()` or a [`ListenerResult`].
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Locked`] while the hook is locked.
    pub fn on<F, R>(&self, listener: F) -> Result<ListenerId, HookError>
    where
        F: Fn(&Value, &A) -> R + Send + Sync + 'static,
        R: IntoListenerResult,
    {
        self.register(None, Self::wrap(listener), false)
    }

    /// Registers a listener attributed to `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Locked`] while the hook is locked.
    pub fn on_tagged<F, R>(&self, tag: &str, listener: F) -> Result<ListenerId, HookError>
    where
        F: Fn(&Value, &A) -> R + Send + Sync + 'static,
        R: IntoListenerResult,
    {
        self.register(Some(tag), Self::wrap(listener), false)
    }

    /// Registers a listener that runs on the next emission only.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Locked`] while the hook is locked.
    pub fn once<F, R>(&self, listener: F) -> Result<ListenerId, HookError>
    where
        F: Fn(&Value, &A) -> R + Send + Sync + 'static,
        R: IntoListenerResult,
    {
        self.register(None, Self::wrap(listener), true)
    }

    /// Registers a tagged listener that runs on the next emission only.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Locked`] while the hook is locked.
    pub fn once_tagged<F, R>(&self, tag: &str, listener: F) -> Result<ListenerId, HookError>
    where
        F: Fn(&Value, &A) -> R + Send + Sync + 'static,
        R: IntoListenerResult,
    {
        self.register(Some(tag), Self::wrap(listener), true)
    }

    fn wrap<F, R>(listener: F) -> Arc<SyncFn<A>>
    where
        F: Fn(&Value, &A) -> R + Send + Sync + 'static,
        R: IntoListenerResult,
    {
        Arc::new(move |ctx: &Value, args: &A| listener(ctx, args).into_listener_result())
    }

    /// Runs every listener in registration order.
    ///
    /// With no listeners registered this returns immediately: no task id is
    /// allocated and no meta-hook fires.
    pub fn emit(&self, args: A) {
        let entries = self.core.registry.snapshot();
        if entries.is_empty() {
            return;
        }

        let core = &*self.core;
        let name = core.name();
        let clock = core.clock();
        let mut trace = core.meta.open(&name, core.kind, &core.context, &args);

        for entry in &entries {
            if !core.claim(entry) {
                continue;
            }
            let started = trace.start(entry.tag(), &clock);
            let result = guarded(|| (entry.callback)(&core.context, &args));
            trace.stop(entry.tag(), started, &clock);
            if let Err(error) = result {
                core.report(entry, error);
            }
        }

        core.meta.close(&name, core.kind, &core.context, trace, args);
    }
}
