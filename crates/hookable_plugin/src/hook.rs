//! Strategy-erased hook and listener handles.
//!
//! A lifecycle mixes hooks of every strategy under string keys. [`Hook`]
//! wraps any of the five hook handles so the host can lock, rename, observe,
//! and register into them uniformly; [`Listener`] is the matching callback
//! carried by a [`Plugin`](crate::Plugin).

use core::fmt;
use std::sync::Arc;

use hookable_hooks::meta::MetaHook;
use hookable_hooks::parallel::ParallelFn;
use hookable_hooks::series::AsyncFn;
use hookable_hooks::step::IntoListenerResult;
use hookable_hooks::sync::SyncFn;
use hookable_hooks::waterfall::{AsyncWaterfallFn, WaterfallFn};
use hookable_hooks::{
    Args, AsyncHook, AsyncParallelHook, AsyncWaterfallHook, ExecErrorEvent, Flow, HookKind,
    ListenerId, ListenerResult, Step, SyncHook, SyncWaterfallHook, Unsubscribe, Value,
};

use crate::error::PluginError;

// ─────────────────────────────────────────────────────────────────────────────
// Listener
// ─────────────────────────────────────────────────────────────────────────────

/// A plugin callback written for one hook strategy.
///
/// Cloning shares the callback allocation, so re-registering a clone on the
/// same hook is a no-op.
#[derive(Clone)]
pub enum Listener {
    /// Listener for a [`SyncHook`].
    Sync(Arc<SyncFn<Args>>),
    /// Listener for an [`AsyncHook`].
    Async(Arc<AsyncFn<Args>>),
    /// Listener for an [`AsyncParallelHook`].
    Parallel(Arc<ParallelFn<Args>>),
    /// Listener for a [`SyncWaterfallHook`].
    SyncWaterfall(Arc<WaterfallFn>),
    /// Listener for an [`AsyncWaterfallHook`].
    AsyncWaterfall(Arc<AsyncWaterfallFn>),
}

impl Listener {
    /// Wraps a [`SyncHook`] listener. The closure may return `()` or a
    /// [`ListenerResult`].
    pub fn sync<F, R>(listener: F) -> Self
    where
        F: Fn(&Value, &Args) -> R + Send + Sync + 'static,
        R: IntoListenerResult,
    {
        Self::Sync(Arc::new(move |ctx: &Value, args: &Args| {
            listener(ctx, args).into_listener_result()
        }))
    }

    /// Wraps an [`AsyncHook`] listener.
    pub fn series<F>(listener: F) -> Self
    where
        F: Fn(&Value, &Args) -> Step<Flow> + Send + Sync + 'static,
    {
        Self::Async(Arc::new(listener))
    }

    /// Wraps an [`AsyncParallelHook`] listener.
    pub fn parallel<F>(listener: F) -> Self
    where
        F: Fn(&Value, &Args) -> Step<()> + Send + Sync + 'static,
    {
        Self::Parallel(Arc::new(listener))
    }

    /// Wraps a [`SyncWaterfallHook`] listener.
    pub fn waterfall<F>(listener: F) -> Self
    where
        F: Fn(&Value, Value) -> ListenerResult<Value> + Send + Sync + 'static,
    {
        Self::SyncWaterfall(Arc::new(listener))
    }

    /// Wraps an [`AsyncWaterfallHook`] listener.
    pub fn async_waterfall<F>(listener: F) -> Self
    where
        F: Fn(&Value, Value) -> Step<Flow> + Send + Sync + 'static,
    {
        Self::AsyncWaterfall(Arc::new(listener))
    }

    /// Builds a pass-through listener of the given strategy that hands every
    /// invocation's context and arguments to `observer`.
    ///
    /// Waterfall observers see the payload as a single argument and return
    /// it unchanged. Sequential-async observers settle to `Continue(Null)`.
    pub fn observe<F>(kind: HookKind, observer: F) -> Self
    where
        F: Fn(&Value, &Args) + Send + Sync + 'static,
    {
        match kind {
            HookKind::SyncHook => {
                Self::Sync(Arc::new(move |ctx: &Value, args: &Args| -> ListenerResult {
                    observer(ctx, args);
                    Ok(())
                }))
            }
            HookKind::AsyncHook => Self::Async(Arc::new(move |ctx: &Value, args: &Args| {
                observer(ctx, args);
                Step::proceed()
            })),
            HookKind::AsyncParallelHook => {
                Self::Parallel(Arc::new(move |ctx: &Value, args: &Args| {
                    observer(ctx, args);
                    Step::ready(())
                }))
            }
            HookKind::SyncWaterfallHook => {
                let listener = move |ctx: &Value, data: Value| -> ListenerResult<Value> {
                    observer(ctx, &vec![data.clone()]);
                    Ok(data)
                };
                Self::SyncWaterfall(Arc::new(listener))
            }
            HookKind::AsyncWaterfallHook => {
                Self::AsyncWaterfall(Arc::new(move |ctx: &Value, data: Value| {
                    observer(ctx, &vec![data.clone()]);
                    Step::ready(Flow::Continue(data))
                }))
            }
        }
    }

    /// Returns the strategy this listener was written for.
    #[must_use]
    pub fn kind(&self) -> HookKind {
        match self {
            Self::Sync(_) => HookKind::SyncHook,
            Self::Async(_) => HookKind::AsyncHook,
            Self::Parallel(_) => HookKind::AsyncParallelHook,
            Self::SyncWaterfall(_) => HookKind::SyncWaterfallHook,
            Self::AsyncWaterfall(_) => HookKind::AsyncWaterfallHook,
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener").field(&self.kind()).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hook
// ─────────────────────────────────────────────────────────────────────────────

/// A hook of any strategy.
///
/// Cloning shares the underlying hook.
#[derive(Clone)]
pub enum Hook {
    /// A sequential synchronous hook.
    Sync(SyncHook),
    /// A sequential asynchronous hook.
    Async(AsyncHook),
    /// A parallel asynchronous hook.
    Parallel(AsyncParallelHook),
    /// A synchronous waterfall hook.
    SyncWaterfall(SyncWaterfallHook),
    /// An asynchronous waterfall hook.
    AsyncWaterfall(AsyncWaterfallHook),
}

macro_rules! dispatch {
    ($hook:expr, $h:ident => $body:expr) => {
        match $hook {
            Hook::Sync($h) => $body,
            Hook::Async($h) => $body,
            Hook::Parallel($h) => $body,
            Hook::SyncWaterfall($h) => $body,
            Hook::AsyncWaterfall($h) => $body,
        }
    };
}

impl Hook {
    /// Returns the hook's strategy.
    #[must_use]
    pub fn kind(&self) -> HookKind {
        dispatch!(self, h => h.kind())
    }

    /// Returns the hook's name.
    #[must_use]
    pub fn name(&self) -> Arc<str> {
        dispatch!(self, h => h.name())
    }

    /// Renames the hook.
    pub fn set_name(&self, name: &str) {
        dispatch!(self, h => h.set_name(name));
    }

    /// Returns the context value passed to listeners.
    #[must_use]
    pub fn context(&self) -> &Value {
        dispatch!(self, h => h.context())
    }

    /// The meta-hook emitted before listeners run.
    #[must_use]
    pub fn before(&self) -> &MetaHook {
        dispatch!(self, h => h.before())
    }

    /// The meta-hook emitted after listeners finish.
    #[must_use]
    pub fn after(&self) -> &MetaHook {
        dispatch!(self, h => h.after())
    }

    /// Locks the hook and its meta-hooks.
    pub fn lock(&self) {
        dispatch!(self, h => h.lock());
    }

    /// Unlocks the hook and its meta-hooks.
    pub fn unlock(&self) {
        dispatch!(self, h => h.unlock());
    }

    /// Returns `true` while the hook is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        dispatch!(self, h => h.is_locked())
    }

    /// Returns `true` if no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        dispatch!(self, h => h.is_empty())
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        dispatch!(self, h => h.len())
    }

    /// Returns `true` if `id` is currently registered.
    #[must_use]
    pub fn contains(&self, id: ListenerId) -> bool {
        dispatch!(self, h => h.contains(id))
    }

    /// Registers `listener`, checking that it matches the hook's strategy.
    ///
    /// # Errors
    ///
    /// - [`PluginError::ListenerKind`] if the listener was written for
    ///   another strategy
    /// - [`PluginError::Hook`] if the hook is locked
    pub fn register(
        &self,
        tag: Option<&str>,
        listener: &Listener,
        once: bool,
    ) -> Result<ListenerId, PluginError> {
        let id = match (self, listener) {
            (Self::Sync(h), Listener::Sync(f)) => h.register(tag, Arc::clone(f), once)?,
            (Self::Async(h), Listener::Async(f)) => h.register(tag, Arc::clone(f), once)?,
            (Self::Parallel(h), Listener::Parallel(f)) => h.register(tag, Arc::clone(f), once)?,
            (Self::SyncWaterfall(h), Listener::SyncWaterfall(f)) => {
                h.register(tag, Arc::clone(f), once)?
            }
            (Self::AsyncWaterfall(h), Listener::AsyncWaterfall(f)) => {
                h.register(tag, Arc::clone(f), once)?
            }
            _ => {
                return Err(PluginError::ListenerKind {
                    hook: self.name().to_string(),
                    expected: self.kind(),
                    found: listener.kind(),
                });
            }
        };
        Ok(id)
    }

    /// Removes a listener. Returns `false` if it was not registered.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Hook`] if the hook is locked.
    pub fn remove(&self, id: ListenerId) -> Result<bool, PluginError> {
        Ok(dispatch!(self, h => h.remove(id))?)
    }

    /// Removes every listener carrying `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Hook`] if the hook is locked.
    pub fn remove_tagged(&self, tag: &str) -> Result<usize, PluginError> {
        Ok(dispatch!(self, h => h.remove_tagged(tag))?)
    }

    /// Removes every listener.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Hook`] if the hook is locked.
    pub fn remove_all(&self) -> Result<(), PluginError> {
        Ok(dispatch!(self, h => h.remove_all())?)
    }

    /// Subscribes to listener failures on this hook.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Hook`] if the hook is locked.
    pub fn listen_error<F>(&self, observer: F) -> Result<Unsubscribe, PluginError>
    where
        F: Fn(&ExecErrorEvent) + Send + Sync + 'static,
    {
        Ok(dispatch!(self, h => h.listen_error(observer))?)
    }

    /// Creates an independent hook of the same strategy with no listeners.
    #[must_use]
    pub fn clone_empty(&self) -> Self {
        match self {
            Self::Sync(h) => Self::Sync(h.clone_empty()),
            Self::Async(h) => Self::Async(h.clone_empty()),
            Self::Parallel(h) => Self::Parallel(h.clone_empty()),
            Self::SyncWaterfall(h) => Self::SyncWaterfall(h.clone_empty()),
            Self::AsyncWaterfall(h) => Self::AsyncWaterfall(h.clone_empty()),
        }
    }

    /// Returns the inner [`SyncHook`], if that is the strategy.
    #[must_use]
    pub fn as_sync(&self) -> Option<&SyncHook> {
        match self {
            Self::Sync(h) => Some(h),
            _ => None,
        }
    }

    /// Returns the inner [`AsyncHook`], if that is the strategy.
    #[must_use]
    pub fn as_series(&self) -> Option<&AsyncHook> {
        match self {
            Self::Async(h) => Some(h),
            _ => None,
        }
    }

    /// Returns the inner [`AsyncParallelHook`], if that is the strategy.
    #[must_use]
    pub fn as_parallel(&self) -> Option<&AsyncParallelHook> {
        match self {
            Self::Parallel(h) => Some(h),
            _ => None,
        }
    }

    /// Returns the inner [`SyncWaterfallHook`], if that is the strategy.
    #[must_use]
    pub fn as_waterfall(&self) -> Option<&SyncWaterfallHook> {
        match self {
            Self::SyncWaterfall(h) => Some(h),
            _ => None,
        }
    }

    /// Returns the inner [`AsyncWaterfallHook`], if that is the strategy.
    #[must_use]
    pub fn as_async_waterfall(&self) -> Option<&AsyncWaterfallHook> {
        match self {
            Self::AsyncWaterfall(h) => Some(h),
            _ => None,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("listeners", &self.len())
            .finish()
    }
}

impl From<SyncHook> for Hook {
    fn from(hook: SyncHook) -> Self {
        Self::Sync(hook)
    }
}

impl From<AsyncHook> for Hook {
    fn from(hook: AsyncHook) -> Self {
        Self::Async(hook)
    }
}

impl From<AsyncParallelHook> for Hook {
    fn from(hook: AsyncParallelHook) -> Self {
        Self::Parallel(hook)
    }
}

impl From<SyncWaterfallHook> for Hook {
    fn from(hook: SyncWaterfallHook) -> Self {
        Self::SyncWaterfall(hook)
    }
}

impl From<AsyncWaterfallHook> for Hook {
    fn from(hook: AsyncWaterfallHook) -> Self {
        Self::AsyncWaterfall(hook)
    }
}
