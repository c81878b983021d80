//! Concurrent asynchronous hook.
//!
//! [`AsyncParallelHook`] starts every listener before awaiting any of them,
//! then waits for all to settle. Failures are isolated: one listener
//! rejecting does not cancel or hide the others.

use std::sync::Arc;

use futures::future::join_all;

use crate::channel::{ExecErrorEvent, Unsubscribe};
use crate::clock::Clock;
use crate::error::HookError;
use crate::meta::{HookKind, Instrumentation, Instrumented, MetaHook};
use crate::registry::ListenerId;
use crate::shared::{HookCore, hook_handle_methods};
use crate::step::{Step, guarded_step};
use crate::value::{Args, Value};

/// Listener callback type for [`AsyncParallelHook`].
pub type ParallelFn<A> = dyn Fn(&Value, &A) -> Step<()> + Send + Sync;

/// Concurrent asynchronous hook with arguments of type `A`.
pub struct AsyncParallelHook<A = Args> {
    core: Arc<HookCore<ParallelFn<A>, Instrumented<A>>>,
}

impl<A> Clone for AsyncParallelHook<A> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<A> Default for AsyncParallelHook<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> AsyncParallelHook<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Creates a hook with a null context.
    #[must_use]
    pub fn new() -> Self {
        Self::with_context(Value::Null)
    }

    /// Creates a hook whose listeners receive `context`.
    #[must_use]
    pub fn with_context(context: impl Into<Value>) -> Self {
        Self {
            core: Arc::new(HookCore::new(
                HookKind::AsyncParallelHook,
                context.into(),
                Instrumented::create(),
            )),
        }
    }

    hook_handle_methods!(ParallelFn<A>, A);

    /// The meta-hook emitted before listeners run.
    #[must_use]
    pub fn before(&self) -> &MetaHook<A> {
        self.core.meta.before()
    }

    /// The meta-hook emitted after every listener settled.
    #[must_use]
    pub fn after(&self) -> &MetaHook<A> {
        self.core.meta.after()
    }

    /// Registers a listener.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Locked`] while the hook is locked.
    pub fn on<F>(&self, listener: F) -> Result<ListenerId, HookError>
    where
        F: Fn(&Value, &A) -> Step<()> + Send + Sync + 'static,
    {
        self.register(None, Arc::new(listener), false)
    }

    /// Registers a listener attributed to `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Locked`] while the hook is locked.
    pub fn on_tagged<F>(&self, tag: &str, listener: F) -> Result<ListenerId, HookError>
    where
        F: Fn(&Value, &A) -> Step<()> + Send + Sync + 'static,
    {
        self.register(Some(tag), Arc::new(listener), false)
    }

    /// Registers a listener that runs on the next emission only.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Locked`] while the hook is locked.
    pub fn once<F>(&self, listener: F) -> Result<ListenerId, HookError>
    where
        F: Fn(&Value, &A) -> Step<()> + Send + Sync + 'static,
    {
        self.register(None, Arc::new(listener), true)
    }

    /// Registers a tagged listener that runs on the next emission only.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Locked`] while the hook is locked.
    pub fn once_tagged<F>(&self, tag: &str, listener: F) -> Result<ListenerId, HookError>
    where
        F: Fn(&Value, &A) -> Step<()> + Send + Sync + 'static,
    {
        self.register(Some(tag), Arc::new(listener), true)
    }

    /// Calls every listener, then waits for all of them to settle.
    ///
    /// All listeners are invoked before the first await, so a listener's
    /// deferred work is already in flight when the next one is called.
    pub async fn emit(&self, args: A) {
        let entries = self.core.registry.snapshot();
        if entries.is_empty() {
            return;
        }

        let core = &*self.core;
        let name = core.name();
        let clock = core.clock();
        let mut trace = core.meta.open(&name, core.kind, &core.context, &args);

        let claimed: Vec<_> = entries.into_iter().filter(|e| core.claim(e)).collect();
        let pending: Vec<_> = claimed
            .iter()
            .map(|entry| {
                let started = trace.start(entry.tag(), &clock);
                let step = guarded_step(|| (entry.callback)(&core.context, &args));
                let clock = clock.clone();
                async move {
                    let result = step.settle().await;
                    (result, started.map(|s| clock.elapsed_since(s)))
                }
            })
            .collect();

        let settled = join_all(pending).await;

        for (entry, (result, elapsed)) in claimed.iter().zip(settled) {
            if let Some(elapsed) = elapsed {
                trace.add(entry.tag(), elapsed);
            }
            if let Err(error) = result {
                core.report(entry, error);
            }
        }

        core.meta.close(&name, core.kind, &core.context, trace, args);
    }
}
