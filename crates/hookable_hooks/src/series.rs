//! Sequential asynchronous hook.
//!
//! [`AsyncHook`] awaits each listener before starting the next. A listener
//! that answers [`Flow::Halt`] stops the chain; the hook then resolves to
//! `Halt` and later listeners never run. Otherwise the hook resolves to the
//! value carried by the last listener that continued (`Null` if none did).
//! A failing listener is reported and skipped; it neither halts the chain
//! nor replaces the carried value.
//!
//! # Example
//!
//! ```ignore
//! let hook: AsyncHook = AsyncHook::new();
//! hook.on_tagged("auth", |_, args| {
//!     let token = args[0].clone();
//!     Step::deferred(async move {
//!         let ok = check(&token).await;
//!         Ok(if ok { Flow::Continue(token) } else { Flow::Halt })
//!     })
//! })?;
//!
//! if hook.emit(vec![Value::from("secret")]).await.is_halt() {
//!     return Err(Denied);
//! }
//! ```

use std::sync::Arc;

use crate::channel::{ExecErrorEvent, Unsubscribe};
use crate::clock::Clock;
use crate::error::HookError;
use crate::meta::{HookKind, Instrumentation, Instrumented, MetaHook};
use crate::registry::ListenerId;
use crate::shared::{HookCore, hook_handle_methods};
use crate::step::{Flow, Step, guarded_step};
use crate::value::{Args, Value};

/// Listener callback type for [`AsyncHook`].
pub type AsyncFn<A> = dyn Fn(&Value, &A) -> Step<Flow> + Send + Sync;

/// Sequential asynchronous hook with arguments of type `A`.
pub struct AsyncHook<A = Args> {
    core: Arc<HookCore<AsyncFn<A>, Instrumented<A>>>,
}

impl<A> Clone for AsyncHook<A> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<A> Default for AsyncHook<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> AsyncHook<A>
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
                HookKind::AsyncHook,
                context.into(),
                Instrumented::create(),
            )),
        }
    }

    hook_handle_methods!(AsyncFn<A>, A);

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

    /// Registers a listener.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Locked`] while the hook is locked.
    pub fn on<F>(&self, listener: F) -> Result<ListenerId, HookError>
    where
        F: Fn(&Value, &A) -> Step<Flow> + Send + Sync + 'static,
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
        F: Fn(&Value, &A) -> Step<Flow> + Send + Sync + 'static,
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
        F: Fn(&Value, &A) -> Step<Flow> + Send + Sync + 'static,
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
        F: Fn(&Value, &A) -> Step<Flow> + Send + Sync + 'static,
    {
        self.register(Some(tag), Arc::new(listener), true)
    }

    /// Runs listeners one at a time, awaiting each.
    ///
    /// Resolves to [`Flow::Halt`] if a listener halted, otherwise to the last
    /// carried value. `after` fires in both cases.
    pub async fn emit(&self, args: A) -> Flow {
        let entries = self.core.registry.snapshot();
        if entries.is_empty() {
            return Flow::Continue(Value::Null);
        }

        let core = &*self.core;
        let name = core.name();
        let clock = core.clock();
        let mut trace = core.meta.open(&name, core.kind, &core.context, &args);
        let mut carried = Value::Null;
        let mut halted = false;

        for entry in &entries {
            if !core.claim(entry) {
                continue;
            }
            let started = trace.start(entry.tag(), &clock);
            let settled = guarded_step(|| (entry.callback)(&core.context, &args))
                .settle()
                .await;
            trace.stop(entry.tag(), started, &clock);

            match settled {
                Ok(Flow::Continue(value)) => carried = value,
                Ok(Flow::Halt) => {
                    tracing::debug!(hook = %name, listener = %entry.id, "chain halted");
                    halted = true;
                    break;
                }
                Err(error) => core.report(entry, error),
            }
        }

        core.meta.close(&name, core.kind, &core.context, trace, args);
        if halted {
            Flow::Halt
        } else {
            Flow::Continue(carried)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ListenerError;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn listeners_run_strictly_in_sequence() {
        let hook: AsyncHook = AsyncHook::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for (label, delay) in [("slow", 20), ("fast", 0)] {
            let log = log.clone();
            hook.on(move |_, _| {
                let log = log.clone();
                Step::deferred(async move {
                    log.lock().push(format!("{label}:start"));
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    log.lock().push(format!("{label}:end"));
                    Ok(Flow::Continue(Value::Null))
                })
            })
            .expect("registration should succeed");
        }

        hook.emit(Args::new()).await;
        assert_eq!(
            *log.lock(),
            vec!["slow:start", "slow:end", "fast:start", "fast:end"]
        );
    }

    #[tokio::test]
    async fn halt_skips_the_rest_but_after_still_fires() {
        let hook: AsyncHook = AsyncHook::new();
        let ran = Arc::new(Mutex::new(Vec::new()));
        let after = Arc::new(Mutex::new(0));

        let r = ran.clone();
        hook.on(move |_, _| {
            r.lock().push(1);
            Step::halt()
        })
        .expect("registration should succeed");
        let r = ran.clone();
        hook.on(move |_, _| {
            r.lock().push(2);
            Step::proceed()
        })
        .expect("registration should succeed");
        let a = after.clone();
        hook.after()
            .on(move |_, _| *a.lock() += 1)
            .expect("registration should succeed");

        assert_eq!(hook.emit(Args::new()).await, Flow::Halt);
        assert_eq!(*ran.lock(), vec![1]);
        assert_eq!(*after.lock(), 1);
    }

    #[tokio::test]
    async fn resolves_to_the_last_carried_value() {
        let hook: AsyncHook = AsyncHook::new();
        hook.on(|_, _| Step::carry("first")).expect("registration should succeed");
        hook.on(|_, _| Step::carry("second")).expect("registration should succeed");
        hook.on(|_, _| Step::fail(ListenerError::msg("ignored")))
            .expect("registration should succeed");

        let flow = hook.emit(Args::new()).await;
        assert_eq!(flow, Flow::Continue(Value::from("second")));
    }

    #[tokio::test]
    async fn empty_hook_resolves_to_null() {
        let hook: AsyncHook = AsyncHook::new();
        assert_eq!(hook.emit(Args::new()).await, Flow::Continue(Value::Null));
    }

    #[tokio::test]
    async fn rejections_continue_the_chain() {
        let hook: AsyncHook = AsyncHook::new();
        let errors: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
        let reached = Arc::new(Mutex::new(false));

        hook.on_tagged("broken", |_, _| {
            Step::deferred(async { Err(ListenerError::msg("rejected")) })
        })
        .expect("registration should succeed");
        let r = reached.clone();
        hook.on(move |_, _| {
            *r.lock() = true;
            Step::proceed()
        })
        .expect("registration should succeed");

        let e = errors.clone();
        let _sub = hook
            .listen_error(move |event| e.lock().push(event.tag.as_deref().map(String::from)))
            .expect("subscription should succeed");

        hook.emit(Args::new()).await;
        assert!(*reached.lock());
        assert_eq!(*errors.lock(), vec![Some("broken".to_string())]);
    }
}
