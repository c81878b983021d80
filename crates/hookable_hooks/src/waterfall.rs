//! Payload-transforming hooks.
//!
//! A waterfall hook threads one object through its listeners: each listener
//! receives the current payload and returns the next one. A listener may
//! mutate the payload in place and return it, or return a different object,
//! but the replacement must keep every key of the payload it received.
//! Anything else is a [`HookError::MalformedReturn`] and aborts the
//! emission. A listener that fails is reported and skipped, leaving the
//! payload unchanged.
//!
//! Meta-hook events for waterfalls carry the payload as a single-element
//! argument list.
//!
//! # Example
//!
//! ```
//! use hookable_hooks::{SyncWaterfallHook, Value};
//! use serde_json::json;
//!
//! let hook = SyncWaterfallHook::new();
//! hook.on(|_, data: Value| {
//!     if let Some(object) = data.as_object() {
//!         object.insert("name", "chen123");
//!     }
//!     Ok(data)
//! })
//! .expect("unlocked");
//!
//! let out = hook.emit(Value::from(json!({ "name": "chen" }))).expect("well-formed");
//! assert_eq!(out.get("name"), Some(Value::from("chen123")));
//! ```

use std::sync::Arc;

use crate::channel::{ExecErrorEvent, Unsubscribe};
use crate::clock::Clock;
use crate::error::HookError;
use crate::meta::{HookKind, Instrumentation, Instrumented, MetaHook};
use crate::registry::ListenerId;
use crate::shared::{HookCore, hook_handle_methods};
use crate::step::{Flow, ListenerResult, Step, guarded, guarded_step};
use crate::value::{Args, Value};

/// Listener callback type for [`SyncWaterfallHook`].
pub type WaterfallFn = dyn Fn(&Value, Value) -> ListenerResult<Value> + Send + Sync;

/// Listener callback type for [`AsyncWaterfallHook`].
pub type AsyncWaterfallFn = dyn Fn(&Value, Value) -> Step<Flow> + Send + Sync;

/// Returns `true` if `next` is an acceptable successor of `current`: the
/// same object, or an object holding at least every key of `current`.
fn preserves_shape(current: &Value, next: &Value) -> bool {
    let (Some(current), Some(next)) = (current.as_object(), next.as_object()) else {
        return false;
    };
    current.same(next) || current.keys().iter().all(|key| next.contains_key(key))
}

fn ensure_object(hook: &str, data: &Value) -> Result<(), HookError> {
    if data.is_object() {
        return Ok(());
    }
    Err(HookError::InvalidPayload {
        hook: hook.to_owned(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// SyncWaterfallHook
// ─────────────────────────────────────────────────────────────────────────────

/// Synchronous waterfall hook over an object payload.
#[derive(Clone)]
pub struct SyncWaterfallHook {
    core: Arc<HookCore<WaterfallFn, Instrumented<Args>>>,
}

impl Default for SyncWaterfallHook {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncWaterfallHook {
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
                HookKind::SyncWaterfallHook,
                context.into(),
                Instrumented::create(),
            )),
        }
    }

    hook_handle_methods!(WaterfallFn, Args);

    /// The meta-hook emitted before listeners run.
    #[must_use]
    pub fn before(&self) -> &MetaHook<Args> {
        self.core.meta.before()
    }

    /// The meta-hook emitted with the final payload.
    #[must_use]
    pub fn after(&self) -> &MetaHook<Args> {
        self.core.meta.after()
    }

    /// Registers a listener.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Locked`] while the hook is locked.
    pub fn on<F>(&self, listener: F) -> Result<ListenerId, HookError>
    where
        F: Fn(&Value, Value) -> ListenerResult<Value> + Send + Sync + 'static,
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
        F: Fn(&Value, Value) -> ListenerResult<Value> + Send + Sync + 'static,
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
        F: Fn(&Value, Value) -> ListenerResult<Value> + Send + Sync + 'static,
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
        F: Fn(&Value, Value) -> ListenerResult<Value> + Send + Sync + 'static,
    {
        self.register(Some(tag), Arc::new(listener), true)
    }

    /// Threads `data` through every listener and returns the final payload.
    ///
    /// # Errors
    ///
    /// - [`HookError::InvalidPayload`] if `data` is not an object.
    /// - [`HookError::MalformedReturn`] if a listener returns a non-object or
    ///   an object missing keys of its input. `after` does not fire.
    pub fn emit(&self, data: Value) -> Result<Value, HookError> {
        let core = &*self.core;
        let name = core.name();
        ensure_object(&name, &data)?;

        let entries = core.registry.snapshot();
        if entries.is_empty() {
            return Ok(data);
        }

        let clock = core.clock();
        let mut trace = core
            .meta
            .open(&name, core.kind, &core.context, &vec![data.clone()]);
        let mut data = data;

        for entry in &entries {
            if !core.claim(entry) {
                continue;
            }
            let started = trace.start(entry.tag(), &clock);
            let result = guarded(|| (entry.callback)(&core.context, data.clone()));
            trace.stop(entry.tag(), started, &clock);

            match result {
                Ok(next) => {
                    if !preserves_shape(&data, &next) {
                        return Err(HookError::MalformedReturn {
                            hook: name.to_string(),
                        });
                    }
                    data = next;
                }
                Err(error) => core.report(entry, error),
            }
        }

        core.meta
            .close(&name, core.kind, &core.context, trace, vec![data.clone()]);
        Ok(data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AsyncWaterfallHook
// ─────────────────────────────────────────────────────────────────────────────

/// Asynchronous waterfall hook over an object payload.
///
/// Listeners answer with a [`Flow`]: `Continue(next)` passes `next` on, and
/// `Halt` stops the chain and resolves the emission to `Halt`.
#[derive(Clone)]
pub struct AsyncWaterfallHook {
    core: Arc<HookCore<AsyncWaterfallFn, Instrumented<Args>>>,
}

impl Default for AsyncWaterfallHook {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncWaterfallHook {
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
                HookKind::AsyncWaterfallHook,
                context.into(),
                Instrumented::create(),
            )),
        }
    }

    hook_handle_methods!(AsyncWaterfallFn, Args);

    /// The meta-hook emitted before listeners run.
    #[must_use]
    pub fn before(&self) -> &MetaHook<Args> {
        self.core.meta.before()
    }

    /// The meta-hook emitted when the chain ends, halted or not.
    #[must_use]
    pub fn after(&self) -> &MetaHook<Args> {
        self.core.meta.after()
    }

    /// Registers a listener.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::Locked`] while the hook is locked.
    pub fn on<F>(&self, listener: F) -> Result<ListenerId, HookError>
    where
        F: Fn(&Value, Value) -> Step<Flow> + Send + Sync + 'static,
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
        F: Fn(&Value, Value) -> Step<Flow> + Send + Sync + 'static,
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
        F: Fn(&Value, Value) -> Step<Flow> + Send + Sync + 'static,
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
        F: Fn(&Value, Value) -> Step<Flow> + Send + Sync + 'static,
    {
        self.register(Some(tag), Arc::new(listener), true)
    }

    /// Threads `data` through listeners, awaiting each.
    ///
    /// Resolves to `Continue(final)` or, if a listener halted, to `Halt`.
    ///
    /// # Errors
    ///
    /// Same as [`SyncWaterfallHook::emit`].
    pub async fn emit(&self, data: Value) -> Result<Flow, HookError> {
        let core = &*self.core;
        let name = core.name();
        ensure_object(&name, &data)?;

        let entries = core.registry.snapshot();
        if entries.is_empty() {
            return Ok(Flow::Continue(data));
        }

        let clock = core.clock();
        let mut trace = core
            .meta
            .open(&name, core.kind, &core.context, &vec![data.clone()]);
        let mut data = data;
        let mut halted = false;

        for entry in &entries {
            if !core.claim(entry) {
                continue;
            }
            let started = trace.start(entry.tag(), &clock);
            let settled = guarded_step(|| (entry.callback)(&core.context, data.clone()))
                .settle()
                .await;
            trace.stop(entry.tag(), started, &clock);

            match settled {
                Ok(Flow::Continue(next)) => {
                    if !preserves_shape(&data, &next) {
                        return Err(HookError::MalformedReturn {
                            hook: name.to_string(),
                        });
                    }
                    data = next;
                }
                Ok(Flow::Halt) => {
                    tracing::debug!(hook = %name, listener = %entry.id, "waterfall halted");
                    halted = true;
                    break;
                }
                Err(error) => core.report(entry, error),
            }
        }

        core.meta
            .close(&name, core.kind, &core.context, trace, vec![data.clone()]);
        Ok(if halted { Flow::Halt } else { Flow::Continue(data) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ListenerError;
    use crate::value::Object;
    use parking_lot::Mutex;
    use serde_json::json;

    fn payload() -> Value {
        Value::from(json!({ "name": "chen" }))
    }

    #[test]
    fn shape_check_accepts_supersets_and_identity() {
        let data = payload();
        let superset = Value::from(json!({ "name": "x", "extra": 1 }));
        let subset = Value::from(json!({ "other": 1 }));

        assert!(preserves_shape(&data, &data.clone()));
        assert!(preserves_shape(&data, &superset));
        assert!(!preserves_shape(&data, &subset));
        assert!(!preserves_shape(&data, &Value::from(1)));
    }

    #[test]
    fn in_place_mutation_flows_through() {
        let hook = SyncWaterfallHook::new();
        hook.on(|_, data| {
            if let Some(object) = data.as_object() {
                object.insert("name", "chen123");
            }
            Ok(data)
        })
        .expect("registration should succeed");
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        hook.on(move |_, data| {
            *s.lock() = data.get("name");
            Ok(data)
        })
        .expect("registration should succeed");

        let input = payload();
        let out = hook.emit(input.clone()).expect("well-formed");
        assert_eq!(*seen.lock(), Some(Value::from("chen123")));
        assert!(out.same(&input));
        assert_eq!(out.get("name"), Some(Value::from("chen123")));
    }

    #[test]
    fn replacement_objects_must_keep_keys() {
        let hook = SyncWaterfallHook::new();
        hook.on(|_, _| Ok(Value::from(json!({ "other": 1 }))))
            .expect("registration should succeed");

        let err = hook.emit(payload()).expect_err("malformed");
        assert!(matches!(err, HookError::MalformedReturn { .. }));
    }

    #[test]
    fn non_object_payloads_are_rejected() {
        let hook = SyncWaterfallHook::new();
        let err = hook.emit(Value::from("text")).expect_err("invalid");
        assert!(matches!(err, HookError::InvalidPayload { .. }));
    }

    #[test]
    fn failing_listeners_leave_the_payload_unchanged() {
        let hook = SyncWaterfallHook::new();
        let errors = Arc::new(Mutex::new(0));

        hook.on_tagged("broken", |_, _| Err(ListenerError::msg("no")))
            .expect("registration should succeed");
        hook.on(|_, data| {
            let next = Object::new();
            next.insert("name", data.get("name"));
            next.insert("seen", true);
            Ok(Value::from(next))
        })
        .expect("registration should succeed");

        let e = errors.clone();
        let _sub = hook
            .listen_error(move |_| *e.lock() += 1)
            .expect("subscription should succeed");

        let out = hook.emit(payload()).expect("well-formed");
        assert_eq!(out, Value::from(json!({ "name": "chen", "seen": true })));
        assert_eq!(*errors.lock(), 1);
    }

    #[test]
    fn after_sees_the_final_payload() {
        let hook = SyncWaterfallHook::new();
        let seen = Arc::new(Mutex::new(None));

        hook.on(|_, _| Ok(Value::from(json!({ "name": "wang", "age": 3 }))))
            .expect("registration should succeed");
        let s = seen.clone();
        hook.after()
            .on(move |_, event| *s.lock() = Some(event.args[0].clone()))
            .expect("registration should succeed");

        hook.emit(payload()).expect("well-formed");
        assert_eq!(
            *seen.lock(),
            Some(Value::from(json!({ "name": "wang", "age": 3 })))
        );
    }

    #[tokio::test]
    async fn async_waterfall_halts_and_validates() {
        let hook = AsyncWaterfallHook::new();
        let reached = Arc::new(Mutex::new(false));

        hook.on(|_, data| {
            Step::deferred(async move {
                if let Some(object) = data.as_object() {
                    object.insert("step", 1);
                }
                Ok(Flow::Continue(data))
            })
        })
        .expect("registration should succeed");
        hook.on(|_, data| {
            if data.get("stop").is_some() {
                Step::halt()
            } else {
                Step::ready(Flow::Continue(data))
            }
        })
        .expect("registration should succeed");
        let r = reached.clone();
        hook.on(move |_, data| {
            *r.lock() = true;
            Step::ready(Flow::Continue(data))
        })
        .expect("registration should succeed");

        let flow = hook.emit(payload()).await.expect("well-formed");
        let out = flow.into_value().expect("not halted");
        assert_eq!(out.get("step"), Some(Value::from(1)));
        assert!(*reached.lock());

        *reached.lock() = false;
        let halted = hook
            .emit(Value::from(json!({ "stop": true })))
            .await
            .expect("well-formed");
        assert_eq!(halted, Flow::Halt);
        assert!(!*reached.lock());
    }

    #[tokio::test]
    async fn async_waterfall_rejects_malformed_returns() {
        let hook = AsyncWaterfallHook::new();
        hook.on(|_, _| Step::carry(5)).expect("registration should succeed");

        let err = hook.emit(payload()).await.expect_err("malformed");
        assert!(matches!(err, HookError::MalformedReturn { .. }));

        let err = hook.emit(Value::Null).await.expect_err("invalid");
        assert!(matches!(err, HookError::InvalidPayload { .. }));
    }
}
