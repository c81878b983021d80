//! Invocation instrumentation: task ids, `before`/`after` meta-hooks, and
//! per-tag listener timing.
//!
//! Every instrumented hook owns two meta-hooks. When the hook is emitted with
//! at least one listener registered, it allocates a fresh [`TaskId`] and
//!
//! 1. emits an [`EachEvent`] on `before` (if anyone listens there),
//! 2. runs its listeners, timing tagged ones when `after` has observers,
//! 3. emits an [`EachEvent`] on `after` carrying the same task id and the
//!    accumulated [`plugin_exec_time`](EachEvent::plugin_exec_time).
//!
//! Meta-hooks are themselves [`SyncHook`]s, but [`Bare`] ones: they have no
//! meta-hooks of their own and never allocate task ids.
//!
//! ```ignore
//! let hook: SyncHook = SyncHook::new();
//! hook.after().on(|_, event: &EachEvent| {
//!     for (tag, elapsed) in &event.plugin_exec_time {
//!         tracing::info!(task = %event.id, %tag, ?elapsed, "listener time");
//!     }
//! })?;
//! ```

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::sync::SyncHook;
use crate::value::{Args, Value};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

// ─────────────────────────────────────────────────────────────────────────────
// TaskId
// ─────────────────────────────────────────────────────────────────────────────

/// Identifier of one instrumented hook invocation.
///
/// Allocated from a process-wide counter, so ids are unique across all hooks
/// and strictly increasing in allocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HookKind
// ─────────────────────────────────────────────────────────────────────────────

/// The execution strategy of a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookKind {
    /// Sequential, synchronous, results ignored.
    SyncHook,
    /// Sequential, awaiting each listener, halts on request.
    AsyncHook,
    /// Concurrent dispatch, waits for all.
    AsyncParallelHook,
    /// Synchronous payload transformation.
    SyncWaterfallHook,
    /// Asynchronous payload transformation, halts on request.
    AsyncWaterfallHook,
}

impl HookKind {
    /// Returns the strategy name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SyncHook => "SyncHook",
            Self::AsyncHook => "AsyncHook",
            Self::AsyncParallelHook => "AsyncParallelHook",
            Self::SyncWaterfallHook => "SyncWaterfallHook",
            Self::AsyncWaterfallHook => "AsyncWaterfallHook",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EachEvent
// ─────────────────────────────────────────────────────────────────────────────

/// Payload of the `before` and `after` meta-hooks.
#[derive(Debug, Clone)]
pub struct EachEvent<A = Args> {
    /// Task id shared by the `before` and `after` events of one invocation.
    pub id: TaskId,
    /// Name of the emitting hook.
    pub name: Arc<str>,
    /// Strategy of the emitting hook.
    pub kind: HookKind,
    /// Context value of the emitting hook.
    pub context: Value,
    /// Arguments the hook was emitted with. For waterfall hooks this is a
    /// single-element list holding the payload.
    pub args: A,
    /// Wall time spent per listener tag, summed across same-tag listeners.
    ///
    /// Always empty on `before`, and on `after` when nothing observed `after`
    /// at emission start.
    pub plugin_exec_time: HashMap<String, Duration>,
}

/// The meta-hook type carried by an instrumented hook with arguments `A`.
pub type MetaHook<A = Args> = SyncHook<EachEvent<A>, Bare>;

// ─────────────────────────────────────────────────────────────────────────────
// Trace
// ─────────────────────────────────────────────────────────────────────────────

/// State of one instrumented invocation, threaded from `before` to `after`.
#[doc(hidden)]
pub struct Trace {
    id: Option<TaskId>,
    timings: Option<HashMap<String, Duration>>,
}

impl Trace {
    fn untraced() -> Self {
        Self {
            id: None,
            timings: None,
        }
    }

    /// Returns the task id, if this invocation is instrumented.
    #[must_use]
    pub fn id(&self) -> Option<TaskId> {
        self.id
    }

    /// Starts timing a listener. Reads the clock only for tagged listeners
    /// and only when timings are being collected.
    pub(crate) fn start(&self, tag: Option<&str>, clock: &Clock) -> Option<Instant> {
        (self.timings.is_some() && tag.is_some()).then(|| clock.now())
    }

    pub(crate) fn stop(&mut self, tag: Option<&str>, started: Option<Instant>, clock: &Clock) {
        if let Some(started) = started {
            self.add(tag, clock.elapsed_since(started));
        }
    }

    pub(crate) fn add(&mut self, tag: Option<&str>, elapsed: Duration) {
        if let (Some(tag), Some(timings)) = (tag, self.timings.as_mut()) {
            *timings.entry_ref(tag).or_default() += elapsed;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Instrumentation
// ─────────────────────────────────────────────────────────────────────────────

mod sealed {
    pub trait Sealed {}
}

/// Whether a hook carries `before`/`after` meta-hooks.
///
/// Implemented by [`Instrumented`] (the default) and [`Bare`] (used for the
/// meta-hooks themselves). Sealed.
pub trait Instrumentation<A>: sealed::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn create() -> Self
    where
        Self: Sized;

    #[doc(hidden)]
    fn set_locked(&self, locked: bool);

    #[doc(hidden)]
    fn open(&self, name: &Arc<str>, kind: HookKind, context: &Value, args: &A) -> Trace;

    #[doc(hidden)]
    fn close(&self, name: &Arc<str>, kind: HookKind, context: &Value, trace: Trace, args: A);
}

/// Marker for hooks without meta-hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bare;

impl sealed::Sealed for Bare {}

impl<A> Instrumentation<A> for Bare {
    fn create() -> Self {
        Bare
    }

    fn set_locked(&self, _locked: bool) {}

    fn open(&self, _: &Arc<str>, _: HookKind, _: &Value, _: &A) -> Trace {
        Trace::untraced()
    }

    fn close(&self, _: &Arc<str>, _: HookKind, _: &Value, _: Trace, _: A) {}
}

/// The `before`/`after` pair owned by an instrumented hook.
pub struct Instrumented<A> {
    before: MetaHook<A>,
    after: MetaHook<A>,
}

impl<A> Instrumented<A> {
    /// The hook emitted before listeners run.
    #[must_use]
    pub fn before(&self) -> &MetaHook<A> {
        &self.before
    }

    /// The hook emitted after listeners finish.
    #[must_use]
    pub fn after(&self) -> &MetaHook<A> {
        &self.after
    }
}

impl<A> sealed::Sealed for Instrumented<A> {}

impl<A> Instrumentation<A> for Instrumented<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn create() -> Self {
        Self {
            before: SyncHook::bare(),
            after: SyncHook::bare(),
        }
    }

    fn set_locked(&self, locked: bool) {
        self.before.set_lock_flag(locked);
        self.after.set_lock_flag(locked);
    }

    fn open(&self, name: &Arc<str>, kind: HookKind, context: &Value, args: &A) -> Trace {
        let id = TaskId::next();
        if !self.before.is_empty() {
            self.before.emit(EachEvent {
                id,
                name: Arc::clone(name),
                kind,
                context: context.clone(),
                args: args.clone(),
                plugin_exec_time: HashMap::new(),
            });
        }
        Trace {
            id: Some(id),
            timings: (!self.after.is_empty()).then(HashMap::new),
        }
    }

    fn close(&self, name: &Arc<str>, kind: HookKind, context: &Value, trace: Trace, args: A) {
        let Some(id) = trace.id else {
            return;
        };
        if self.after.is_empty() {
            return;
        }
        self.after.emit(EachEvent {
            id,
            name: Arc::clone(name),
            kind,
            context: context.clone(),
            args,
            plugin_exec_time: trace.timings.unwrap_or_default(),
        });
    }
}
