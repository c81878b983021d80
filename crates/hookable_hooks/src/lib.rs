//! Hook primitives for hookable (Layer 1).
//!
//! `hookable_hooks` provides named, ordered listener registries with five
//! execution strategies, plus the invocation instrumentation every higher
//! layer builds on.
//!
//! # Core Concepts
//!
//! - [`SyncHook`] - Sequential, synchronous, results ignored
//! - [`AsyncHook`] - Sequential, awaiting each listener, halts on request
//! - [`AsyncParallelHook`] - Dispatches all listeners, then waits for all
//! - [`SyncWaterfallHook`] - Threads an object payload through listeners
//! - [`AsyncWaterfallHook`] - Asynchronous waterfall that may halt
//! - [`EachEvent`] - `before`/`after` meta-hook payload with a [`TaskId`]
//!   and per-tag listener timings
//! - [`ExecErrorEvent`] - Listener failure published on a hook's error channel
//!
//! Every strategy shares the same registry semantics: registration order is
//! emission order, a tag attributes a listener for timing and removal, a
//! locked registry rejects changes while still emitting, and a failing
//! listener never stops its siblings.
//!
//! # Example
//!
//! ```ignore
//! use hookable_hooks::{AsyncParallelHook, Step, Value};
//!
//! let ready: AsyncParallelHook = AsyncParallelHook::new();
//! ready.on_tagged("cache", |_, _| Step::deferred(async { warm_cache().await }))?;
//! ready.on_tagged("db", |_, _| Step::deferred(async { migrate().await }))?;
//!
//! ready.after().on(|_, event| {
//!     for (tag, elapsed) in &event.plugin_exec_time {
//!         tracing::info!(%tag, ?elapsed, "ready listener");
//!     }
//! })?;
//!
//! ready.emit(vec![Value::from("boot")]).await;
//! ```
//!
//! # Architecture
//!
//! - **Layer 1** (`hookable_hooks`): Hook strategies and instrumentation (this crate)
//! - **Layer 2** (`hookable_plugin`): Lifecycles, plugins, and the plugin system

/// Per-hook listener failure channel.
pub mod channel;

/// Time source for listener timing.
pub mod clock;

/// Hook and listener error types.
pub mod error;

/// Task ids, meta-hooks, and instrumentation.
pub mod meta;

/// Concurrent asynchronous hook.
pub mod parallel;

/// Argument path parsing and resolution.
pub mod path;

/// Listener identity and ordered storage.
pub mod registry;

/// Sequential asynchronous hook.
pub mod series;

mod shared;

/// Immediate and deferred listener results.
pub mod step;

/// Sequential synchronous hook.
pub mod sync;

/// Dynamic payload values.
pub mod value;

/// Payload-transforming hooks.
pub mod waterfall;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::channel::{ExecErrorEvent, Unsubscribe};
    pub use crate::clock::{Clock, ClockProvider};
    pub use crate::error::{HookError, ListenerError};
    pub use crate::meta::{Bare, EachEvent, HookKind, Instrumented, MetaHook, TaskId};
    pub use crate::parallel::AsyncParallelHook;
    pub use crate::path::{Path, PathError};
    pub use crate::registry::ListenerId;
    pub use crate::series::AsyncHook;
    pub use crate::step::{BoxFuture, Flow, ListenerResult, Step};
    pub use crate::sync::SyncHook;
    pub use crate::value::{Args, Array, Object, Value};
    pub use crate::waterfall::{AsyncWaterfallHook, SyncWaterfallHook};
}

// Re-export key types at crate root for convenience
pub use channel::{ExecErrorEvent, Unsubscribe};
pub use error::{HookError, ListenerError};
pub use meta::{EachEvent, HookKind, TaskId};
pub use parallel::AsyncParallelHook;
pub use registry::ListenerId;
pub use series::AsyncHook;
pub use step::{Flow, ListenerResult, Step};
pub use sync::SyncHook;
pub use value::{Args, Value};
pub use waterfall::{AsyncWaterfallHook, SyncWaterfallHook};
