//! Plugin host for hookable (Layer 2).
//!
//! `hookable_plugin` groups hooks from `hookable_hooks` into a named
//! [`Lifecycle`] and lets [`Plugin`]s contribute listeners to it through a
//! [`PluginSystem`].
//!
//! # Core Concepts
//!
//! - [`Lifecycle`] - Ordered map from lifecycle key to [`Hook`]
//! - [`Plugin`] - Named bundle of [`Listener`]s, once-listeners, and APIs
//! - [`PluginSystem`] - Registers plugins, locks the lifecycle, and fans
//!   observers out to every hook
//! - [`Performance`] - Correlates a start key with an end key by a value
//!   extracted from their arguments
//! - [`Debugger`] - Logs or forwards every invocation with its timing
//!
//! # Example
//!
//! ```ignore
//! use hookable_hooks::{AsyncParallelHook, SyncHook, Value};
//! use hookable_plugin::{Lifecycle, Listener, Plugin, PluginSystem};
//!
//! let system = PluginSystem::new(
//!     Lifecycle::new()
//!         .with("init", SyncHook::new())?
//!         .with("ready", AsyncParallelHook::new())?,
//! );
//!
//! system.use_plugin(
//!     Plugin::new("cache")
//!         .with_once_hook("init", Listener::sync(|_, _| tracing::info!("cache init")))
//!         .with_hook("ready", Listener::parallel(|_, _| Step::deferred(warm()))),
//! )?;
//!
//! let performance = system.performance("0")?;
//! performance
//!     .monitor("init", "ready")?
//!     .on(|_, event| tracing::info!(elapsed = ?event.time, "boot"))?;
//!
//! system.lock();
//! let lifecycle = system.lifecycle();
//! lifecycle.sync("init").expect("declared").emit(vec![Value::from("app")]);
//! lifecycle.parallel("ready").expect("declared").emit(vec![Value::from("app")]).await;
//! ```
//!
//! # Architecture
//!
//! - **Layer 1** (`hookable_hooks`): Hook strategies and instrumentation
//! - **Layer 2** (`hookable_plugin`): Lifecycles, plugins, and the plugin system (this crate)

/// Invocation debugger.
pub mod debugger;

/// Plugin host errors.
pub mod error;

/// Strategy-erased hook and listener handles.
pub mod hook;

/// Named hook collections.
pub mod lifecycle;

/// Cross-hook performance correlation.
pub mod performance;

/// Plugin descriptors.
pub mod plugin;

/// `tracing` subscriber setup.
pub mod subscriber;

/// The plugin host.
pub mod system;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::debugger::{DebugFilter, DebugRecord, Debugger, DebuggerOptions};
    pub use crate::error::PluginError;
    pub use crate::hook::{Hook, Listener};
    pub use crate::lifecycle::Lifecycle;
    pub use crate::performance::{Correlation, MonitorHook, Performance, PerformanceEvent};
    pub use crate::plugin::{Plugin, PluginApis};
    pub use crate::subscriber::{TracingConfig, TracingFormat};
    pub use crate::system::{EachSubscription, ErrorSubscription, PluginSystem};
}

// Re-export key types at crate root for convenience
pub use debugger::{Debugger, DebuggerOptions};
pub use error::PluginError;
pub use hook::{Hook, Listener};
pub use lifecycle::Lifecycle;
pub use performance::{Performance, PerformanceEvent};
pub use plugin::Plugin;
pub use system::PluginSystem;
