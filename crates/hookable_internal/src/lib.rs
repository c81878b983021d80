//! # Hookable Internal Library
//!
//! Re-exports the core hookable crates for convenience.

/// Layer 1: Hook strategies and instrumentation.
pub use hookable_hooks;

/// Layer 2: Lifecycles, plugins, and the plugin system.
pub use hookable_plugin;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use hookable_hooks::prelude::*;
    pub use hookable_plugin::prelude::*;
}
