//! An in-process extensibility kernel: lifecycle hooks, plugins, and
//! cross-hook performance correlation.
//!

pub use hookable_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use hookable_internal::prelude::*;
}
