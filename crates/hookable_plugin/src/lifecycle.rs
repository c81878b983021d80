//! Named collection of hooks owned by a plugin system.

use indexmap::IndexMap;

use hookable_hooks::{AsyncHook, AsyncParallelHook, AsyncWaterfallHook, SyncHook, SyncWaterfallHook};

use crate::error::PluginError;
use crate::hook::Hook;

/// Insertion-ordered map from lifecycle key to hook.
///
/// Inserting a hook renames it to its key, so meta events and error events
/// carry the lifecycle key as the hook name. Cloning shares the hooks.
///
/// # Example
///
/// ```ignore
/// let lifecycle = Lifecycle::new()
///     .with("init", SyncHook::new())?
///     .with("request", AsyncWaterfallHook::new())?;
///
/// let system = PluginSystem::new(lifecycle);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    hooks: IndexMap<String, Hook>,
}

impl Lifecycle {
    /// Creates an empty lifecycle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `hook` under `name`, builder style.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::DuplicateHook`] if `name` is taken.
    pub fn with(mut self, name: &str, hook: impl Into<Hook>) -> Result<Self, PluginError> {
        self.insert(name, hook)?;
        Ok(self)
    }

    /// Adds `hook` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::DuplicateHook`] if `name` is taken.
    pub fn insert(&mut self, name: &str, hook: impl Into<Hook>) -> Result<(), PluginError> {
        if self.hooks.contains_key(name) {
            return Err(PluginError::DuplicateHook(name.to_string()));
        }
        let hook = hook.into();
        hook.set_name(name);
        self.hooks.insert(name.to_string(), hook);
        Ok(())
    }

    /// Returns the hook under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Hook> {
        self.hooks.get(name)
    }

    /// Returns the [`SyncHook`] under `name`, if present with that strategy.
    #[must_use]
    pub fn sync(&self, name: &str) -> Option<&SyncHook> {
        self.get(name).and_then(Hook::as_sync)
    }

    /// Returns the [`AsyncHook`] under `name`, if present with that strategy.
    #[must_use]
    pub fn series(&self, name: &str) -> Option<&AsyncHook> {
        self.get(name).and_then(Hook::as_series)
    }

    /// Returns the [`AsyncParallelHook`] under `name`, if present with that
    /// strategy.
    #[must_use]
    pub fn parallel(&self, name: &str) -> Option<&AsyncParallelHook> {
        self.get(name).and_then(Hook::as_parallel)
    }

    /// Returns the [`SyncWaterfallHook`] under `name`, if present with that
    /// strategy.
    #[must_use]
    pub fn waterfall(&self, name: &str) -> Option<&SyncWaterfallHook> {
        self.get(name).and_then(Hook::as_waterfall)
    }

    /// Returns the [`AsyncWaterfallHook`] under `name`, if present with that
    /// strategy.
    #[must_use]
    pub fn async_waterfall(&self, name: &str) -> Option<&AsyncWaterfallHook> {
        self.get(name).and_then(Hook::as_async_waterfall)
    }

    /// Returns `true` if a hook is declared under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// Iterates over lifecycle keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }

    /// Iterates over `(key, hook)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Hook)> {
        self.hooks.iter().map(|(name, hook)| (name.as_str(), hook))
    }

    /// Returns the number of hooks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns `true` if no hooks are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
