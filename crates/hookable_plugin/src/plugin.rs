//! Plugin descriptors.
//!
//! A [`Plugin`] is plain data: a name, an optional version, the listeners it
//! contributes per lifecycle key, and an optional API object other plugins
//! can look up by name.
//!
//! # Example
//!
//! ```ignore
//! use hookable_plugin::{Listener, Plugin};
//!
//! let plugin = Plugin::new("auth")
//!     .with_version("1.2.0")
//!     .with_hook("request", Listener::waterfall(|_, data| Ok(data)))
//!     .with_once_hook("init", Listener::sync(|_, _| tracing::info!("auth ready")))
//!     .with_apis(AuthApi::default());
//! ```

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::hook::Listener;

/// Type-erased API object exposed by a plugin.
pub type PluginApis = Arc<dyn Any + Send + Sync>;

/// A named bundle of lifecycle listeners.
#[derive(Clone)]
pub struct Plugin {
    name: String,
    version: Option<String>,
    hooks: IndexMap<String, Listener>,
    once_hooks: IndexMap<String, Listener>,
    apis: Option<PluginApis>,
}

impl Plugin {
    /// Creates a plugin with no listeners.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            hooks: IndexMap::new(),
            once_hooks: IndexMap::new(),
            apis: None,
        }
    }

    /// Sets the plugin version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Adds a listener for the lifecycle key `hook`. A later listener for the
    /// same key replaces the earlier one.
    #[must_use]
    pub fn with_hook(mut self, hook: impl Into<String>, listener: Listener) -> Self {
        self.hooks.insert(hook.into(), listener);
        self
    }

    /// Adds a listener that fires on the first emission of `hook` only.
    #[must_use]
    pub fn with_once_hook(mut self, hook: impl Into<String>, listener: Listener) -> Self {
        self.once_hooks.insert(hook.into(), listener);
        self
    }

    /// Attaches an API object retrievable through
    /// [`PluginSystem::plugin_apis`](crate::PluginSystem::plugin_apis).
    #[must_use]
    pub fn with_apis<T: Any + Send + Sync>(mut self, apis: T) -> Self {
        self.apis = Some(Arc::new(apis));
        self
    }

    /// Returns the plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the plugin version, if set.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Returns the persistent listeners by lifecycle key.
    #[must_use]
    pub fn hooks(&self) -> &IndexMap<String, Listener> {
        &self.hooks
    }

    /// Returns the once-listeners by lifecycle key.
    #[must_use]
    pub fn once_hooks(&self) -> &IndexMap<String, Listener> {
        &self.once_hooks
    }

    /// Returns the type-erased API object, if any.
    #[must_use]
    pub fn apis(&self) -> Option<&PluginApis> {
        self.apis.as_ref()
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("once_hooks", &self.once_hooks.keys().collect::<Vec<_>>())
            .field("apis", &self.apis.is_some())
            .finish()
    }
}
