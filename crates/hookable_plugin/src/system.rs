//! The plugin host.
//!
//! A [`PluginSystem`] owns a [`Lifecycle`] and the plugins registered into
//! it. Registering a plugin subscribes each of its listeners to the matching
//! hook, tagged with the plugin name so per-invocation timings and removal
//! are attributed to the plugin.
//!
//! # Example
//!
//! ```ignore
//! use hookable_plugin::{Lifecycle, Listener, Plugin, PluginSystem};
//! use hookable_hooks::{SyncHook, AsyncWaterfallHook};
//!
//! let system = PluginSystem::new(
//!     Lifecycle::new()
//!         .with("init", SyncHook::new())?
//!         .with("request", AsyncWaterfallHook::new())?,
//! );
//!
//! system.use_plugin(
//!     Plugin::new("logger").with_hook("init", Listener::sync(|_, args| {
//!         tracing::info!(?args, "init");
//!     })),
//! )?;
//!
//! let _debugger = system.debug(DebuggerOptions::new().with_tag("app"))?;
//! system.lock();
//!
//! system.lifecycle().sync("init").expect("declared").emit(vec![]);
//! ```

use core::any::Any;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use hookable_hooks::clock::Clock;
use hookable_hooks::meta::MetaHook;
use hookable_hooks::path::Path;
use hookable_hooks::sync::SyncFn;
use hookable_hooks::{EachEvent, ExecErrorEvent, ListenerId, ListenerResult, Unsubscribe, Value};

use crate::debugger::{Debugger, DebuggerOptions};
use crate::error::PluginError;
use crate::hook::{Hook, Listener};
use crate::lifecycle::Lifecycle;
use crate::performance::Performance;
use crate::plugin::Plugin;

// ─────────────────────────────────────────────────────────────────────────────
// PluginSystem
// ─────────────────────────────────────────────────────────────────────────────

/// Host for a lifecycle and its plugins.
///
/// Handles are cheap to clone and clones share state.
#[derive(Clone)]
pub struct PluginSystem {
    inner: Arc<SystemInner>,
}

struct SystemInner {
    lifecycle: RwLock<Lifecycle>,
    plugins: RwLock<IndexMap<String, Installed>>,
    locked: AtomicBool,
    clock: RwLock<Clock>,
    performances: Mutex<Vec<Performance>>,
    debuggers: AtomicUsize,
}

/// A registered plugin and the listeners it subscribed.
struct Installed {
    plugin: Arc<Plugin>,
    listeners: Vec<(Hook, ListenerId)>,
}

impl PluginSystem {
    /// Version of this crate.
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    /// Creates an unlocked system with no plugins.
    #[must_use]
    pub fn new(lifecycle: Lifecycle) -> Self {
        Self {
            inner: Arc::new(SystemInner {
                lifecycle: RwLock::new(lifecycle),
                plugins: RwLock::new(IndexMap::new()),
                locked: AtomicBool::new(false),
                clock: RwLock::new(Clock::default()),
                performances: Mutex::new(Vec::new()),
                debuggers: AtomicUsize::new(0),
            }),
        }
    }

    /// Replaces the clock used by performance correlators and debuggers.
    ///
    /// Hooks keep their own clocks for listener timing.
    #[must_use]
    pub fn with_clock(self, clock: Clock) -> Self {
        *self.inner.clock.write() = clock;
        self
    }

    /// Returns the clock used by correlators and debuggers.
    #[must_use]
    pub fn clock(&self) -> Clock {
        self.inner.clock.read().clone()
    }

    /// Returns a handle to the lifecycle. Hooks in it are shared with the
    /// system.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle.read().clone()
    }

    /// Returns the hook declared under `name`.
    #[must_use]
    pub fn hook(&self, name: &str) -> Option<Hook> {
        self.inner.lifecycle.read().get(name).cloned()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Plugins
    // ─────────────────────────────────────────────────────────────────────

    /// Registers a plugin, subscribing its listeners tagged with its name.
    ///
    /// Registering a name that is already present logs a warning and returns
    /// the plugin registered first.
    ///
    /// # Errors
    ///
    /// - [`PluginError::MissingName`] if the plugin name is empty
    /// - [`PluginError::Locked`] while the system is locked
    /// - [`PluginError::UnknownHook`] if a listener targets an undeclared key
    /// - [`PluginError::ListenerKind`] if a listener does not fit its hook
    ///
    /// No listener is left subscribed when an error is returned.
    pub fn use_plugin(&self, plugin: Plugin) -> Result<Arc<Plugin>, PluginError> {
        if plugin.name().is_empty() {
            return Err(PluginError::MissingName);
        }
        self.ensure_unlocked()?;

        let mut plugins = self.inner.plugins.write();
        if let Some(existing) = plugins.get(plugin.name()) {
            tracing::warn!(plugin = plugin.name(), "plugin already registered, ignoring");
            return Ok(Arc::clone(&existing.plugin));
        }

        let bindings = self.bind(&plugin)?;
        let mut listeners = Vec::with_capacity(bindings.len());
        for (hook, listener, once) in bindings {
            match hook.register(Some(plugin.name()), listener, once) {
                Ok(id) => listeners.push((hook, id)),
                Err(err) => {
                    for (hook, id) in listeners {
                        hook.remove(id).ok();
                    }
                    return Err(err);
                }
            }
        }

        tracing::debug!(
            plugin = plugin.name(),
            version = plugin.version(),
            listeners = listeners.len(),
            "plugin registered"
        );
        let plugin = Arc::new(plugin);
        plugins.insert(
            plugin.name().to_string(),
            Installed {
                plugin: Arc::clone(&plugin),
                listeners,
            },
        );
        Ok(plugin)
    }

    /// Resolves every listener of `plugin` to its hook, persistent listeners
    /// first, checking keys and strategies.
    fn bind<'p>(
        &self,
        plugin: &'p Plugin,
    ) -> Result<Vec<(Hook, &'p Listener, bool)>, PluginError> {
        let lifecycle = self.inner.lifecycle.read();
        let persistent = plugin.hooks().iter().map(|(key, l)| (key, l, false));
        let once = plugin.once_hooks().iter().map(|(key, l)| (key, l, true));

        persistent
            .chain(once)
            .map(|(key, listener, once)| {
                let hook = lifecycle
                    .get(key)
                    .ok_or_else(|| PluginError::UnknownHook {
                        hook: key.clone(),
                        plugin: plugin.name().to_string(),
                    })?;
                if hook.kind() != listener.kind() {
                    return Err(PluginError::ListenerKind {
                        hook: key.clone(),
                        expected: hook.kind(),
                        found: listener.kind(),
                    });
                }
                Ok((hook.clone(), listener, once))
            })
            .collect()
    }

    /// Unsubscribes every listener of the named plugin and forgets it.
    /// Returns `false` if no such plugin is registered.
    ///
    /// # Errors
    ///
    /// - [`PluginError::MissingName`] if `name` is empty
    /// - [`PluginError::Locked`] while the system is locked
    /// - [`PluginError::Hook`] if one of the plugin's hooks is locked
    pub fn remove_plugin(&self, name: &str) -> Result<bool, PluginError> {
        if name.is_empty() {
            return Err(PluginError::MissingName);
        }
        self.ensure_unlocked()?;

        let mut plugins = self.inner.plugins.write();
        let Some(installed) = plugins.get(name) else {
            return Ok(false);
        };
        for (hook, id) in &installed.listeners {
            hook.remove(*id)?;
        }
        plugins.shift_remove(name);

        tracing::debug!(plugin = name, "plugin removed");
        Ok(true)
    }

    /// Returns the named plugin.
    #[must_use]
    pub fn plugin(&self, name: &str) -> Option<Arc<Plugin>> {
        self.inner
            .plugins
            .read()
            .get(name)
            .map(|installed| Arc::clone(&installed.plugin))
    }

    /// Returns every registered plugin in registration order.
    #[must_use]
    pub fn plugins(&self) -> Vec<Arc<Plugin>> {
        self.inner
            .plugins
            .read()
            .values()
            .map(|installed| Arc::clone(&installed.plugin))
            .collect()
    }

    /// Returns the API object of the named plugin, if it has one of type `T`.
    #[must_use]
    pub fn plugin_apis<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let apis = Arc::clone(self.inner.plugins.read().get(name)?.plugin.apis()?);
        apis.downcast::<T>().ok()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Locking
    // ─────────────────────────────────────────────────────────────────────

    /// Freezes plugin registration and every hook (and meta-hook) in the
    /// lifecycle. Emission is unaffected.
    pub fn lock(&self) {
        self.inner.locked.store(true, Ordering::Release);
        for (_, hook) in self.inner.lifecycle.read().iter() {
            hook.lock();
        }
    }

    /// Reverses [`lock`](Self::lock).
    pub fn unlock(&self) {
        self.inner.locked.store(false, Ordering::Release);
        for (_, hook) in self.inner.lifecycle.read().iter() {
            hook.unlock();
        }
    }

    /// Returns `true` while the system is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::Acquire)
    }

    fn ensure_unlocked(&self) -> Result<(), PluginError> {
        if self.is_locked() {
            return Err(PluginError::Locked);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────────────────

    /// Subscribes `observer` to the `before` meta-hook of every hook.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Hook`] if a hook is locked. Nothing stays
    /// subscribed in that case.
    pub fn before_each<F>(&self, observer: F) -> Result<EachSubscription, PluginError>
    where
        F: Fn(&EachEvent) + Send + Sync + 'static,
    {
        self.subscribe_each(Hook::before, observer)
    }

    /// Subscribes `observer` to the `after` meta-hook of every hook.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Hook`] if a hook is locked. Nothing stays
    /// subscribed in that case.
    pub fn after_each<F>(&self, observer: F) -> Result<EachSubscription, PluginError>
    where
        F: Fn(&EachEvent) + Send + Sync + 'static,
    {
        self.subscribe_each(Hook::after, observer)
    }

    fn subscribe_each<F>(
        &self,
        select: fn(&Hook) -> &MetaHook,
        observer: F,
    ) -> Result<EachSubscription, PluginError>
    where
        F: Fn(&EachEvent) + Send + Sync + 'static,
    {
        let callback: Arc<SyncFn<EachEvent>> =
            Arc::new(move |_: &Value, event: &EachEvent| -> ListenerResult {
                observer(event);
                Ok(())
            });

        let mut subscription = EachSubscription {
            bindings: Vec::new(),
        };
        for (_, hook) in self.inner.lifecycle.read().iter() {
            let meta = select(hook).clone();
            match meta.register(None, Arc::clone(&callback), false) {
                Ok(id) => subscription.bindings.push((meta, id)),
                Err(err) => {
                    subscription.unsubscribe();
                    return Err(err.into());
                }
            }
        }
        Ok(subscription)
    }

    /// Subscribes `observer` to listener failures on every hook.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Hook`] if a hook is locked. Nothing stays
    /// subscribed in that case.
    pub fn listen_error<F>(&self, observer: F) -> Result<ErrorSubscription, PluginError>
    where
        F: Fn(&ExecErrorEvent) + Send + Sync + 'static,
    {
        let observer = Arc::new(observer);
        let mut subscription = ErrorSubscription {
            handles: Vec::new(),
        };
        for (_, hook) in self.inner.lifecycle.read().iter() {
            let observer = Arc::clone(&observer);
            match hook.listen_error(move |event| observer(event)) {
                Ok(handle) => subscription.handles.push(handle),
                Err(err) => {
                    subscription.unsubscribe();
                    return Err(err);
                }
            }
        }
        Ok(subscription)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Composition
    // ─────────────────────────────────────────────────────────────────────

    /// Adopts the hooks and plugins of `other`.
    ///
    /// The hooks are shared, not copied. Inheriting a system into itself is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// - [`PluginError::Locked`] while this system is locked
    /// - [`PluginError::InheritHookConflict`] if a lifecycle key exists in both
    /// - [`PluginError::InheritPluginConflict`] if a plugin name exists in both
    ///
    /// Conflicts are detected before anything is merged.
    pub fn inherit(&self, other: &PluginSystem) -> Result<(), PluginError> {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return Ok(());
        }
        self.ensure_unlocked()?;

        let theirs = other.lifecycle();
        let their_plugins = other.plugins();
        {
            // Same acquisition order as `use_plugin`.
            let plugins = self.inner.plugins.read();
            let mut lifecycle = self.inner.lifecycle.write();
            if let Some(key) = theirs.keys().find(|key| lifecycle.contains(key)) {
                return Err(PluginError::InheritHookConflict(key.to_string()));
            }
            if let Some(plugin) = their_plugins
                .iter()
                .find(|plugin| plugins.contains_key(plugin.name()))
            {
                return Err(PluginError::InheritPluginConflict(plugin.name().to_string()));
            }
            drop(plugins);

            for (key, hook) in theirs.iter() {
                lifecycle.insert(key, hook.clone())?;
            }
        }

        for plugin in their_plugins {
            self.use_plugin(Plugin::clone(&plugin))?;
        }
        tracing::debug!(hooks = theirs.len(), "inherited plugin system");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Performance & debugging
    // ─────────────────────────────────────────────────────────────────────

    /// Creates a performance correlator that extracts correlation values with
    /// `default_path` unless a monitor overrides it per key.
    ///
    /// The correlator observes every hook through a plugin. On an
    /// [`AsyncHook`](hookable_hooks::AsyncHook) its listener settles to
    /// `Continue(Null)`, so it replaces the emitted result when it runs last.
    ///
    /// # Errors
    ///
    /// - [`PluginError::Path`] if `default_path` does not parse
    /// - [`PluginError::Locked`] while the system is locked
    pub fn performance(&self, default_path: &str) -> Result<Performance, PluginError> {
        let path = Path::parse(default_path)?;
        let performance = Performance::install(self, path)?;
        self.inner.performances.lock().push(performance.clone());
        Ok(performance)
    }

    /// Closes every correlator created by [`performance`](Self::performance).
    pub fn remove_performances(&self) {
        let performances = core::mem::take(&mut *self.inner.performances.lock());
        for performance in performances {
            performance.close();
        }
    }

    /// Forgets a closed correlator.
    pub(crate) fn release_performance(&self, performance: &Performance) {
        self.inner
            .performances
            .lock()
            .retain(|p| !p.same(performance));
    }

    /// Attaches a debugger to every hook.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Hook`] if a hook is locked.
    pub fn debug(&self, options: DebuggerOptions) -> Result<Debugger, PluginError> {
        Debugger::attach(self, options)
    }

    /// Returns the number of open debuggers.
    #[must_use]
    pub fn debug_count(&self) -> usize {
        self.inner.debuggers.load(Ordering::Acquire)
    }

    pub(crate) fn debugger_opened(&self) {
        self.inner.debuggers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn debugger_closed(&self) {
        self.inner.debuggers.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn downgrade(&self) -> WeakSystem {
        WeakSystem(Arc::downgrade(&self.inner))
    }
}

impl fmt::Debug for PluginSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSystem")
            .field("hooks", &self.inner.lifecycle.read().keys().collect::<Vec<_>>())
            .field("plugins", &self.inner.plugins.read().keys().collect::<Vec<_>>())
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Non-owning reference to a [`PluginSystem`].
#[derive(Clone)]
pub(crate) struct WeakSystem(Weak<SystemInner>);

impl WeakSystem {
    pub(crate) fn upgrade(&self) -> Option<PluginSystem> {
        self.0.upgrade().map(|inner| PluginSystem { inner })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscriptions
// ─────────────────────────────────────────────────────────────────────────────

/// Handle returned by [`PluginSystem::before_each`] and
/// [`PluginSystem::after_each`].
pub struct EachSubscription {
    bindings: Vec<(MetaHook, ListenerId)>,
}

impl EachSubscription {
    /// Removes the observer from every meta-hook it was added to, returning
    /// how many registrations were removed. Meta-hooks that are locked keep
    /// the observer.
    pub fn unsubscribe(self) -> usize {
        self.bindings
            .into_iter()
            .filter(|(meta, id)| match meta.remove(*id) {
                Ok(removed) => removed,
                Err(err) => {
                    tracing::debug!(%err, "observer left in place");
                    false
                }
            })
            .count()
    }
}

impl fmt::Debug for EachSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EachSubscription")
            .field("hooks", &self.bindings.len())
            .finish()
    }
}

/// Handle returned by [`PluginSystem::listen_error`].
#[derive(Debug)]
pub struct ErrorSubscription {
    handles: Vec<Unsubscribe>,
}

impl ErrorSubscription {
    /// Removes the observer from every hook, returning how many
    /// registrations were removed.
    pub fn unsubscribe(self) -> usize {
        self.handles
            .into_iter()
            .map(Unsubscribe::unsubscribe)
            .filter(|removed| *removed)
            .count()
    }
}
