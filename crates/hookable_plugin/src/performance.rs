//! Cross-hook performance correlation.
//!
//! A [`Performance`] correlator registers itself as a plugin that observes
//! every lifecycle key. Each [`monitor`](Performance::monitor) task pairs a
//! start key with an end key: when the start key fires, a correlation value
//! is extracted from its arguments with a [`Path`] and timestamped; when the
//! end key later fires with the same correlation value, the elapsed time is
//! delivered as a [`PerformanceEvent`] on the task's notification hook.
//!
//! Primitive correlation values match by their string form. Objects and
//! arrays match by identity only, so two equal but distinct objects never
//! correlate.
//!
//! # Example
//!
//! ```ignore
//! let performance = system.performance("0.id")?;
//!
//! performance
//!     .monitor("request", "response")?
//!     .on(|_, event| tracing::info!(elapsed = ?event.time, "round trip"))?;
//!
//! // Later
//! performance.close();
//! ```

use core::fmt;
use core::hash::{Hash, Hasher};
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

use hookable_hooks::clock::Clock;
use hookable_hooks::path::Path;
use hookable_hooks::{Args, SyncHook, Value};

use crate::error::PluginError;
use crate::hook::Listener;
use crate::plugin::Plugin;
use crate::system::{PluginSystem, WeakSystem};

/// Name prefix of the plugin each correlator registers.
pub const PLUGIN_PREFIX: &str = "performance_plugin_";

/// Notification hook returned by [`Performance::monitor`].
pub type MonitorHook = SyncHook<PerformanceEvent>;

pub(crate) type Watcher = Arc<dyn Fn(&MonitorHook) + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// PerformanceEvent
// ─────────────────────────────────────────────────────────────────────────────

/// A matched start/end pair.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceEvent {
    /// Time between the start and end invocations.
    pub time: Duration,
    /// The correlation value both invocations shared.
    pub value: Value,
    /// Arguments of the end invocation.
    pub end_args: Args,
    /// Context of the end hook.
    pub end_context: Value,
    /// The `(start, end)` lifecycle keys.
    pub events: (String, String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Correlation
// ─────────────────────────────────────────────────────────────────────────────

/// Key under which start timestamps are recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Correlation {
    /// A primitive, keyed by its string form.
    Native(String),
    /// An object or array, keyed by identity.
    Shared(RefKey),
}

impl Correlation {
    /// Classifies a correlation value.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        if value.is_reference() {
            Self::Shared(RefKey(value.clone()))
        } else {
            Self::Native(value.to_string())
        }
    }
}

/// Identity-keyed handle to an object or array value.
///
/// Holding the key keeps the referent alive until the correlator is closed.
#[derive(Clone)]
pub struct RefKey(Value);

impl RefKey {
    /// Returns the referenced value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl PartialEq for RefKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.same(&other.0)
    }
}

impl Eq for RefKey {}

impl Hash for RefKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.identity().hash(state);
    }
}

impl fmt::Debug for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefKey({:#x})", self.0.identity().unwrap_or_default())
    }
}

/// Start timestamps, partitioned by correlation kind.
#[derive(Default)]
struct Records {
    native: HashMap<String, HashMap<String, Instant>>,
    shared: HashMap<RefKey, HashMap<String, Instant>>,
}

impl Records {
    fn slot(&self, correlation: &Correlation) -> Option<&HashMap<String, Instant>> {
        match correlation {
            Correlation::Native(key) => self.native.get(key),
            Correlation::Shared(key) => self.shared.get(key),
        }
    }

    fn lookup(&self, correlation: &Correlation, key: &str) -> Option<Instant> {
        self.slot(correlation)?.get(key).copied()
    }

    fn stamp(&mut self, correlation: Correlation, key: String, at: Instant) {
        let slot = match correlation {
            Correlation::Native(native) => self.native.entry(native).or_default(),
            Correlation::Shared(shared) => self.shared.entry(shared).or_default(),
        };
        slot.insert(key, at);
    }

    fn clear(&mut self) {
        self.native.clear();
        self.shared.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Performance
// ─────────────────────────────────────────────────────────────────────────────

/// Correlates invocations of pairs of lifecycle keys.
///
/// Created by [`PluginSystem::performance`]. Handles are cheap to clone and
/// clones share state.
#[derive(Clone)]
pub struct Performance {
    inner: Arc<PerfInner>,
}

struct PerfInner {
    plugin_name: String,
    default_path: Path,
    clock: Clock,
    system: WeakSystem,
    closed: AtomicBool,
    state: Mutex<PerfState>,
}

#[derive(Default)]
struct PerfState {
    next_task: u64,
    tasks: IndexMap<u64, MonitorTask>,
    records: Records,
    next_watcher: u64,
    watchers: Vec<(u64, Watcher)>,
}

struct MonitorTask {
    start: String,
    end: String,
    conditions: HashMap<String, Path>,
    hook: MonitorHook,
}

impl Performance {
    /// Creates a correlator and registers its observing plugin on `system`.
    pub(crate) fn install(
        system: &PluginSystem,
        default_path: Path,
    ) -> Result<Self, PluginError> {
        let performance = Self {
            inner: Arc::new(PerfInner {
                plugin_name: format!("{PLUGIN_PREFIX}{}", nanoid::nanoid!()),
                default_path,
                clock: system.clock(),
                system: system.downgrade(),
                closed: AtomicBool::new(false),
                state: Mutex::new(PerfState::default()),
            }),
        };

        let mut plugin = Plugin::new(performance.inner.plugin_name.clone());
        for (key, hook) in system.lifecycle().iter() {
            let inner = Arc::clone(&performance.inner);
            let observed = key.to_string();
            plugin = plugin.with_hook(
                key,
                Listener::observe(hook.kind(), move |context, args| {
                    inner.observe(&observed, context, args);
                }),
            );
        }
        system.use_plugin(plugin)?;

        tracing::debug!(
            plugin = %performance.inner.plugin_name,
            path = %performance.inner.default_path,
            "performance correlator installed"
        );
        Ok(performance)
    }

    /// Starts a monitor task between `start` and `end` using the default
    /// correlation path.
    ///
    /// # Errors
    ///
    /// - [`PluginError::Closed`] if the correlator has been closed
    /// - [`PluginError::UnknownHook`] if either key is not declared
    pub fn monitor(&self, start: &str, end: &str) -> Result<MonitorHook, PluginError> {
        self.monitor_with(start, end, core::iter::empty::<(&str, &str)>())
    }

    /// Starts a monitor task with per-key correlation paths. Keys without an
    /// entry in `conditions` use the default path.
    ///
    /// # Errors
    ///
    /// - [`PluginError::Closed`] if the correlator has been closed
    /// - [`PluginError::UnknownHook`] if either key is not declared
    /// - [`PluginError::Path`] if a condition path does not parse
    pub fn monitor_with<I, K, P>(
        &self,
        start: &str,
        end: &str,
        conditions: I,
    ) -> Result<MonitorHook, PluginError>
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: AsRef<str>,
    {
        if self.is_closed() {
            return Err(PluginError::Closed);
        }
        if let Some(system) = self.inner.system.upgrade() {
            let lifecycle = system.lifecycle();
            let missing = [start, end].into_iter().find(|key| !lifecycle.contains(key));
            if let Some(missing) = missing {
                return Err(PluginError::UnknownHook {
                    hook: missing.to_string(),
                    plugin: self.inner.plugin_name.clone(),
                });
            }
        }
        let conditions = conditions
            .into_iter()
            .map(|(key, path)| Ok((key.into(), Path::parse(path.as_ref())?)))
            .collect::<Result<HashMap<String, Path>, PluginError>>()?;

        let hook = MonitorHook::new();
        hook.set_name(&format!("{start}->{end}"));

        let watchers: Vec<Watcher> = {
            let mut state = self.inner.state.lock();
            let id = state.next_task;
            state.next_task += 1;
            state.tasks.insert(
                id,
                MonitorTask {
                    start: start.to_string(),
                    end: end.to_string(),
                    conditions,
                    hook: hook.clone(),
                },
            );
            state.watchers.iter().map(|(_, w)| Arc::clone(w)).collect()
        };
        for watcher in watchers {
            watcher(&hook);
        }

        tracing::debug!(start, end, "performance monitor added");
        Ok(hook)
    }

    /// Stops correlation, drops every record and monitor task, and removes
    /// the observing plugin. Idempotent.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let tasks = {
            let mut state = self.inner.state.lock();
            state.records.clear();
            state.watchers.clear();
            core::mem::take(&mut state.tasks)
        };
        for task in tasks.values() {
            if let Err(err) = task.hook.remove_all() {
                tracing::debug!(%err, "monitor listeners left in place");
            }
        }
        if let Some(system) = self.inner.system.upgrade() {
            if let Err(err) = system.remove_plugin(&self.inner.plugin_name) {
                tracing::debug!(%err, "correlator plugin left in place");
            }
            system.release_performance(self);
        }
        tracing::debug!(plugin = %self.inner.plugin_name, "performance correlator closed");
    }

    /// Returns `true` once [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Returns the name of the plugin this correlator registered.
    #[must_use]
    pub fn plugin_name(&self) -> &str {
        &self.inner.plugin_name
    }

    /// Returns the default correlation path.
    #[must_use]
    pub fn default_path(&self) -> &Path {
        &self.inner.default_path
    }

    /// Returns the number of active monitor tasks.
    #[must_use]
    pub fn monitor_count(&self) -> usize {
        self.inner.state.lock().tasks.len()
    }

    /// Returns `true` if both handles refer to the same correlator.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Calls `watcher` with every current and future monitor hook until
    /// [`unwatch`](Self::unwatch) is called with the returned id.
    pub(crate) fn watch(&self, watcher: Watcher) -> u64 {
        let (id, hooks) = {
            let mut state = self.inner.state.lock();
            let id = state.next_watcher;
            state.next_watcher += 1;
            state.watchers.push((id, Arc::clone(&watcher)));
            let hooks: Vec<MonitorHook> =
                state.tasks.values().map(|task| task.hook.clone()).collect();
            (id, hooks)
        };
        for hook in &hooks {
            watcher(hook);
        }
        id
    }

    pub(crate) fn unwatch(&self, id: u64) {
        self.inner.state.lock().watchers.retain(|(w, _)| *w != id);
    }
}

impl PerfInner {
    /// Handles one invocation of lifecycle key `key`.
    ///
    /// For each task the end role is checked before the start role is
    /// recorded, so a task monitoring a key against itself measures the gap
    /// between consecutive invocations.
    fn observe(&self, key: &str, context: &Value, args: &Args) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let now = self.clock.now();

        let hits = {
            let mut state = self.state.lock();
            let PerfState { tasks, records, .. } = &mut *state;
            let mut hits = Vec::new();

            for (id, task) in tasks.iter() {
                let path = task.conditions.get(key).unwrap_or(&self.default_path);
                let record = format!("{id}_{}", task.start);

                if task.end == key
                    && let Some(value) = path.resolve(args)
                    && let Some(started) = records.lookup(&Correlation::of(&value), &record)
                {
                    hits.push((
                        task.hook.clone(),
                        PerformanceEvent {
                            time: now.saturating_duration_since(started),
                            value,
                            end_args: args.clone(),
                            end_context: context.clone(),
                            events: (task.start.clone(), task.end.clone()),
                        },
                    ));
                }

                if task.start == key
                    && let Some(value) = path.resolve(args)
                {
                    records.stamp(Correlation::of(&value), record, now);
                }
            }
            hits
        };

        for (hook, event) in hits {
            hook.emit(event);
        }
    }
}

impl fmt::Debug for Performance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Performance")
            .field("plugin", &self.inner.plugin_name)
            .field("default_path", &self.inner.default_path)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
