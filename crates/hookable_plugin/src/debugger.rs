//! Invocation debugger.
//!
//! A [`Debugger`] observes the `before` and `after` meta-hooks of every hook
//! in a [`PluginSystem`], measures each invocation, and hands a
//! [`DebugRecord`] to a receiver or, by default, to `tracing`.
//!
//! # Example
//!
//! ```ignore
//! let debugger = system.debug(
//!     DebuggerOptions::new()
//!         .with_tag("app")
//!         .with_prefix_filter("internal_")
//!         .with_plugin_time(true),
//! )?;
//!
//! // ...
//! debugger.close();
//! ```

use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use hookable_hooks::{EachEvent, ListenerId, TaskId};

use crate::error::PluginError;
use crate::performance::{MonitorHook, Performance, PerformanceEvent};
use crate::system::{EachSubscription, PluginSystem, WeakSystem};

/// Callback receiving debug records.
pub type DebugReceiver = Arc<dyn Fn(&DebugRecord) + Send + Sync>;

/// Callback receiving events from a linked correlator.
pub type PerformanceReceiver = Arc<dyn Fn(&PerformanceEvent) + Send + Sync>;

/// Maximum number of invocations a debugger tracks between `before` and
/// `after`.
///
/// An emission that fails before `after` fires (a waterfall returning
/// [`HookError::MalformedReturn`](hookable_hooks::HookError::MalformedReturn))
/// leaves its start time behind. Past this bound the oldest task is dropped.
pub const MAX_PENDING: usize = 1024;

type Starts = Arc<Mutex<BTreeMap<TaskId, Instant>>>;

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// One observed invocation.
#[derive(Debug, Clone)]
pub struct DebugRecord {
    /// Tag from [`DebuggerOptions::with_tag`].
    pub tag: Option<String>,
    /// Time between the `before` and `after` events.
    pub time: Duration,
    /// The `after` event.
    pub event: EachEvent,
}

/// Decides which invocations a debugger skips.
#[derive(Clone)]
pub enum DebugFilter {
    /// Skip hooks whose name starts with the prefix.
    Prefix(String),
    /// Skip records for which the predicate returns `true`.
    Predicate(Arc<dyn Fn(&DebugRecord) -> bool + Send + Sync>),
}

impl fmt::Debug for DebugFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefix(prefix) => f.debug_tuple("Prefix").field(prefix).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Configuration for [`PluginSystem::debug`].
#[derive(Clone, Default)]
pub struct DebuggerOptions {
    tag: Option<String>,
    filter: Option<DebugFilter>,
    receiver: Option<DebugReceiver>,
    log_plugin_time: bool,
    performance: Option<Performance>,
    performance_receiver: Option<PerformanceReceiver>,
}

impl DebuggerOptions {
    /// Creates options that log every invocation to `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels every record.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Skips hooks whose name starts with `prefix`.
    #[must_use]
    pub fn with_prefix_filter(mut self, prefix: impl Into<String>) -> Self {
        self.filter = Some(DebugFilter::Prefix(prefix.into()));
        self
    }

    /// Skips records for which `predicate` returns `true`.
    #[must_use]
    pub fn with_filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&DebugRecord) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(DebugFilter::Predicate(Arc::new(predicate)));
        self
    }

    /// Sends records to `receiver` instead of `tracing`.
    #[must_use]
    pub fn with_receiver<F>(mut self, receiver: F) -> Self
    where
        F: Fn(&DebugRecord) + Send + Sync + 'static,
    {
        self.receiver = Some(Arc::new(receiver));
        self
    }

    /// Also logs per-plugin listener time with the default sink.
    #[must_use]
    pub fn with_plugin_time(mut self, enabled: bool) -> Self {
        self.log_plugin_time = enabled;
        self
    }

    /// Forwards every present and future monitor of `performance`.
    #[must_use]
    pub fn with_performance(mut self, performance: Performance) -> Self {
        self.performance = Some(performance);
        self
    }

    /// Sends forwarded performance events to `receiver` instead of `tracing`.
    #[must_use]
    pub fn with_performance_receiver<F>(mut self, receiver: F) -> Self
    where
        F: Fn(&PerformanceEvent) + Send + Sync + 'static,
    {
        self.performance_receiver = Some(Arc::new(receiver));
        self
    }
}

impl fmt::Debug for DebuggerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebuggerOptions")
            .field("tag", &self.tag)
            .field("filter", &self.filter)
            .field("receiver", &self.receiver.is_some())
            .field("log_plugin_time", &self.log_plugin_time)
            .field("performance", &self.performance)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sink
// ─────────────────────────────────────────────────────────────────────────────

struct Sink {
    tag: Option<String>,
    filter: Option<DebugFilter>,
    receiver: Option<DebugReceiver>,
    log_plugin_time: bool,
}

impl Sink {
    fn skips_name(&self, name: &str) -> bool {
        matches!(
            &self.filter,
            Some(DebugFilter::Prefix(prefix)) if name.starts_with(prefix.as_str())
        )
    }

    fn skips_record(&self, record: &DebugRecord) -> bool {
        matches!(&self.filter, Some(DebugFilter::Predicate(predicate)) if predicate(record))
    }

    fn deliver(&self, record: &DebugRecord) {
        if let Some(receiver) = &self.receiver {
            receiver(record);
            return;
        }

        let event = &record.event;
        tracing::info!(
            tag = record.tag.as_deref(),
            hook = %event.name,
            kind = %event.kind,
            task = %event.id,
            elapsed = ?record.time,
            args = %json(&event.args),
            context = %json(&event.context),
            "hook invocation"
        );
        if self.log_plugin_time {
            for (plugin, elapsed) in &event.plugin_exec_time {
                tracing::info!(
                    tag = record.tag.as_deref(),
                    hook = %event.name,
                    plugin = %plugin,
                    elapsed = ?elapsed,
                    "plugin time"
                );
            }
        }
    }
}

fn json(value: &impl Serialize) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn log_performance(event: &PerformanceEvent) {
    tracing::info!(
        start = %event.events.0,
        end = %event.events.1,
        elapsed = ?event.time,
        value = %event.value,
        "performance"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Debugger
// ─────────────────────────────────────────────────────────────────────────────

/// An attached debugger. Detach with [`close`](Self::close).
pub struct Debugger {
    system: WeakSystem,
    starts: Starts,
    links: Mutex<Option<Links>>,
}

struct Links {
    before: EachSubscription,
    after: EachSubscription,
    performance: Option<PerformanceLink>,
}

struct PerformanceLink {
    performance: Performance,
    watcher: u64,
    listeners: Arc<Mutex<Vec<(MonitorHook, ListenerId)>>>,
}

impl Debugger {
    pub(crate) fn attach(
        system: &PluginSystem,
        options: DebuggerOptions,
    ) -> Result<Self, PluginError> {
        let clock = system.clock();
        let starts: Starts = Arc::default();

        let before = {
            let (starts, clock) = (Arc::clone(&starts), clock.clone());
            system.before_each(move |event| {
                let mut starts = starts.lock();
                starts.insert(event.id, clock.now());
                if starts.len() > MAX_PENDING
                    && let Some((task, _)) = starts.pop_first()
                {
                    tracing::debug!(%task, "unfinished invocation dropped");
                }
            })?
        };

        let sink = Sink {
            tag: options.tag,
            filter: options.filter,
            receiver: options.receiver,
            log_plugin_time: options.log_plugin_time,
        };
        let after = {
            let starts = Arc::clone(&starts);
            let subscribed = system.after_each(move |event| {
                let started = starts.lock().remove(&event.id);
                if sink.skips_name(&event.name) {
                    return;
                }
                let record = DebugRecord {
                    tag: sink.tag.clone(),
                    time: started.map(|at| clock.elapsed_since(at)).unwrap_or_default(),
                    event: event.clone(),
                };
                if !sink.skips_record(&record) {
                    sink.deliver(&record);
                }
            });
            match subscribed {
                Ok(after) => after,
                Err(err) => {
                    before.unsubscribe();
                    return Err(err);
                }
            }
        };

        let performance = options
            .performance
            .map(|performance| link_performance(performance, options.performance_receiver));

        system.debugger_opened();
        tracing::debug!(debuggers = system.debug_count(), "debugger attached");

        Ok(Self {
            system: system.downgrade(),
            starts,
            links: Mutex::new(Some(Links {
                before,
                after,
                performance,
            })),
        })
    }

    /// Detaches from every hook and linked correlator. Idempotent.
    pub fn close(&self) {
        let Some(links) = self.links.lock().take() else {
            return;
        };
        links.before.unsubscribe();
        links.after.unsubscribe();
        if let Some(link) = links.performance {
            link.performance.unwatch(link.watcher);
            for (hook, id) in link.listeners.lock().drain(..) {
                hook.remove(id).ok();
            }
        }
        self.starts.lock().clear();

        if let Some(system) = self.system.upgrade() {
            system.debugger_closed();
            tracing::debug!(debuggers = system.debug_count(), "debugger closed");
        }
    }

    /// Returns `true` once [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.links.lock().is_none()
    }

    /// Returns the number of invocations seen on `before` but not yet on
    /// `after`. Never exceeds [`MAX_PENDING`].
    #[must_use]
    pub fn pending(&self) -> usize {
        self.starts.lock().len()
    }
}

impl fmt::Debug for Debugger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debugger")
            .field("closed", &self.is_closed())
            .field("pending", &self.pending())
            .finish()
    }
}

fn link_performance(
    performance: Performance,
    receiver: Option<PerformanceReceiver>,
) -> PerformanceLink {
    let listeners: Arc<Mutex<Vec<(MonitorHook, ListenerId)>>> = Arc::default();
    let registered = Arc::clone(&listeners);

    let watcher = performance.watch(Arc::new(move |hook: &MonitorHook| {
        let receiver = receiver.clone();
        let forwarded = hook.on(move |_, event| match &receiver {
            Some(receiver) => receiver(event),
            None => log_performance(event),
        });
        match forwarded {
            Ok(id) => registered.lock().push((hook.clone(), id)),
            Err(err) => tracing::debug!(%err, "monitor hook not forwarded"),
        }
    }));

    PerformanceLink {
        performance,
        watcher,
        listeners,
    }
}
