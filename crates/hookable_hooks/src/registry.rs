//! Ordered listener storage shared by every hook strategy.
//!
//! A [`Registry`] keeps listeners in registration order. Emission works on a
//! snapshot, so listeners may register or remove listeners (including
//! themselves) while an emission is running without affecting it.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a registered listener.
///
/// Returned by registration and accepted by removal. Identifiers are never
/// reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry
// ─────────────────────────────────────────────────────────────────────────────

/// A registered listener and its metadata.
pub(crate) struct Entry<F: ?Sized> {
    pub(crate) id: ListenerId,
    pub(crate) tag: Option<Arc<str>>,
    pub(crate) callback: Arc<F>,
    once: bool,
    claimed: AtomicBool,
}

impl<F: ?Sized> Entry<F> {
    pub(crate) fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub(crate) fn is_once(&self) -> bool {
        self.once
    }

    /// Claims the right to invoke this entry. Always succeeds for regular
    /// listeners; succeeds exactly once for once-listeners.
    pub(crate) fn claim(&self) -> bool {
        !self.once || !self.claimed.swap(true, Ordering::AcqRel)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered set of listeners of callback type `F`.
pub(crate) struct Registry<F: ?Sized> {
    entries: RwLock<Vec<Arc<Entry<F>>>>,
}

impl<F: ?Sized> Registry<F> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Appends a listener.
    ///
    /// Registering the same callback allocation twice returns the id of the
    /// existing entry.
    pub(crate) fn insert(&self, tag: Option<Arc<str>>, callback: Arc<F>, once: bool) -> ListenerId {
        let mut entries = self.entries.write();
        if let Some(existing) = entries
            .iter()
            .find(|e| core::ptr::addr_eq(Arc::as_ptr(&e.callback), Arc::as_ptr(&callback)))
        {
            return existing.id;
        }
        let id = ListenerId::next();
        entries.push(Arc::new(Entry {
            id,
            tag,
            callback,
            once,
            claimed: AtomicBool::new(false),
        }));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    pub(crate) fn remove_tagged(&self, tag: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.tag() != Some(tag));
        before - entries.len()
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<Entry<F>>> {
        self.entries.read().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.entries.read().iter().any(|e| e.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Callback = dyn Fn() -> u8 + Send + Sync;

    fn callback(n: u8) -> Arc<Callback> {
        Arc::new(move || n)
    }

    #[test]
    fn keeps_registration_order() {
        let registry: Registry<Callback> = Registry::new();
        registry.insert(None, callback(1), false);
        registry.insert(None, callback(2), false);
        registry.insert(None, callback(3), false);

        let order: Vec<u8> = registry.snapshot().iter().map(|e| (e.callback)()).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn same_callback_registers_once() {
        let registry: Registry<Callback> = Registry::new();
        let cb = callback(1);

        let a = registry.insert(Some("a".into()), Arc::clone(&cb), false);
        let b = registry.insert(Some("b".into()), cb, false);

        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removal_by_id_and_tag() {
        let registry: Registry<Callback> = Registry::new();
        let keep = registry.insert(Some("keep".into()), callback(1), false);
        let drop = registry.insert(Some("drop".into()), callback(2), false);
        registry.insert(Some("drop".into()), callback(3), false);

        assert!(registry.remove(drop));
        assert!(!registry.remove(drop));
        assert_eq!(registry.remove_tagged("drop"), 1);
        assert!(registry.contains(keep));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn snapshot_is_detached() {
        let registry: Registry<Callback> = Registry::new();
        registry.insert(None, callback(1), false);

        let snapshot = registry.snapshot();
        registry.clear();

        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn once_entries_claim_exactly_once() {
        let registry: Registry<Callback> = Registry::new();
        registry.insert(None, callback(1), true);
        let entry = registry.snapshot().remove(0);

        assert!(entry.is_once());
        assert!(entry.claim());
        assert!(!entry.claim());
    }
}
