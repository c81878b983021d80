//! Concurrent and re-entrant access tests for `hookable_hooks`.

mod test_utils;

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use hookable_hooks::{Args, ListenerId, SyncHook, TaskId};
use parking_lot::Mutex;
use test_utils::Recorder;

/// A once-listener fires exactly once even when many threads emit at the
/// same moment.
#[test]
fn once_listener_fires_once_under_contention() {
    let hook: SyncHook = SyncHook::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let f = fired.clone();
    hook.once(move |_, _| {
        f.fetch_add(1, Ordering::SeqCst);
    })
    .expect("registration should succeed");

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let hook = hook.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                hook.emit(Args::new());
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(hook.is_empty());
}

/// Task ids allocated from different threads never collide.
#[test]
fn task_ids_are_unique_across_threads() {
    let hook: SyncHook = SyncHook::new();
    let ids: Arc<Mutex<Vec<TaskId>>> = Arc::default();
    hook.on(|_, _| ()).expect("registration should succeed");
    let i = ids.clone();
    hook.before()
        .on(move |_, event| i.lock().push(event.id))
        .expect("registration should succeed");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let hook = hook.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    hook.emit(Args::new());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let mut ids = ids.lock().clone();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 200);
}

/// Registering from inside a listener affects the next emission only.
#[test]
fn registration_during_emission_applies_next_time() {
    let hook: SyncHook = SyncHook::new();
    let recorder = Recorder::new();

    let (h, r) = (hook.clone(), recorder.clone());
    hook.once(move |_, _| {
        r.push("outer");
        let inner = r.clone();
        h.on(move |_, _| inner.push("inner"))
            .expect("registration should succeed");
    })
    .expect("registration should succeed");

    hook.emit(Args::new());
    assert_eq!(recorder.entries(), vec!["outer"]);

    hook.emit(Args::new());
    assert_eq!(recorder.entries(), vec!["outer", "inner"]);
}

/// A listener removing a later sibling does not stop the sibling from
/// running in the current emission.
#[test]
fn removal_during_emission_applies_next_time() {
    let hook: SyncHook = SyncHook::new();
    let recorder = Recorder::new();
    let victim: Arc<Mutex<Option<ListenerId>>> = Arc::default();

    let (h, v) = (hook.clone(), victim.clone());
    hook.on(move |_, _| {
        if let Some(id) = v.lock().take() {
            h.remove(id).expect("unlocked");
        }
    })
    .expect("registration should succeed");
    let r = recorder.clone();
    let id = hook
        .on(move |_, _| r.push("victim"))
        .expect("registration should succeed");
    *victim.lock() = Some(id);

    hook.emit(Args::new());
    hook.emit(Args::new());

    assert_eq!(recorder.entries(), vec!["victim"]);
}
