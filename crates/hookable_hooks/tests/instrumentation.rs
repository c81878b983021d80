//! Integration tests for invocation instrumentation.
//!
//! Covers the `before`/`after` meta-hook contract shared by every strategy:
//! task id pairing, the empty-registry fast path, and per-tag timing.

mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use hookable_hooks::meta::EachEvent;
use hookable_hooks::{
    Args, AsyncHook, AsyncParallelHook, AsyncWaterfallHook, Flow, HookKind, Step, SyncHook,
    SyncWaterfallHook, TaskId, Value,
};
use parking_lot::Mutex;
use serde_json::json;
use test_utils::{Recorder, args, mock_clock};

type Events = Arc<Mutex<Vec<EachEvent>>>;

fn capture(events: &Events) -> impl Fn(&Value, &EachEvent) + Send + Sync + 'static {
    let events = Arc::clone(events);
    move |_, event| events.lock().push(event.clone())
}

// ═══════════════════════════════════════════════════════════════════════════════
// TASK IDS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn before_and_after_share_a_task_id() {
    let hook: SyncHook = SyncHook::with_context("ctx");
    hook.set_name("load");
    let before: Events = Arc::default();
    let after: Events = Arc::default();

    hook.on(|_, _| ()).expect("registration should succeed");
    hook.before().on(capture(&before)).expect("registration should succeed");
    hook.after().on(capture(&after)).expect("registration should succeed");

    hook.emit(args(["a"]));
    hook.emit(args(["b"]));

    let before = before.lock();
    let after = after.lock();
    assert_eq!(before.len(), 2);
    assert_eq!(after.len(), 2);
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(b.id, a.id);
        assert_eq!(&*b.name, "load");
        assert_eq!(b.kind, HookKind::SyncHook);
        assert_eq!(b.context, Value::from("ctx"));
        assert_eq!(b.args, a.args);
    }
    assert_ne!(before[0].id, before[1].id);
    assert_eq!(before[1].args, args(["b"]));
}

#[test]
fn task_ids_are_unique_across_hooks() {
    let first: SyncHook = SyncHook::new();
    let second: SyncWaterfallHook = SyncWaterfallHook::new();
    let ids: Arc<Mutex<Vec<TaskId>>> = Arc::default();

    first.on(|_, _| ()).expect("registration should succeed");
    second.on(|_, data| Ok(data)).expect("registration should succeed");
    let i = ids.clone();
    first
        .before()
        .on(move |_, event| i.lock().push(event.id))
        .expect("registration should succeed");
    let i = ids.clone();
    second
        .before()
        .on(move |_, event| i.lock().push(event.id))
        .expect("registration should succeed");

    for _ in 0..3 {
        first.emit(Args::new());
        second
            .emit(Value::from(json!({ "k": 1 })))
            .expect("well-formed");
    }

    let mut ids = ids.lock().clone();
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(total, 6);
    assert_eq!(ids.len(), 6);
}

// ═══════════════════════════════════════════════════════════════════════════════
// FAST PATH
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn empty_hooks_emit_no_meta_events() {
    let recorder = Recorder::new();

    let sync: SyncHook = SyncHook::new();
    let series: AsyncHook = AsyncHook::new();
    let parallel: AsyncParallelHook = AsyncParallelHook::new();
    let waterfall = SyncWaterfallHook::new();
    let async_waterfall = AsyncWaterfallHook::new();

    macro_rules! observe {
        ($hook:expr, $label:literal) => {{
            let r = recorder.clone();
            $hook
                .before()
                .on(move |_, _| r.push(concat!($label, ":before")))
                .expect("registration should succeed");
            let r = recorder.clone();
            $hook
                .after()
                .on(move |_, _| r.push(concat!($label, ":after")))
                .expect("registration should succeed");
        }};
    }

    observe!(sync, "sync");
    observe!(series, "series");
    observe!(parallel, "parallel");
    observe!(waterfall, "waterfall");
    observe!(async_waterfall, "async_waterfall");

    sync.emit(Args::new());
    assert_eq!(series.emit(Args::new()).await, Flow::Continue(Value::Null));
    parallel.emit(Args::new()).await;
    let data = Value::from(json!({ "k": 1 }));
    let out = waterfall.emit(data.clone()).expect("well-formed");
    assert!(out.same(&data));
    async_waterfall.emit(data).await.expect("well-formed");

    assert_eq!(recorder.len(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// TIMING
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn exec_time_is_keyed_by_tags_that_ran() {
    let (mock, clock) = mock_clock();
    let hook: SyncHook = SyncHook::new().with_clock(clock);
    let after: Events = Arc::default();

    for (tag, ms) in [("p1", 3), ("p2", 4), ("p1", 2)] {
        let mock = mock.clone();
        hook.on_tagged(tag, move |_, _| mock.advance(Duration::from_millis(ms)))
            .expect("registration should succeed");
    }
    let m = mock.clone();
    hook.on(move |_, _| m.advance(Duration::from_millis(50)))
        .expect("registration should succeed");
    hook.after().on(capture(&after)).expect("registration should succeed");

    hook.emit(Args::new());

    let after = after.lock();
    let timings = &after[0].plugin_exec_time;
    assert_eq!(timings.len(), 2);
    assert_eq!(timings["p1"], Duration::from_millis(5));
    assert_eq!(timings["p2"], Duration::from_millis(4));
}

#[test]
fn no_after_observer_means_no_clock_reads() {
    let (mock, clock) = mock_clock();
    let hook: SyncHook = SyncHook::new().with_clock(clock);
    let ran = Recorder::new();

    let r = ran.clone();
    hook.on_tagged("p1", move |_, _| r.push("p1"))
        .expect("registration should succeed");
    hook.before().on(|_, _| ()).expect("registration should succeed");

    hook.emit(Args::new());

    assert_eq!(ran.entries(), vec!["p1"]);
    assert_eq!(mock.reads(), 0);
}

#[test]
fn before_events_never_carry_timings() {
    let hook: SyncHook = SyncHook::new();
    let before: Events = Arc::default();

    hook.on_tagged("p1", |_, _| ()).expect("registration should succeed");
    hook.before().on(capture(&before)).expect("registration should succeed");
    hook.after().on(|_, _| ()).expect("registration should succeed");

    hook.emit(Args::new());
    assert!(before.lock()[0].plugin_exec_time.is_empty());
}

#[tokio::test]
async fn parallel_timings_cover_each_tag() {
    let hook: AsyncParallelHook = AsyncParallelHook::new();
    let after: Events = Arc::default();

    for tag in ["cache", "db"] {
        hook.on_tagged(tag, |_, _| {
            Step::deferred(async {
                tokio::time::sleep(Duration::from_millis(2)).await;
                Ok(())
            })
        })
        .expect("registration should succeed");
    }
    hook.on(|_, _| Step::ready(())).expect("registration should succeed");
    hook.after().on(capture(&after)).expect("registration should succeed");

    hook.emit(Args::new()).await;

    let after = after.lock();
    let mut tags: Vec<_> = after[0].plugin_exec_time.keys().cloned().collect();
    tags.sort();
    assert_eq!(tags, vec!["cache", "db"]);
    assert!(
        after[0]
            .plugin_exec_time
            .values()
            .all(|d| *d >= Duration::from_millis(2))
    );
}

#[tokio::test]
async fn halted_series_times_only_listeners_that_ran() {
    let hook: AsyncHook = AsyncHook::new();
    let after: Events = Arc::default();

    hook.on_tagged("gate", |_, _| Step::halt())
        .expect("registration should succeed");
    hook.on_tagged("never", |_, _| Step::proceed())
        .expect("registration should succeed");
    hook.after().on(capture(&after)).expect("registration should succeed");

    assert_eq!(hook.emit(Args::new()).await, Flow::Halt);

    let after = after.lock();
    assert_eq!(after.len(), 1);
    assert!(after[0].plugin_exec_time.contains_key("gate"));
    assert!(!after[0].plugin_exec_time.contains_key("never"));
}

#[tokio::test]
async fn waterfall_meta_events_wrap_the_payload() {
    let hook = AsyncWaterfallHook::with_context("ctx");
    let before: Events = Arc::default();
    let after: Events = Arc::default();

    hook.on(|_, _| Step::carry(json!({ "name": "wang", "extra": true })))
        .expect("registration should succeed");
    hook.before().on(capture(&before)).expect("registration should succeed");
    hook.after().on(capture(&after)).expect("registration should succeed");

    hook.emit(Value::from(json!({ "name": "chen" })))
        .await
        .expect("well-formed");

    let before = before.lock();
    let after = after.lock();
    assert_eq!(before[0].kind, HookKind::AsyncWaterfallHook);
    assert_eq!(before[0].args, vec![Value::from(json!({ "name": "chen" }))]);
    assert_eq!(
        after[0].args,
        vec![Value::from(json!({ "name": "wang", "extra": true }))]
    );
}

#[test]
fn once_listeners_are_timed_only_when_they_run() {
    let (mock, clock) = mock_clock();
    let hook: SyncHook = SyncHook::new().with_clock(clock);
    let after: Events = Arc::default();

    let m = mock.clone();
    hook.once_tagged("init", move |_, _| m.advance(Duration::from_millis(9)))
        .expect("registration should succeed");
    hook.on(|_, _| ()).expect("registration should succeed");
    hook.after().on(capture(&after)).expect("registration should succeed");

    hook.emit(Args::new());
    hook.emit(Args::new());

    let after = after.lock();
    assert_eq!(after[0].plugin_exec_time["init"], Duration::from_millis(9));
    assert!(after[1].plugin_exec_time.is_empty());
}
