//! Integration tests for emission: ordering, limits, veto, throttling,
//! blocking and redirects.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use horizon_signals::clock::ManualClock;
use horizon_signals::{
    Callback, CallbackKey, ObjectBase, ObjectId, SignalsBuilder, SlotEvent, Tunnel, payload,
};
use parking_lot::Mutex;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("horizon_signals=trace"))
        .with_test_writer()
        .try_init();
}

type Log = Arc<Mutex<Vec<String>>>;

fn recorder(log: Log, label: &'static str) -> impl Fn(&mut SlotEvent<'_>) + Send + Sync + 'static {
    let label = label.to_string();
    move |_| log.lock().push(label.clone())
}

#[test]
fn test_delivery_follows_subscription_order() {
    init_tracing();
    let object = ObjectBase::default();
    object.signals().register("changed").unwrap();
    let log: Log = Arc::default();

    object.signals().connect("changed", recorder(log.clone(), "a")).unwrap();
    let b = object.signals().connect("changed", recorder(log.clone(), "b")).unwrap();
    object.signals().connect("changed", recorder(log.clone(), "c")).unwrap();
    object.signals().connect("changed", recorder(log.clone(), "d")).unwrap();

    object.signals().emit("changed");
    assert!(object.signals().disconnect_slot("changed", &b));
    object.signals().connect("changed", recorder(log.clone(), "e")).unwrap();
    object.signals().emit("changed");

    assert_eq!(*log.lock(), vec!["a", "b", "c", "d", "a", "c", "d", "e"]);
}

#[test]
fn test_once_fires_exactly_once() {
    init_tracing();
    let object = ObjectBase::default();
    object.signals().register("a").unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();
    let slot = object
        .signals()
        .once("a", move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    for _ in 0..5 {
        object.signals().emit("a");
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(slot.fired(), 1);
    assert!(slot.is_exhausted());
    assert_eq!(object.signals().slot_count("a"), 0);
}

#[test]
fn test_six_once_subscriptions_drain_in_one_emit() {
    init_tracing();
    let object = ObjectBase::default();
    object.signals().register("a").unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..6 {
        let hits = hits.clone();
        object
            .signals()
            .once("a", move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }
    assert_eq!(object.signals().slot_count("a"), 6);

    object.signals().emit("a");
    assert_eq!(object.signals().slot_count("a"), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 6);

    object.signals().emit("a");
    assert_eq!(hits.load(Ordering::SeqCst), 6);
}

#[test]
fn test_fire_count_limit() {
    let object = ObjectBase::default();
    object.signals().register("tick").unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();
    let slot = object
        .signals()
        .connect("tick", move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    slot.set_limit(3);

    for _ in 0..10 {
        object.signals().emit("tick");
    }
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert!(!object.signals().is_connected("tick"));
}

fn on_changed(_: &mut SlotEvent<'_>) {}

#[test]
fn test_duplicate_connections_collapse() {
    let source = ObjectBase::default();
    let target = ObjectBase::default();
    source.signals().register("changed").unwrap();

    let a = source.signals().connect_fn("changed", on_changed).unwrap();
    let b = source.signals().connect_fn("changed", on_changed).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    // Same function, different target: a distinct subscription.
    let key = CallbackKey::of_fn(on_changed);
    let c = source
        .signals()
        .connect_callback("changed", Callback::function(on_changed), Some(target.id()))
        .unwrap();
    let d = source
        .signals()
        .connect_callback("changed", Callback::keyed(key, on_changed), Some(target.id()))
        .unwrap();
    assert!(Arc::ptr_eq(&c, &d));
    assert_eq!(source.signals().slot_count("changed"), 2);

    let r1 = source.signals().redirect_same("changed", target.id());
    let r2 = source.signals().redirect_same("changed", target.id());
    assert!(Arc::ptr_eq(&r1.unwrap(), &r2.unwrap()));
    assert_eq!(source.signals().slot_count("changed"), 3);

    assert!(source.signals().disconnect_fn("changed", on_changed));
    assert_eq!(source.signals().slot_count("changed"), 1);
}

#[test]
fn test_veto_is_scoped_to_one_signal_and_emission() {
    init_tracing();
    let object = ObjectBase::default();
    object.signals().register_all(["a", "b"]);
    let log: Log = Arc::default();

    object
        .signals()
        .connect("a", |event| {
            let veto = event.payload_as::<bool>().copied().unwrap_or(false);
            event.set_veto(veto);
        })
        .unwrap();
    object.signals().connect("a", recorder(log.clone(), "a2")).unwrap();
    object.signals().connect("b", recorder(log.clone(), "b1")).unwrap();

    object.signals().emit_with("a", payload(true));
    object.signals().emit("b");
    assert_eq!(*log.lock(), vec!["b1"]);

    object.signals().emit_with("a", payload(false));
    assert_eq!(*log.lock(), vec!["b1", "a2"]);
}

#[test]
fn test_throttle_drops_fast_emissions() {
    init_tracing();
    let clock = Arc::new(ManualClock::new(0.0));
    let object = SignalsBuilder::new()
        .clock(clock.clone())
        .build::<ObjectBase>();
    object.signals().register("move").unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();
    let slot = object
        .signals()
        .connect("move", move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    slot.set_throttle(4);

    // Accepted, dropped, accepted, accepted, dropped.
    for time in [0.0, 0.125, 0.25, 0.5, 0.625] {
        clock.set(time);
        object.signals().emit("move");
    }
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(slot.fired(), 3);

    // Spaced exactly 1/rate apart: everything is delivered.
    for step in 1..=8 {
        clock.set(0.5 + 0.25 * f64::from(step));
        object.signals().emit("move");
    }
    assert_eq!(slot.fired(), 11);
}

#[test]
fn test_throttled_attempts_do_not_consume_once() {
    let clock = Arc::new(ManualClock::new(10.0));
    let object = SignalsBuilder::new()
        .clock(clock.clone())
        .build::<ObjectBase>();
    object.signals().register("move").unwrap();

    let slot = object.signals().connect("move", |_| {}).unwrap();
    slot.set_throttle(1);
    slot.set_limit(2);

    object.signals().emit("move");
    object.signals().emit("move");
    assert_eq!(slot.fired(), 1);
    assert!(object.signals().is_connected("move"));

    clock.advance(1.0);
    object.signals().emit("move");
    assert_eq!(slot.fired(), 2);
    assert!(!object.signals().is_connected("move"));
}

#[test]
fn test_blocking_nests() {
    let object = ObjectBase::default();
    object.signals().register("a").unwrap();
    let log: Log = Arc::default();
    object.signals().connect("a", recorder(log.clone(), "hit")).unwrap();

    object.signals().block("a");
    object.signals().block("a");
    object.signals().emit("a");
    object.signals().unblock("a");
    assert!(object.signals().is_blocked("a"));
    object.signals().emit("a");
    assert!(log.lock().is_empty());

    object.signals().unblock("a");
    assert!(!object.signals().is_blocked("a"));
    object.signals().emit("a");
    assert_eq!(*log.lock(), vec!["hit"]);
}

type Seen = Arc<Mutex<Vec<(String, ObjectId, Option<i32>)>>>;

fn observe(seen: Seen) -> impl Fn(&mut SlotEvent<'_>) + Send + Sync + 'static {
    move |event| {
        seen.lock().push((
            event.signal().to_string(),
            event.sender(),
            event.payload_as::<i32>().copied(),
        ))
    }
}

#[test]
fn test_redirect_matches_direct_emit() {
    init_tracing();
    let source = ObjectBase::default();
    let target = ObjectBase::default();
    source.signals().register("a").unwrap();
    target.signals().register("b").unwrap();

    let seen: Seen = Arc::default();
    target.signals().connect("b", observe(seen.clone())).unwrap();
    source.signals().redirect("a", "b", target.id()).unwrap();
    assert_eq!(target.signals().dependents(), vec![source.id()]);

    source.signals().emit_with("a", payload(5_i32));
    target.signals().emit_with("b", payload(5_i32));

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
    assert_eq!(seen[0], ("b".to_string(), target.id(), Some(5)));
}

#[test]
fn test_redirect_to_destroyed_target_is_removed() {
    let source = ObjectBase::default();
    let target = ObjectBase::default();
    source.signals().register("a").unwrap();
    target.signals().register("a").unwrap();
    source.signals().redirect_same("a", target.id()).unwrap();

    drop(target);
    assert_eq!(source.signals().slot_count("a"), 0);
    source.signals().emit("a");
}

#[test]
fn test_tunnel_veto_crosses_redirects() {
    init_tracing();
    let source = ObjectBase::default();
    let target = ObjectBase::default();
    source.signals().register("a").unwrap();
    target.signals().register("b").unwrap();
    let log: Log = Arc::default();

    target
        .signals()
        .connect("b", |event| event.set_veto(true))
        .unwrap();
    source.signals().redirect("a", "b", target.id()).unwrap();
    source.signals().connect("a", recorder(log.clone(), "after")).unwrap();

    // Without a tunnel the downstream veto stays downstream.
    source.signals().emit("a");
    assert_eq!(*log.lock(), vec!["after"]);

    let tunnel = Tunnel::new();
    source.signals().emit_tunneled("a", None, Some(tunnel.clone()));
    assert!(tunnel.is_vetoed());
    assert_eq!(*log.lock(), vec!["after"]);
}

#[test]
fn test_tunnel_payload_visible_to_slots() {
    let object = ObjectBase::default();
    object.signals().register("a").unwrap();
    let seen = Arc::new(Mutex::new(None));
    let seen_clone = seen.clone();
    object
        .signals()
        .connect("a", move |event| {
            *seen_clone.lock() = event
                .tunnel()
                .and_then(|tunnel| tunnel.payload())
                .and_then(|data| data.downcast_ref::<u8>().copied());
        })
        .unwrap();

    let tunnel = Tunnel::with_payload(payload(9_u8));
    object.signals().emit_tunneled("a", None, Some(tunnel));
    assert_eq!(*seen.lock(), Some(9));
}

#[test]
fn test_slot_data_is_visible_to_callback() {
    let object = ObjectBase::default();
    object.signals().register("a").unwrap();
    let seen = Arc::new(Mutex::new(None));
    let seen_clone = seen.clone();
    let slot = object
        .signals()
        .connect("a", move |event| {
            *seen_clone.lock() = event
                .slot_data()
                .and_then(|data| data.downcast_ref::<String>().cloned());
        })
        .unwrap();
    slot.set_data(Some(payload("context".to_string())));

    object.signals().emit("a");
    assert_eq!(seen.lock().as_deref(), Some("context"));
}

#[test]
fn test_connect_during_emit_applies_to_next_emission() {
    let object = Arc::new(ObjectBase::default());
    object.signals().register("a").unwrap();
    let log: Log = Arc::default();

    let weak = Arc::downgrade(&object);
    let log_clone = log.clone();
    object
        .signals()
        .once("a", move |_| {
            log_clone.lock().push("first".into());
            if let Some(object) = weak.upgrade() {
                object
                    .signals()
                    .connect("a", recorder(log_clone.clone(), "late"))
                    .unwrap();
            }
        })
        .unwrap();

    object.signals().emit("a");
    assert_eq!(*log.lock(), vec!["first"]);
    object.signals().emit("a");
    assert_eq!(*log.lock(), vec!["first", "late"]);
}

#[test]
fn test_reentrant_emit() {
    let object = Arc::new(ObjectBase::default());
    object.signals().register_all(["outer", "inner"]);
    let log: Log = Arc::default();

    let weak = Arc::downgrade(&object);
    let log_clone = log.clone();
    object
        .signals()
        .connect("outer", move |_| {
            log_clone.lock().push("outer".into());
            if let Some(object) = weak.upgrade() {
                object.signals().emit("inner");
            }
        })
        .unwrap();
    object.signals().connect("outer", recorder(log.clone(), "outer-2")).unwrap();
    object.signals().connect("inner", recorder(log.clone(), "inner")).unwrap();

    object.signals().emit("outer");
    assert_eq!(*log.lock(), vec!["outer", "inner", "outer-2"]);
}
