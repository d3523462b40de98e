//! The per-object signal registry.
//!
//! [`Signals`] maps signal names to their [`Slots`] and exposes the
//! connect / disconnect / emit / redirect API. It also keeps the reverse
//! references that make cascade teardown possible: whenever an object `A`
//! subscribes a slot bound to object `B`, `B`'s registry records `A` as a
//! dependent. When `B` is destroyed it tells every dependent to drop the
//! subscriptions that target it, so no slot ever outlives its target.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use horizon_signals::{ObjectBase, payload};
//!
//! let counter = ObjectBase::default();
//! counter.signals().register("value_changed").unwrap();
//!
//! let total = Arc::new(AtomicI32::new(0));
//! let total_clone = total.clone();
//! counter
//!     .signals()
//!     .connect("value_changed", move |event| {
//!         if let Some(value) = event.payload_as::<i32>() {
//!             total_clone.fetch_add(*value, Ordering::SeqCst);
//!         }
//!     })
//!     .unwrap();
//!
//! counter.signals().emit_with("value_changed", payload(5_i32));
//! counter.signals().emit_with("value_changed", payload(2_i32));
//! assert_eq!(total.load(Ordering::SeqCst), 7);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::SignalsConfig;
use crate::error::{SignalError, SignalResult};
use crate::logging::{Diagnostic, DiagnosticKind};
use crate::object::{Object, ObjectId, global_registry};
use crate::payload::{Payload, Tunnel};
use crate::slot::{Callback, CallbackKey, Slot, SlotEvent};
use crate::slots::Slots;

/// The signal registry owned by exactly one object.
pub struct Signals {
    owner: ObjectId,
    /// Used by `emit` to keep the registry alive while callbacks run.
    this: Weak<Signals>,
    alive: AtomicBool,
    config: SignalsConfig,
    signals: Mutex<HashMap<String, Arc<Slots>>>,
    /// Objects holding at least one slot bound to this owner.
    dependents: Mutex<HashSet<ObjectId>>,
}

impl Signals {
    pub(crate) fn new(owner: ObjectId, config: SignalsConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            owner,
            this: this.clone(),
            alive: AtomicBool::new(true),
            config,
            signals: Mutex::new(HashMap::new()),
            dependents: Mutex::new(HashSet::new()),
        })
    }

    /// The object owning this registry.
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Whether the owner is still alive.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// The configuration this registry was created with.
    pub fn config(&self) -> &SignalsConfig {
        &self.config
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a signal name.
    ///
    /// Fails with [`SignalError::EmptyName`] for an empty name and with
    /// [`SignalError::AlreadyRegistered`] if the name exists; the existing
    /// signal and its slots are left untouched in that case.
    pub fn register(&self, name: &str) -> SignalResult<()> {
        self.check_alive("register")?;
        if name.is_empty() {
            return self.fail("register", SignalError::EmptyName);
        }

        let mut signals = self.signals.lock();
        if signals.contains_key(name) {
            return Err(SignalError::AlreadyRegistered(name.to_string()));
        }
        signals.insert(name.to_string(), Arc::new(Slots::new(name, self.owner)));
        tracing::trace!(target: "horizon_signals::signals", owner = ?self.owner, signal = name, "registered signal");
        Ok(())
    }

    /// Register several signal names, returning how many were new.
    pub fn register_all<I>(&self, names: I) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        names
            .into_iter()
            .filter(|name| self.register(name.as_ref()).is_ok())
            .count()
    }

    /// Whether `name` is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.signals.lock().contains_key(name)
    }

    /// The slot collection of a registered signal.
    pub fn slots(&self, name: &str) -> Option<Arc<Slots>> {
        self.signals.lock().get(name).cloned()
    }

    /// Every registered signal name, sorted.
    pub fn signal_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.signals.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of slots connected to `name` (0 if unregistered).
    pub fn slot_count(&self, name: &str) -> usize {
        self.slots(name).map_or(0, |slots| slots.len())
    }

    /// Objects whose registries hold a slot bound to this owner, sorted.
    pub fn dependents(&self) -> Vec<ObjectId> {
        let mut dependents: Vec<ObjectId> = self.dependents.lock().iter().copied().collect();
        dependents.sort();
        dependents
    }

    // =========================================================================
    // Connecting
    // =========================================================================

    /// Connect an anonymous closure to `name`.
    ///
    /// Anonymous closures are never de-duplicated; keep the returned handle to
    /// disconnect with [`disconnect_slot`](Self::disconnect_slot).
    pub fn connect<F>(&self, name: &str, f: F) -> SignalResult<Arc<Slot>>
    where
        F: Fn(&mut SlotEvent<'_>) + Send + Sync + 'static,
    {
        self.connect_callback(name, Callback::new(f), None)
    }

    /// Connect a free function to `name`. Connecting the same function twice
    /// returns the existing slot.
    pub fn connect_fn(&self, name: &str, f: fn(&mut SlotEvent<'_>)) -> SignalResult<Arc<Slot>> {
        self.connect_callback(name, Callback::function(f), None)
    }

    /// Connect a method bound to `receiver`. The slot targets the receiver,
    /// so it is removed automatically when the receiver is destroyed.
    pub fn connect_method<T: Object>(
        &self,
        name: &str,
        receiver: &Arc<T>,
        method: fn(&T, &mut SlotEvent<'_>),
    ) -> SignalResult<Arc<Slot>> {
        let target = receiver.object_id();
        self.connect_callback(name, Callback::method(receiver, method), Some(target))
    }

    /// Connect any callback, optionally bound to a target object.
    ///
    /// Keyed callbacks are de-duplicated by `(key, target)`: reconnecting
    /// returns the slot that already exists.
    pub fn connect_callback(
        &self,
        name: &str,
        callback: Callback,
        target: Option<ObjectId>,
    ) -> SignalResult<Arc<Slot>> {
        self.attach("connect", name, callback, target, 0)
    }

    /// Like [`connect`](Self::connect), but the slot fires only once.
    pub fn once<F>(&self, name: &str, f: F) -> SignalResult<Arc<Slot>>
    where
        F: Fn(&mut SlotEvent<'_>) + Send + Sync + 'static,
    {
        self.once_callback(name, Callback::new(f), None)
    }

    /// Like [`connect_fn`](Self::connect_fn), but the slot fires only once.
    pub fn once_fn(&self, name: &str, f: fn(&mut SlotEvent<'_>)) -> SignalResult<Arc<Slot>> {
        self.once_callback(name, Callback::function(f), None)
    }

    /// Like [`connect_method`](Self::connect_method), but the slot fires
    /// only once.
    pub fn once_method<T: Object>(
        &self,
        name: &str,
        receiver: &Arc<T>,
        method: fn(&T, &mut SlotEvent<'_>),
    ) -> SignalResult<Arc<Slot>> {
        let target = receiver.object_id();
        self.once_callback(name, Callback::method(receiver, method), Some(target))
    }

    /// Like [`connect_callback`](Self::connect_callback), but the slot fires
    /// only once. Reconnecting an existing slot re-arms it with a limit of 1.
    pub fn once_callback(
        &self,
        name: &str,
        callback: Callback,
        target: Option<ObjectId>,
    ) -> SignalResult<Arc<Slot>> {
        self.attach("once", name, callback, target, 1)
    }

    /// Forward emissions of `from` on this object to `to` on `target`.
    pub fn redirect(&self, from: &str, to: &str, target: ObjectId) -> SignalResult<Arc<Slot>> {
        let slots = self.lookup("redirect", from)?;
        let target_signals = self.dependency_of("redirect", target)?;

        if let Some(existing) = slots.find_by_redirect(to, target) {
            return Ok(existing);
        }

        let slot = Arc::new(Slot::redirect(to, target));
        slots.add(slot.clone());
        if let Some(target_signals) = target_signals {
            target_signals.add_dependent(self.owner);
        }
        tracing::debug!(
            target: "horizon_signals::signals",
            owner = ?self.owner,
            from,
            to,
            ?target,
            "redirect connected"
        );
        Ok(slot)
    }

    /// Forward emissions of `name` to the signal of the same name on `target`.
    pub fn redirect_same(&self, name: &str, target: ObjectId) -> SignalResult<Arc<Slot>> {
        self.redirect(name, name, target)
    }

    fn attach(
        &self,
        operation: &'static str,
        name: &str,
        callback: Callback,
        target: Option<ObjectId>,
        limit: usize,
    ) -> SignalResult<Arc<Slot>> {
        let slots = self.lookup(operation, name)?;
        let target_signals = match target {
            Some(target) => self.dependency_of(operation, target)?,
            None => None,
        };

        if let Some(existing) = callback
            .key()
            .and_then(|key| slots.find_by_function(key, target))
        {
            if limit > 0 {
                existing.set_limit(existing.fired() + limit);
            }
            return Ok(existing);
        }

        let slot = Arc::new(Slot::callback(callback, target));
        slot.set_limit(limit);
        slots.add(slot.clone());
        if let Some(target_signals) = target_signals {
            target_signals.add_dependent(self.owner);
        }
        tracing::debug!(
            target: "horizon_signals::signals",
            owner = ?self.owner,
            signal = name,
            ?target,
            limit,
            "slot connected"
        );
        Ok(slot)
    }

    /// The registry to record a reverse reference on, `None` for self-targets.
    fn dependency_of(
        &self,
        operation: &'static str,
        target: ObjectId,
    ) -> SignalResult<Option<Arc<Signals>>> {
        if target == self.owner {
            return Ok(None);
        }
        match global_registry().resolve(target) {
            Some(signals) => Ok(Some(signals)),
            None => self.fail(operation, SignalError::TargetDestroyed(target)),
        }
    }

    // =========================================================================
    // Emitting
    // =========================================================================

    /// Emit `name` without a payload.
    pub fn emit(&self, name: &str) {
        self.emit_tunneled(name, None, None);
    }

    /// Emit `name` with a payload.
    pub fn emit_with(&self, name: &str, payload: Payload) {
        self.emit_tunneled(name, Some(payload), None);
    }

    /// Emit `name` with an optional payload and tunnel.
    ///
    /// Slots run synchronously in connection order. Any of them may connect,
    /// disconnect, emit, or destroy this object; the registry stays valid
    /// until the call returns. Unknown names are reported and ignored.
    #[tracing::instrument(
        skip(self, payload, tunnel),
        target = "horizon_signals::signals",
        level = "trace",
        fields(owner = ?self.owner)
    )]
    pub fn emit_tunneled(&self, name: &str, payload: Option<Payload>, tunnel: Option<Arc<Tunnel>>) {
        let Some(_guard) = self.this.upgrade() else {
            return;
        };
        let Ok(slots) = self.lookup("emit", name) else {
            return;
        };

        let removed = slots.emit(self, payload.as_ref(), tunnel.as_ref());
        if !self.is_alive() {
            // Teardown only saw the live slots, not the ones exhausted by
            // this emission.
            tracing::trace!(target: "horizon_signals::signals", "owner destroyed during emit");
            for target in removed {
                if let Some(signals) = global_registry().resolve(target) {
                    signals.remove_dependent(self.owner);
                }
            }
            return;
        }
        for target in removed {
            self.release_target(target);
        }
    }

    // =========================================================================
    // Disconnecting
    // =========================================================================

    /// Disconnect every slot of `name`.
    pub fn disconnect(&self, name: &str) -> bool {
        self.disconnect_matching(name, None, None)
    }

    /// Disconnect a free function from `name`.
    pub fn disconnect_fn(&self, name: &str, f: fn(&mut SlotEvent<'_>)) -> bool {
        self.disconnect_matching(name, Some(CallbackKey::of_fn(f)), None)
    }

    /// Disconnect a method bound to `receiver` from `name`.
    pub fn disconnect_method<T: Object>(
        &self,
        name: &str,
        receiver: &T,
        method: fn(&T, &mut SlotEvent<'_>),
    ) -> bool {
        self.disconnect_matching(
            name,
            Some(CallbackKey::of_method(method)),
            Some(receiver.object_id()),
        )
    }

    /// Disconnect every slot of `name` matching `key` and `target`; `None`
    /// matches anything. Returns whether a slot was removed.
    pub fn disconnect_matching(
        &self,
        name: &str,
        key: Option<CallbackKey>,
        target: Option<ObjectId>,
    ) -> bool {
        let Ok(slots) = self.lookup("disconnect", name) else {
            return false;
        };

        let removed = slots.take_matching(key, target);
        if removed.is_empty() {
            return false;
        }
        let targets: HashSet<ObjectId> = removed.iter().filter_map(|slot| slot.target()).collect();
        drop(removed);

        tracing::debug!(target: "horizon_signals::signals", owner = ?self.owner, signal = name, "slots disconnected");
        for target in targets {
            self.release_target(target);
        }
        true
    }

    /// Disconnect one slot by its handle.
    pub fn disconnect_slot(&self, name: &str, slot: &Arc<Slot>) -> bool {
        let Ok(slots) = self.lookup("disconnect", name) else {
            return false;
        };
        if !slots.remove(slot) {
            return false;
        }
        if let Some(target) = slot.target() {
            self.release_target(target);
        }
        true
    }

    /// Disconnect every slot, across all signals, bound to `target`.
    pub fn disconnect_of_target(&self, target: ObjectId) -> bool {
        let all: Vec<Arc<Slots>> = self.signals.lock().values().cloned().collect();
        let mut removed = Vec::new();
        for slots in &all {
            removed.extend(slots.take_matching(None, Some(target)));
        }
        if removed.is_empty() {
            return false;
        }
        drop(removed);

        tracing::debug!(target: "horizon_signals::signals", owner = ?self.owner, ?target, "disconnected slots of target");
        self.release_target(target);
        true
    }

    /// Drop the reverse reference on `target` once nothing here points at it.
    fn release_target(&self, target: ObjectId) {
        if target == self.owner || self.is_connected_of_target(target) {
            return;
        }
        if let Some(signals) = global_registry().resolve(target) {
            signals.remove_dependent(self.owner);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether `name` has at least one slot.
    pub fn is_connected(&self, name: &str) -> bool {
        self.slots(name).is_some_and(|slots| !slots.is_empty())
    }

    /// Whether any signal has a slot bound to `target`.
    pub fn is_connected_of_target(&self, target: ObjectId) -> bool {
        let all: Vec<Arc<Slots>> = self.signals.lock().values().cloned().collect();
        all.iter().any(|slots| slots.is_connected(target))
    }

    // =========================================================================
    // Blocking
    // =========================================================================

    /// Block emission of `name`. Calls nest.
    pub fn block(&self, name: &str) {
        if let Ok(slots) = self.lookup("block", name) {
            slots.block();
        }
    }

    /// Undo one [`block`](Self::block) of `name`.
    ///
    /// Unblocking a signal that is not blocked is reported on the fatal
    /// channel; the counter stays at zero.
    pub fn unblock(&self, name: &str) {
        let Ok(slots) = self.lookup("unblock", name) else {
            return;
        };
        if !slots.unblock() {
            self.config.diagnostics.fatal(&Diagnostic {
                owner: self.owner,
                operation: "unblock",
                kind: DiagnosticKind::UnbalancedUnblock(name.to_string()),
            });
        }
    }

    /// Whether `name` is currently blocked. Unknown names are never blocked.
    pub fn is_blocked(&self, name: &str) -> bool {
        self.slots(name).is_some_and(|slots| slots.is_blocked())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Cascade-disconnect every dependent, then drop all signals and slots.
    ///
    /// Registered names are removed too; they must be registered again before
    /// the registry can be used.
    #[tracing::instrument(skip(self), target = "horizon_signals::signals", level = "trace", fields(owner = ?self.owner))]
    pub fn clear(&self) {
        let dependents = std::mem::take(&mut *self.dependents.lock());
        for dependent in dependents {
            if let Some(signals) = global_registry().resolve(dependent) {
                signals.disconnect_of_target(self.owner);
            }
        }

        let all: Vec<Arc<Slots>> = self.signals.lock().drain().map(|(_, slots)| slots).collect();
        let mut targets = HashSet::new();
        for slots in &all {
            targets.extend(slots.targets());
            slots.clear();
        }
        drop(all);

        targets.remove(&self.owner);
        for target in targets {
            if let Some(signals) = global_registry().resolve(target) {
                signals.remove_dependent(self.owner);
            }
        }
    }

    /// Tear the registry down for good; later operations fail with
    /// [`SignalError::OwnerDestroyed`].
    pub(crate) fn teardown(&self) {
        if !self.is_alive() {
            return;
        }
        self.clear();
        self.alive.store(false, Ordering::SeqCst);
        global_registry().unregister(self.owner);
        tracing::trace!(target: "horizon_signals::object", owner = ?self.owner, "object destroyed");
    }

    pub(crate) fn add_dependent(&self, dependent: ObjectId) {
        self.dependents.lock().insert(dependent);
    }

    pub(crate) fn remove_dependent(&self, dependent: ObjectId) {
        self.dependents.lock().remove(&dependent);
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    fn check_alive(&self, operation: &'static str) -> SignalResult<()> {
        if self.is_alive() {
            Ok(())
        } else {
            self.fail(operation, SignalError::OwnerDestroyed)
        }
    }

    fn lookup(&self, operation: &'static str, name: &str) -> SignalResult<Arc<Slots>> {
        self.check_alive(operation)?;
        match self.slots(name) {
            Some(slots) => Ok(slots),
            None => self.fail(operation, SignalError::NotRegistered(name.to_string())),
        }
    }

    fn fail<T>(&self, operation: &'static str, err: SignalError) -> SignalResult<T> {
        let quiet = matches!(err, SignalError::NotRegistered(_)) && !self.config.report_unknown_signals;
        if !quiet {
            self.config.diagnostics.recoverable(&Diagnostic {
                owner: self.owner,
                operation,
                kind: DiagnosticKind::Rejected(err.clone()),
            });
        }
        Err(err)
    }
}

impl fmt::Debug for Signals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signals")
            .field("owner", &self.owner)
            .field("alive", &self.is_alive())
            .field("signals", &self.signal_names())
            .field("dependents", &self.dependents())
            .finish()
    }
}

static_assertions::assert_impl_all!(Signals: Send, Sync);

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::logging::DiagnosticSink;
    use crate::object::ObjectBase;
    use crate::payload::payload;

    fn noop(_: &mut SlotEvent<'_>) {}

    #[derive(Default)]
    struct RecordingSink {
        recoverable: Mutex<Vec<Diagnostic>>,
        fatal: Mutex<Vec<Diagnostic>>,
    }

    impl DiagnosticSink for RecordingSink {
        fn recoverable(&self, diagnostic: &Diagnostic) {
            self.recoverable.lock().push(diagnostic.clone());
        }

        fn fatal(&self, diagnostic: &Diagnostic) {
            self.fatal.lock().push(diagnostic.clone());
        }
    }

    fn recorded() -> (ObjectBase, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let object = crate::SignalsBuilder::new()
            .diagnostics(sink.clone())
            .build::<ObjectBase>();
        (object, sink)
    }

    #[test]
    fn test_register() {
        let object = ObjectBase::default();
        let signals = object.signals();

        assert_eq!(signals.register("clicked"), Ok(()));
        assert_eq!(
            signals.register("clicked"),
            Err(SignalError::AlreadyRegistered("clicked".into()))
        );
        assert_eq!(signals.register(""), Err(SignalError::EmptyName));
        assert_eq!(signals.register_all(["clicked", "pressed", "released"]), 2);
        assert_eq!(signals.signal_names(), vec!["clicked", "pressed", "released"]);
    }

    #[test]
    fn test_reregister_keeps_slots() {
        let object = ObjectBase::default();
        let signals = object.signals();
        signals.register("clicked").unwrap();
        signals.connect_fn("clicked", noop).unwrap();

        assert!(signals.register("clicked").is_err());
        assert_eq!(signals.slot_count("clicked"), 1);
    }

    #[test]
    fn test_unknown_signal_is_reported() {
        let (object, sink) = recorded();
        let signals = object.signals();

        assert_eq!(
            signals.connect_fn("missing", noop).unwrap_err(),
            SignalError::NotRegistered("missing".into())
        );
        signals.emit("missing");
        signals.block("missing");
        assert!(!signals.disconnect("missing"));

        let reported = sink.recoverable.lock();
        let operations: Vec<_> = reported.iter().map(|d| d.operation).collect();
        assert_eq!(operations, vec!["connect", "emit", "block", "disconnect"]);
    }

    #[test]
    fn test_unknown_signal_reporting_can_be_disabled() {
        let sink = Arc::new(RecordingSink::default());
        let object = crate::SignalsBuilder::new()
            .diagnostics(sink.clone())
            .report_unknown_signals(false)
            .build::<ObjectBase>();

        object.signals().emit("missing");
        assert!(object.signals().register("").is_err());

        let reported = sink.recoverable.lock();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].kind, DiagnosticKind::Rejected(SignalError::EmptyName));
    }

    #[test]
    fn test_unbalanced_unblock_is_fatal() {
        let (object, sink) = recorded();
        let signals = object.signals();
        signals.register("tick").unwrap();

        signals.block("tick");
        signals.unblock("tick");
        assert!(sink.fatal.lock().is_empty());

        signals.unblock("tick");
        assert!(!signals.is_blocked("tick"));
        let fatal = sink.fatal.lock();
        assert_eq!(fatal.len(), 1);
        assert_eq!(fatal[0].kind, DiagnosticKind::UnbalancedUnblock("tick".into()));
    }

    #[test]
    fn test_connect_is_idempotent() {
        let object = ObjectBase::default();
        let signals = object.signals();
        signals.register("clicked").unwrap();

        let first = signals.connect_fn("clicked", noop).unwrap();
        let second = signals.connect_fn("clicked", noop).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(signals.slot_count("clicked"), 1);

        // Closures have no identity and are never merged.
        signals.connect("clicked", |_| {}).unwrap();
        signals.connect("clicked", |_| {}).unwrap();
        assert_eq!(signals.slot_count("clicked"), 3);
    }

    #[test]
    fn test_once_rearms_existing_slot() {
        let object = ObjectBase::default();
        let signals = object.signals();
        signals.register("clicked").unwrap();

        let slot = signals.connect_fn("clicked", noop).unwrap();
        signals.emit("clicked");
        let again = signals.once_fn("clicked", noop).unwrap();
        assert!(Arc::ptr_eq(&slot, &again));

        signals.emit("clicked");
        signals.emit("clicked");
        assert_eq!(slot.fired(), 2);
        assert!(!signals.is_connected("clicked"));
    }

    #[test]
    fn test_reverse_references() {
        let source = ObjectBase::default();
        let target = ObjectBase::default();
        source.signals().register_all(["a", "b"]);

        let key = CallbackKey::from_raw(7);
        source
            .signals()
            .connect_callback("a", Callback::keyed(key, |_| {}), Some(target.id()))
            .unwrap();
        source
            .signals()
            .connect_callback("b", Callback::keyed(key, |_| {}), Some(target.id()))
            .unwrap();
        assert_eq!(target.signals().dependents(), vec![source.id()]);

        // Still connected through "b".
        assert!(source.signals().disconnect("a"));
        assert_eq!(target.signals().dependents(), vec![source.id()]);

        assert!(source.signals().disconnect_matching("b", Some(key), Some(target.id())));
        assert!(target.signals().dependents().is_empty());
        assert!(!source.signals().is_connected_of_target(target.id()));
    }

    #[test]
    fn test_self_target_has_no_reverse_reference() {
        let object = ObjectBase::default();
        object.signals().register("a").unwrap();
        object
            .signals()
            .connect_callback("a", Callback::function(noop), Some(object.id()))
            .unwrap();
        assert!(object.signals().dependents().is_empty());
        assert!(object.signals().is_connected_of_target(object.id()));
    }

    #[test]
    fn test_connect_to_destroyed_target() {
        let source = ObjectBase::default();
        source.signals().register("a").unwrap();
        let target = ObjectBase::default();
        let target_id = target.id();
        drop(target);

        assert_eq!(
            source
                .signals()
                .connect_callback("a", Callback::function(noop), Some(target_id))
                .unwrap_err(),
            SignalError::TargetDestroyed(target_id)
        );
        assert_eq!(
            source.signals().redirect_same("a", target_id).unwrap_err(),
            SignalError::TargetDestroyed(target_id)
        );
        assert_eq!(source.signals().slot_count("a"), 0);
    }

    #[test]
    fn test_exhausted_once_releases_reverse_reference() {
        let source = ObjectBase::default();
        let target = ObjectBase::default();
        source.signals().register("a").unwrap();
        source
            .signals()
            .once_callback("a", Callback::function(noop), Some(target.id()))
            .unwrap();
        assert_eq!(target.signals().dependents(), vec![source.id()]);

        source.signals().emit("a");
        assert_eq!(source.signals().slot_count("a"), 0);
        assert!(target.signals().dependents().is_empty());
    }

    #[test]
    fn test_disconnect_slot_handle() {
        let object = ObjectBase::default();
        let signals = object.signals();
        signals.register("a").unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let slot = signals
            .connect("a", move |_| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        signals.emit("a");
        assert!(signals.disconnect_slot("a", &slot));
        assert!(!signals.disconnect_slot("a", &slot));
        signals.emit("a");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_cascades_to_dependents() {
        let source = ObjectBase::default();
        let target = ObjectBase::default();
        source.signals().register("a").unwrap();
        target.signals().register("b").unwrap();
        source
            .signals()
            .connect_callback("a", Callback::function(noop), Some(target.id()))
            .unwrap();
        target
            .signals()
            .connect_callback("b", Callback::function(noop), Some(source.id()))
            .unwrap();

        target.signals().clear();
        assert_eq!(source.signals().slot_count("a"), 0);
        assert!(source.signals().dependents().is_empty());
        assert!(!target.signals().is_registered("b"));
        assert!(target.signals().dependents().is_empty());
    }

    #[test]
    fn test_emit_passes_payload() {
        let object = ObjectBase::default();
        object.signals().register("value").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        object
            .signals()
            .connect("value", move |event| {
                if let Some(text) = event.payload_as::<String>() {
                    seen_clone.lock().push(text.clone());
                }
            })
            .unwrap();

        object.signals().emit_with("value", payload("hello".to_string()));
        object.signals().emit("value");
        assert_eq!(*seen.lock(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_destroyed_owner_rejects_operations() {
        let (object, sink) = recorded();
        object.signals().register("a").unwrap();
        let signals = object.signals_handle();
        object.destroy();

        assert!(!signals.is_alive());
        assert_eq!(signals.register("b"), Err(SignalError::OwnerDestroyed));
        assert_eq!(
            signals.connect_fn("a", noop).unwrap_err(),
            SignalError::OwnerDestroyed
        );
        signals.emit("a");
        assert!(
            sink.recoverable
                .lock()
                .iter()
                .all(|d| d.kind == DiagnosticKind::Rejected(SignalError::OwnerDestroyed))
        );
    }
}
