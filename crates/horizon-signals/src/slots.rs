//! The ordered subscriber list of one signal.
//!
//! [`Slots`] owns the reentrancy-safe dispatch loop. A slot callback may
//! connect, disconnect, emit or even destroy the emitting object while the
//! loop is still running, so every emission iterates a point-in-time
//! snapshot of the list while removals are applied to the live list.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::object::{ObjectId, global_registry};
use crate::payload::{Payload, Tunnel};
use crate::signals::Signals;
use crate::slot::{CallbackKey, Delivery, Slot};

/// The slots connected to one signal of one object, in delivery order.
pub struct Slots {
    signal: String,
    owner: ObjectId,
    /// Nestable block counter.
    blocked: AtomicUsize,
    slots: Mutex<Vec<Arc<Slot>>>,
}

impl Slots {
    pub(crate) fn new(signal: impl Into<String>, owner: ObjectId) -> Self {
        Self {
            signal: signal.into(),
            owner,
            blocked: AtomicUsize::new(0),
            slots: Mutex::new(Vec::new()),
        }
    }

    /// The signal name this collection is bound to.
    pub fn signal(&self) -> &str {
        &self.signal
    }

    /// The object that owns the signal.
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Number of connected slots.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether no slot is connected.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// A copy of the current slot list.
    pub fn snapshot(&self) -> Vec<Arc<Slot>> {
        self.slots.lock().clone()
    }

    /// Append a slot; connection order is delivery order.
    pub fn add(&self, slot: Arc<Slot>) {
        self.slots.lock().push(slot);
    }

    /// Drop every slot.
    pub fn clear(&self) {
        // Dropping a slot may drop objects captured by its closure, whose
        // teardown can call back into this collection.
        let slots = std::mem::take(&mut *self.slots.lock());
        drop(slots);
    }

    /// Block emission. Calls nest: each `block` needs a matching `unblock`.
    pub fn block(&self) {
        self.blocked.fetch_add(1, Ordering::SeqCst);
    }

    /// Undo one [`block`](Self::block).
    ///
    /// Returns `false` (leaving the counter at zero) if the collection was
    /// not blocked.
    pub fn unblock(&self) -> bool {
        self.blocked
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| count.checked_sub(1))
            .is_ok()
    }

    /// Whether emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst) > 0
    }

    /// Deliver one emission to every eligible slot, in order.
    ///
    /// Returns the targets of slots that were removed because they reached
    /// their fire-count limit. The set is empty when the collection is
    /// blocked.
    #[tracing::instrument(
        skip_all,
        target = "horizon_signals::slots",
        level = "trace",
        fields(signal = %self.signal)
    )]
    pub(crate) fn emit(
        &self,
        owner: &Signals,
        payload: Option<&Payload>,
        tunnel: Option<&Arc<Tunnel>>,
    ) -> HashSet<ObjectId> {
        let mut removed = HashSet::new();
        if self.is_blocked() {
            tracing::trace!(target: "horizon_signals::slots", "signal blocked, skipping emit");
            return removed;
        }

        let snapshot = self.snapshot();
        tracing::trace!(target: "horizon_signals::slots", slot_count = snapshot.len(), "emitting signal");

        let delivery = Delivery {
            sender: self.owner,
            signal: &self.signal,
            payload,
            tunnel,
        };
        let clock = owner.config().clock.clone();

        for slot in &snapshot {
            if slot.is_exhausted() {
                continue;
            }
            // Destroyed by an earlier slot of this emission.
            if slot
                .target()
                .is_some_and(|target| !global_registry().contains(target))
            {
                continue;
            }

            slot.emit(&delivery, clock.as_ref());

            if slot.is_exhausted() {
                self.remove(slot);
                if let Some(target) = slot.target() {
                    removed.insert(target);
                }
            }

            if slot.is_vetoed() {
                tracing::trace!(target: "horizon_signals::slots", "emission vetoed");
                break;
            }

            if !owner.is_alive() {
                tracing::trace!(target: "horizon_signals::slots", "owner destroyed during emit");
                break;
            }
        }

        removed
    }

    /// Remove one specific slot. Returns whether it was still connected.
    pub fn remove(&self, slot: &Arc<Slot>) -> bool {
        let mut slots = self.slots.lock();
        match slots.iter().position(|s| Arc::ptr_eq(s, slot)) {
            Some(index) => {
                slots.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove every slot matching `key` and `target` (`None` matches any).
    ///
    /// Returns whether anything was removed.
    pub fn disconnect(&self, key: Option<CallbackKey>, target: Option<ObjectId>) -> bool {
        !self.take_matching(key, target).is_empty()
    }

    /// Remove and return every slot matching `key` and `target`.
    pub(crate) fn take_matching(
        &self,
        key: Option<CallbackKey>,
        target: Option<ObjectId>,
    ) -> Vec<Arc<Slot>> {
        let mut slots = self.slots.lock();
        let (taken, kept): (Vec<_>, Vec<_>) = slots
            .drain(..)
            .partition(|slot| slot.matches(key, target));
        *slots = kept;
        taken
    }

    /// Find the slot connected with exactly this callback key and target.
    pub fn find_by_function(&self, key: CallbackKey, target: Option<ObjectId>) -> Option<Arc<Slot>> {
        self.slots
            .lock()
            .iter()
            .find(|slot| slot.is_same(key, target))
            .cloned()
    }

    /// Find the redirect slot forwarding to `signal` on `target`.
    pub fn find_by_redirect(&self, signal: &str, target: ObjectId) -> Option<Arc<Slot>> {
        self.slots
            .lock()
            .iter()
            .find(|slot| slot.redirect_name() == Some(signal) && slot.target() == Some(target))
            .cloned()
    }

    /// Whether any slot is bound to `target`.
    pub fn is_connected(&self, target: ObjectId) -> bool {
        self.slots
            .lock()
            .iter()
            .any(|slot| slot.target() == Some(target))
    }

    /// Every distinct target bound by a slot of this collection.
    pub fn targets(&self) -> HashSet<ObjectId> {
        self.slots.lock().iter().filter_map(|slot| slot.target()).collect()
    }
}

impl fmt::Debug for Slots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slots")
            .field("signal", &self.signal)
            .field("owner", &self.owner)
            .field("blocked", &self.blocked.load(Ordering::SeqCst))
            .field("len", &self.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(Slots: Send, Sync);
