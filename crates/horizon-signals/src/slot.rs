//! A single subscription attached to a signal.
//!
//! A [`Slot`] is either a callback (free function, closure, or bound method)
//! or a redirect that forwards the emission to a signal on another object.
//! Each slot carries its own delivery policy:
//!
//! - **Fire-count limit**: the slot is exhausted and removed after `limit`
//!   successful deliveries (`0` means unlimited)
//! - **Throttle**: at most `rate` accepted deliveries per second; attempts
//!   arriving faster are dropped without counting
//! - **Veto**: a callback may stop the remaining deliveries of the current
//!   emission through [`SlotEvent::set_veto`]
//!
//! # Slot States
//!
//! ```text
//! Armed ──deliver──► Fired(k) ──k == limit──► Exhausted ──► Removed
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::object::{ObjectId, global_registry};
use crate::payload::{Payload, Tunnel};

/// Slack for clock readings that land a rounding error short of the
/// throttle interval.
const THROTTLE_TOLERANCE: f64 = 1e-9;

/// The boxed form of every slot callback.
pub type SlotFn = dyn Fn(&mut SlotEvent<'_>) + Send + Sync;

/// A comparable identity for a callback.
///
/// Closures cannot be compared, so connections that must be de-duplicated or
/// disconnected later carry a key instead: the address of a free function, the
/// address of a bound method, or any value chosen by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackKey(usize);

impl CallbackKey {
    /// Create a key from an arbitrary caller-chosen value.
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// The key identifying a free function.
    pub fn of_fn(f: fn(&mut SlotEvent<'_>)) -> Self {
        Self(f as usize)
    }

    /// The key identifying a method, independent of the receiver.
    pub fn of_method<T>(method: fn(&T, &mut SlotEvent<'_>)) -> Self {
        Self(method as usize)
    }

    /// The raw key value.
    pub fn as_raw(self) -> usize {
        self.0
    }
}

/// A slot callback plus its optional identity.
#[derive(Clone)]
pub struct Callback {
    func: Arc<SlotFn>,
    key: Option<CallbackKey>,
}

impl Callback {
    /// An anonymous callback. It is never de-duplicated and can only be
    /// disconnected through its [`Slot`] handle.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut SlotEvent<'_>) + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(f),
            key: None,
        }
    }

    /// A free-function callback, keyed by the function's address.
    pub fn function(f: fn(&mut SlotEvent<'_>)) -> Self {
        Self {
            func: Arc::new(f),
            key: Some(CallbackKey::of_fn(f)),
        }
    }

    /// A closure identified by a caller-provided key.
    pub fn keyed<F>(key: CallbackKey, f: F) -> Self
    where
        F: Fn(&mut SlotEvent<'_>) + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(f),
            key: Some(key),
        }
    }

    /// A method bound to `receiver`, keyed by the method's address.
    ///
    /// Only a weak reference to the receiver is kept; once the receiver is
    /// dropped the callback does nothing.
    pub fn method<T>(receiver: &Arc<T>, method: fn(&T, &mut SlotEvent<'_>)) -> Self
    where
        T: Send + Sync + 'static,
    {
        let receiver = Arc::downgrade(receiver);
        Self::keyed(CallbackKey::of_method(method), move |event| {
            if let Some(receiver) = receiver.upgrade() {
                method(&receiver, event);
            }
        })
    }

    /// The callback's identity, if it has one.
    pub fn key(&self) -> Option<CallbackKey> {
        self.key
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").field("key", &self.key).finish()
    }
}

/// One emission as seen by a single slot.
pub(crate) struct Delivery<'a> {
    pub(crate) sender: ObjectId,
    pub(crate) signal: &'a str,
    pub(crate) payload: Option<&'a Payload>,
    pub(crate) tunnel: Option<&'a Arc<Tunnel>>,
}

/// A subscription attached to one signal of one object.
///
/// Slots are shared through `Arc<Slot>`: the handle returned by
/// [`Signals::connect`](crate::Signals::connect) stays valid after the slot
/// has been disconnected, it just no longer receives emissions.
pub struct Slot {
    callback: Option<Callback>,
    redirect: Option<String>,
    target: Option<ObjectId>,
    /// Fire-count limit, 0 = unlimited.
    limit: AtomicUsize,
    fired: AtomicUsize,
    /// Accepted deliveries per second, 0 = unlimited.
    throttle: AtomicU32,
    last_accepted: Mutex<Option<f64>>,
    veto: AtomicBool,
    /// Data attached at connect time.
    data: Mutex<Option<Payload>>,
}

impl Slot {
    fn with_parts(
        callback: Option<Callback>,
        redirect: Option<String>,
        target: Option<ObjectId>,
    ) -> Self {
        Self {
            callback,
            redirect,
            target,
            limit: AtomicUsize::new(0),
            fired: AtomicUsize::new(0),
            throttle: AtomicU32::new(0),
            last_accepted: Mutex::new(None),
            veto: AtomicBool::new(false),
            data: Mutex::new(None),
        }
    }

    pub(crate) fn callback(callback: Callback, target: Option<ObjectId>) -> Self {
        Self::with_parts(Some(callback), None, target)
    }

    pub(crate) fn redirect(signal: impl Into<String>, target: ObjectId) -> Self {
        Self::with_parts(None, Some(signal.into()), Some(target))
    }

    /// The callback identity, `None` for anonymous closures and redirects.
    pub fn key(&self) -> Option<CallbackKey> {
        self.callback.as_ref().and_then(Callback::key)
    }

    /// The object this slot is bound to, if any.
    pub fn target(&self) -> Option<ObjectId> {
        self.target
    }

    /// The signal this slot forwards to, if it is a redirect.
    pub fn redirect_name(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    /// Whether this slot forwards instead of invoking a callback.
    pub fn is_redirect(&self) -> bool {
        self.redirect.is_some()
    }

    /// The fire-count limit (0 = unlimited).
    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::SeqCst)
    }

    /// Set the fire-count limit (0 = unlimited).
    pub fn set_limit(&self, limit: usize) {
        self.limit.store(limit, Ordering::SeqCst);
    }

    /// Number of successful deliveries so far.
    pub fn fired(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }

    /// The throttle rate in deliveries per second (0 = unlimited).
    pub fn throttle(&self) -> u32 {
        self.throttle.load(Ordering::SeqCst)
    }

    /// Limit deliveries to `rate` per second (0 = unlimited).
    pub fn set_throttle(&self, rate: u32) {
        self.throttle.store(rate, Ordering::SeqCst);
    }

    /// Whether the fire-count limit has been reached.
    pub fn is_exhausted(&self) -> bool {
        let limit = self.limit();
        limit > 0 && self.fired() >= limit
    }

    /// Whether the last delivery raised a veto.
    pub fn is_vetoed(&self) -> bool {
        self.veto.load(Ordering::SeqCst)
    }

    /// Data attached at connect time.
    pub fn data(&self) -> Option<Payload> {
        self.data.lock().clone()
    }

    /// Attach data that every delivery can read via [`SlotEvent::slot_data`].
    pub fn set_data(&self, data: Option<Payload>) {
        *self.data.lock() = data;
    }

    /// Exact identity match used for idempotent connects.
    pub(crate) fn is_same(&self, key: CallbackKey, target: Option<ObjectId>) -> bool {
        self.key() == Some(key) && self.target == target
    }

    /// Wildcard match used by disconnect: `None` matches anything.
    pub(crate) fn matches(&self, key: Option<CallbackKey>, target: Option<ObjectId>) -> bool {
        key.is_none_or(|key| self.key() == Some(key))
            && target.is_none_or(|target| self.target == Some(target))
    }

    /// Attempt one delivery. Returns `false` if the throttle dropped it.
    pub(crate) fn emit(&self, delivery: &Delivery<'_>, clock: &dyn Clock) -> bool {
        self.veto.store(false, Ordering::SeqCst);

        if !self.accept(clock) {
            tracing::trace!(
                target: "horizon_signals::slot",
                signal = delivery.signal,
                rate = self.throttle(),
                "delivery throttled"
            );
            return false;
        }

        self.deliver(delivery);
        self.fired.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn accept(&self, clock: &dyn Clock) -> bool {
        let rate = self.throttle();
        if rate == 0 {
            return true;
        }

        let now = clock.now();
        let mut last = self.last_accepted.lock();
        let accepted = match *last {
            None => true,
            Some(previous) => {
                let elapsed = now - previous;
                elapsed * f64::from(rate) >= 1.0 - THROTTLE_TOLERANCE
            }
        };
        if accepted {
            *last = Some(now);
        }
        accepted
    }

    fn deliver(&self, delivery: &Delivery<'_>) {
        if let Some(signal) = &self.redirect {
            let Some(target) = self.target.and_then(|id| global_registry().resolve(id)) else {
                tracing::trace!(
                    target: "horizon_signals::slot",
                    signal = delivery.signal,
                    redirect = signal.as_str(),
                    "redirect target is gone"
                );
                return;
            };
            target.emit_tunneled(signal, delivery.payload.cloned(), delivery.tunnel.cloned());
            if delivery.tunnel.is_some_and(|tunnel| tunnel.is_vetoed()) {
                self.veto.store(true, Ordering::SeqCst);
            }
        } else if let Some(callback) = &self.callback {
            let mut event = SlotEvent {
                slot: self,
                sender: delivery.sender,
                signal: delivery.signal,
                payload: delivery.payload,
                tunnel: delivery.tunnel,
            };
            (callback.func)(&mut event);
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("key", &self.key())
            .field("redirect", &self.redirect)
            .field("target", &self.target)
            .field("limit", &self.limit())
            .field("fired", &self.fired())
            .field("throttle", &self.throttle())
            .finish()
    }
}

static_assertions::assert_impl_all!(Slot: Send, Sync);

/// The view a callback receives for one delivery.
///
/// The payload and tunnel are borrowed for the duration of the call only.
pub struct SlotEvent<'a> {
    slot: &'a Slot,
    sender: ObjectId,
    signal: &'a str,
    payload: Option<&'a Payload>,
    tunnel: Option<&'a Arc<Tunnel>>,
}

impl SlotEvent<'_> {
    /// The emitted payload.
    pub fn payload(&self) -> Option<&Payload> {
        self.payload
    }

    /// The emitted payload downcast to `T`.
    pub fn payload_as<T: Any>(&self) -> Option<&T> {
        self.payload.and_then(|payload| (**payload).downcast_ref::<T>())
    }

    /// The object that emitted the signal.
    pub fn sender(&self) -> ObjectId {
        self.sender
    }

    /// The name of the emitted signal.
    pub fn signal(&self) -> &str {
        self.signal
    }

    /// The object the slot is bound to, if any.
    pub fn target(&self) -> Option<ObjectId> {
        self.slot.target
    }

    /// The tunnel shared by the whole emission chain, if one was supplied.
    pub fn tunnel(&self) -> Option<&Arc<Tunnel>> {
        self.tunnel
    }

    /// Data attached to the slot at connect time.
    pub fn slot_data(&self) -> Option<Payload> {
        self.slot.data()
    }

    /// Deliveries completed before this one.
    pub fn fired(&self) -> usize {
        self.slot.fired()
    }

    /// Whether this delivery has requested a veto.
    pub fn veto(&self) -> bool {
        self.slot.is_vetoed()
    }

    /// Stop (or resume) the remaining deliveries of this emission.
    ///
    /// The flag is mirrored onto the tunnel, if any.
    pub fn set_veto(&mut self, veto: bool) {
        self.slot.veto.store(veto, Ordering::SeqCst);
        if let Some(tunnel) = self.tunnel {
            tunnel.set_veto(veto);
        }
    }
}

impl fmt::Debug for SlotEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotEvent")
            .field("sender", &self.sender)
            .field("signal", &self.signal)
            .field("has_payload", &self.payload.is_some())
            .field("veto", &self.veto())
            .finish()
    }
}
