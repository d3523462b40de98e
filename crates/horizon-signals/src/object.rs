//! Object model for Horizon Signals.
//!
//! Every participant in signal dispatch is an object: it has a unique,
//! generational [`ObjectId`] and owns exactly one [`Signals`] registry whose
//! lifetime matches its own.
//!
//! # Key Types
//!
//! - [`Object`] - Trait implemented by every signal-owning type
//! - [`ObjectBase`] - Helper struct embedded in objects; owns the [`Signals`]
//! - [`ObjectId`] - Stable identifier that never resolves again once destroyed
//! - [`ObjectRegistry`] - Central table mapping ids to live registries
//! - [`SharedObjectRegistry`] - Thread-safe wrapper around [`ObjectRegistry`]
//!
//! Subscriptions refer to other objects by id only. Delivery and cascade
//! teardown resolve the id through the [`global_registry`], so a slot can
//! never reach an object that has already been destroyed.

use std::any::Any;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;
use slotmap::{SlotMap, new_key_type};

use crate::config::SignalsConfig;
use crate::signals::Signals;

new_key_type! {
    /// A unique identifier for an object.
    ///
    /// Ids are generational: after the object is destroyed its id no longer
    /// resolves, even if the registry reuses the slot for a new object.
    pub struct ObjectId;
}

impl ObjectId {
    /// Convert the ObjectId to a raw u64 value.
    #[inline]
    pub fn as_raw(self) -> u64 {
        use slotmap::Key;
        self.data().as_ffi()
    }

    /// Create an ObjectId from a raw u64 value.
    ///
    /// This does not check whether the object exists.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self::from(slotmap::KeyData::from_ffi(raw))
    }
}

/// Internal data stored in the registry for each object.
struct ObjectData {
    /// Human-readable name for debugging.
    name: String,
    /// The type name for debugging.
    type_name: &'static str,
    signals: Weak<Signals>,
}

/// The central table of live objects.
///
/// # Related Types
///
/// - [`SharedObjectRegistry`] - Thread-safe wrapper for concurrent access
/// - [`global_registry`] - Access the singleton instance
pub struct ObjectRegistry {
    objects: SlotMap<ObjectId, ObjectData>,
}

impl ObjectRegistry {
    /// Create a new empty object registry.
    pub fn new() -> Self {
        Self {
            objects: SlotMap::with_key(),
        }
    }

    fn register<T: Object>(&mut self, config: SignalsConfig) -> Arc<Signals> {
        let type_name = std::any::type_name::<T>();
        let id = self.objects.insert(ObjectData {
            name: String::new(),
            type_name,
            signals: Weak::new(),
        });
        let signals = Signals::new(id, config);
        if let Some(data) = self.objects.get_mut(id) {
            data.signals = Arc::downgrade(&signals);
        }
        tracing::trace!(target: "horizon_signals::object", ?id, type_name, "registered object");
        signals
    }

    fn unregister(&mut self, id: ObjectId) -> bool {
        self.objects.remove(id).is_some()
    }

    /// Check if an object exists.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    /// The signal registry of a live object.
    pub fn resolve(&self, id: ObjectId) -> Option<Arc<Signals>> {
        self.objects
            .get(id)
            .and_then(|data| data.signals.upgrade())
            .filter(|signals| signals.is_alive())
    }

    /// Get an object's name.
    pub fn object_name(&self, id: ObjectId) -> Option<&str> {
        self.objects.get(id).map(|data| data.name.as_str())
    }

    /// Set an object's name. Returns `false` if the object does not exist.
    pub fn set_object_name(&mut self, id: ObjectId, name: String) -> bool {
        match self.objects.get_mut(id) {
            Some(data) => {
                data.name = name;
                true
            }
            None => false,
        }
    }

    /// Get an object's type name.
    pub fn type_name(&self, id: ObjectId) -> Option<&'static str> {
        self.objects.get(id).map(|data| data.type_name)
    }

    /// Get the total number of live objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe wrapper around [`ObjectRegistry`].
///
/// Locks are only held for the duration of a lookup; no callback ever runs
/// while the registry is locked.
pub struct SharedObjectRegistry {
    inner: RwLock<ObjectRegistry>,
}

impl SharedObjectRegistry {
    /// Create a new shared object registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ObjectRegistry::new()),
        }
    }

    pub(crate) fn register<T: Object>(&self, config: SignalsConfig) -> Arc<Signals> {
        self.inner.write().register::<T>(config)
    }

    pub(crate) fn unregister(&self, id: ObjectId) -> bool {
        self.inner.write().unregister(id)
    }

    /// Check if an object exists.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.inner.read().contains(id)
    }

    /// The signal registry of a live object.
    pub fn resolve(&self, id: ObjectId) -> Option<Arc<Signals>> {
        self.inner.read().resolve(id)
    }

    /// Get an object's name.
    pub fn object_name(&self, id: ObjectId) -> Option<String> {
        self.inner.read().object_name(id).map(str::to_string)
    }

    /// Set an object's name.
    pub fn set_object_name(&self, id: ObjectId, name: String) -> bool {
        self.inner.write().set_object_name(id, name)
    }

    /// Get an object's type name.
    pub fn type_name(&self, id: ObjectId) -> Option<&'static str> {
        self.inner.read().type_name(id)
    }

    /// Get the total number of live objects.
    pub fn object_count(&self) -> usize {
        self.inner.read().object_count()
    }

    /// Access the registry with a read lock for complex operations.
    pub fn with_read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ObjectRegistry) -> R,
    {
        f(&self.inner.read())
    }
}

impl Default for SharedObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_REGISTRY: OnceLock<SharedObjectRegistry> = OnceLock::new();

/// Get a reference to the global object registry, creating it on first use.
pub fn global_registry() -> &'static SharedObjectRegistry {
    GLOBAL_REGISTRY.get_or_init(SharedObjectRegistry::new)
}

/// The trait implemented by every type that owns signals.
///
/// # Example
///
/// ```
/// use horizon_signals::{Object, ObjectBase, SlotEvent};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// struct Counter {
///     base: ObjectBase,
///     clicks: AtomicUsize,
/// }
///
/// impl Counter {
///     fn new() -> Arc<Self> {
///         Arc::new(Self {
///             base: ObjectBase::new::<Self>(),
///             clicks: AtomicUsize::new(0),
///         })
///     }
///
///     fn on_click(&self, _event: &mut SlotEvent<'_>) {
///         self.clicks.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// impl Object for Counter {
///     fn object_base(&self) -> &ObjectBase {
///         &self.base
///     }
/// }
///
/// let button = ObjectBase::default();
/// button.signals().register("clicked").unwrap();
///
/// let counter = Counter::new();
/// button.signals().connect_method("clicked", &counter, Counter::on_click).unwrap();
/// button.signals().emit("clicked");
/// assert_eq!(counter.clicks.load(Ordering::SeqCst), 1);
///
/// // Destroying the receiver removes its subscription.
/// drop(counter);
/// assert!(!button.signals().is_connected("clicked"));
/// ```
pub trait Object: Any + Send + Sync {
    /// The embedded [`ObjectBase`].
    fn object_base(&self) -> &ObjectBase;

    /// Get this object's unique identifier.
    fn object_id(&self) -> ObjectId {
        self.object_base().id()
    }

    /// Get this object's signal registry.
    fn signals(&self) -> &Signals {
        self.object_base().signals()
    }
}

/// Helper struct for implementing [`Object`].
///
/// Creating an `ObjectBase` registers the object and its [`Signals`];
/// dropping it (or calling [`destroy`](Self::destroy)) cascades disconnection
/// to every subscriber bound to it, drops its own subscriptions and
/// unregisters the id.
pub struct ObjectBase {
    signals: Arc<Signals>,
}

impl ObjectBase {
    /// Register a new object of type `T` with the default configuration.
    pub fn new<T: Object>() -> Self {
        Self::with_config::<T>(SignalsConfig::default())
    }

    /// Register a new object of type `T` with a custom configuration.
    pub fn with_config<T: Object>(config: SignalsConfig) -> Self {
        Self {
            signals: global_registry().register::<T>(config),
        }
    }

    /// Get the object's ID.
    pub fn id(&self) -> ObjectId {
        self.signals.owner()
    }

    /// Get the object's signal registry.
    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    /// A shared handle to the signal registry.
    ///
    /// The handle stays usable after the object is destroyed, but every
    /// operation on it is then rejected.
    pub fn signals_handle(&self) -> Arc<Signals> {
        self.signals.clone()
    }

    /// Get the object's name.
    pub fn name(&self) -> String {
        global_registry().object_name(self.id()).unwrap_or_default()
    }

    /// Set the object's name.
    pub fn set_name(&self, name: impl Into<String>) {
        global_registry().set_object_name(self.id(), name.into());
    }

    /// Whether the object has not been destroyed yet.
    pub fn is_alive(&self) -> bool {
        self.signals.is_alive()
    }

    /// Destroy the object now instead of at drop time.
    pub fn destroy(&self) {
        self.signals.teardown();
    }
}

impl Default for ObjectBase {
    fn default() -> Self {
        Self::new::<Self>()
    }
}

impl Object for ObjectBase {
    fn object_base(&self) -> &ObjectBase {
        self
    }
}

impl Drop for ObjectBase {
    fn drop(&mut self) {
        self.signals.teardown();
    }
}

impl std::fmt::Debug for ObjectBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBase")
            .field("id", &self.id())
            .field("alive", &self.is_alive())
            .finish()
    }
}

static_assertions::assert_impl_all!(ObjectBase: Send, Sync);
static_assertions::assert_impl_all!(SharedObjectRegistry: Send, Sync);
