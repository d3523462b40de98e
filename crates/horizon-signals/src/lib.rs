//! Signal/slot dispatch for Horizon objects.
//!
//! This crate provides an in-process publish/subscribe core:
//!
//! - **Object Model**: Objects with generational ids, each owning one signal registry
//! - **Signals**: Named signals registered per object, connected to slots
//! - **Slots**: Closures, free functions, bound methods, or redirects to other objects
//! - **Delivery Policies**: Fire-count limits, throttling, veto, blocking
//! - **Cascade Teardown**: Destroying an object removes every slot bound to it
//!
//! Emission is synchronous and reentrant: a slot may connect, disconnect,
//! emit, or destroy the emitting object while the emission is in progress.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use horizon_signals::{ObjectBase, payload};
//!
//! let button = ObjectBase::default();
//! button.signals().register_all(["clicked", "pressed"]);
//!
//! let clicks = Arc::new(AtomicUsize::new(0));
//! let clicks_clone = clicks.clone();
//! button
//!     .signals()
//!     .connect("clicked", move |_| {
//!         clicks_clone.fetch_add(1, Ordering::SeqCst);
//!     })
//!     .unwrap();
//!
//! // A one-shot subscription.
//! button.signals().once("pressed", |event| {
//!     assert_eq!(event.payload_as::<u32>(), Some(&1));
//! }).unwrap();
//!
//! button.signals().emit("clicked");
//! button.signals().emit_with("pressed", payload(1_u32));
//! button.signals().emit_with("pressed", payload(2_u32));
//!
//! assert_eq!(clicks.load(Ordering::SeqCst), 1);
//! assert!(!button.signals().is_connected("pressed"));
//! ```
//!
//! # Redirect Example
//!
//! ```
//! use horizon_signals::ObjectBase;
//!
//! let inner = ObjectBase::default();
//! let outer = ObjectBase::default();
//! inner.signals().register("finished").unwrap();
//! outer.signals().register("done").unwrap();
//!
//! // Emitting "finished" on inner emits "done" on outer.
//! inner.signals().redirect("finished", "done", outer.id()).unwrap();
//! outer.signals().once("done", |event| {
//!     assert_eq!(event.signal(), "done");
//! }).unwrap();
//! inner.signals().emit("finished");
//! assert_eq!(outer.signals().slot_count("done"), 0);
//! ```

pub mod clock;
pub mod config;
mod error;
pub mod logging;
pub mod object;
pub mod payload;
pub mod signals;
pub mod slot;
pub mod slots;

pub use config::{SignalsBuilder, SignalsConfig};
pub use error::{SignalError, SignalResult};
pub use logging::{ConnectionDump, Diagnostic, DiagnosticKind, DiagnosticSink, TracingSink};
pub use object::{
    Object, ObjectBase, ObjectId, ObjectRegistry, SharedObjectRegistry, global_registry,
};
pub use payload::{Payload, Tunnel, payload};
pub use signals::Signals;
pub use slot::{Callback, CallbackKey, Slot, SlotEvent};
pub use slots::Slots;
