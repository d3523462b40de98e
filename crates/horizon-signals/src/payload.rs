//! Event payloads and the tunnel side channel.
//!
//! The dispatch core never inspects a payload: it is an opaque,
//! reference-counted handle created by the emitter, handed to every slot
//! unmodified and released once the last holder drops it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// An opaque, reference-counted event argument.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Wrap a value into a [`Payload`].
///
/// ```
/// use horizon_signals::payload::payload;
///
/// let p = payload(42_i32);
/// assert_eq!(p.downcast_ref::<i32>(), Some(&42));
/// ```
pub fn payload<T: Any + Send + Sync>(value: T) -> Payload {
    Arc::new(value)
}

/// Side channel shared by every delivery of one emission chain.
///
/// A slot that vetoes through its [`SlotEvent`](crate::slot::SlotEvent) also
/// raises the tunnel's veto, so redirected emissions further down the chain
/// observe the same abort request.
#[derive(Default)]
pub struct Tunnel {
    veto: AtomicBool,
    payload: Option<Payload>,
}

impl Tunnel {
    /// Create an empty tunnel.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a tunnel carrying additional data.
    pub fn with_payload(payload: Payload) -> Arc<Self> {
        Arc::new(Self {
            veto: AtomicBool::new(false),
            payload: Some(payload),
        })
    }

    /// Whether a slot has requested the emission chain to stop.
    pub fn is_vetoed(&self) -> bool {
        self.veto.load(Ordering::SeqCst)
    }

    /// Raise or lower the veto flag.
    pub fn set_veto(&self, veto: bool) {
        self.veto.store(veto, Ordering::SeqCst);
    }

    /// The data attached to the tunnel, if any.
    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }
}

impl fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tunnel")
            .field("veto", &self.is_vetoed())
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

static_assertions::assert_impl_all!(Tunnel: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tunnel_veto() {
        let tunnel = Tunnel::new();
        assert!(!tunnel.is_vetoed());
        tunnel.set_veto(true);
        assert!(tunnel.is_vetoed());
        tunnel.set_veto(false);
        assert!(!tunnel.is_vetoed());
    }

    #[test]
    fn test_tunnel_payload() {
        let tunnel = Tunnel::with_payload(payload("extra".to_string()));
        let data = tunnel.payload().and_then(|p| p.downcast_ref::<String>());
        assert_eq!(data.map(String::as_str), Some("extra"));
        assert!(Tunnel::new().payload().is_none());
    }
}
