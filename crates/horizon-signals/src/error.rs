//! Error types for Horizon Signals.

use crate::object::ObjectId;

/// Errors reported by signal registration, connection and lookup.
///
/// None of these are fatal: callers detect them through the returned
/// `Result`, and the operations that cannot return a value (emit, block)
/// report them through the configured [`DiagnosticSink`](crate::logging::DiagnosticSink)
/// and become no-ops.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalError {
    /// A signal cannot be registered under an empty name.
    #[error("Cannot register a signal with an empty name")]
    EmptyName,

    /// The signal name is already registered on this object.
    #[error("Signal '{0}' is already registered")]
    AlreadyRegistered(String),

    /// The signal name was never registered on this object.
    #[error("Signal '{0}' is not registered")]
    NotRegistered(String),

    /// The subscription target has been destroyed (or never existed).
    #[error("Target object {0:?} has been destroyed")]
    TargetDestroyed(ObjectId),

    /// The owning object has already been destroyed.
    #[error("The owning object has been destroyed")]
    OwnerDestroyed,
}

impl SignalError {
    /// Whether this error stems from registration rather than lookup.
    pub fn is_registration(&self) -> bool {
        matches!(self, Self::EmptyName | Self::AlreadyRegistered(_))
    }
}

/// A specialized Result type for signal operations.
pub type SignalResult<T> = std::result::Result<T, SignalError>;
