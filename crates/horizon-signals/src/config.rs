//! Per-object configuration of the dispatch core.

use std::fmt;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::logging::{DiagnosticSink, TracingSink};
use crate::object::{Object, ObjectBase};

/// Configuration shared by every signal of one object.
#[derive(Clone)]
pub struct SignalsConfig {
    /// Time source for slot throttling.
    pub clock: Arc<dyn Clock>,
    /// Receiver of recoverable and fatal diagnostics.
    pub diagnostics: Arc<dyn DiagnosticSink>,
    /// Whether lookups of unregistered signal names are reported.
    pub report_unknown_signals: bool,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            diagnostics: Arc::new(TracingSink),
            report_unknown_signals: true,
        }
    }
}

impl SignalsConfig {
    /// The default configuration with a different clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            ..Default::default()
        }
    }
}

impl fmt::Debug for SignalsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalsConfig")
            .field("report_unknown_signals", &self.report_unknown_signals)
            .finish_non_exhaustive()
    }
}

/// Builder for objects with a custom [`SignalsConfig`].
///
/// ```
/// use std::sync::Arc;
/// use horizon_signals::{ObjectBase, SignalsBuilder};
/// use horizon_signals::clock::ManualClock;
///
/// let clock = Arc::new(ManualClock::new(0.0));
/// let object = SignalsBuilder::new()
///     .clock(clock.clone())
///     .report_unknown_signals(false)
///     .build::<ObjectBase>();
/// assert!(object.is_alive());
/// ```
#[derive(Debug, Default)]
pub struct SignalsBuilder {
    config: SignalsConfig,
}

impl SignalsBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the throttling time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.config.clock = clock;
        self
    }

    /// Set the diagnostic sink.
    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.config.diagnostics = sink;
        self
    }

    /// Enable or disable reporting of unregistered signal names.
    pub fn report_unknown_signals(mut self, report: bool) -> Self {
        self.config.report_unknown_signals = report;
        self
    }

    /// The configuration built so far.
    pub fn config(&self) -> &SignalsConfig {
        &self.config
    }

    /// Register a new object of type `T` with this configuration.
    pub fn build<T: Object>(self) -> ObjectBase {
        ObjectBase::with_config::<T>(self.config)
    }
}
