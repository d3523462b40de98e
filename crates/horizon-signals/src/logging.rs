//! Logging and debugging facilities for Horizon Signals.
//!
//! This module provides:
//! - Target names for filtering the crate's `tracing` output by subsystem
//! - The [`DiagnosticSink`] through which recoverable and fatal conditions
//!   are reported, with [`TracingSink`] as the default implementation
//! - [`ConnectionDump`] for visualizing an object's signals and slots
//!
//! # Tracing Integration
//!
//! Horizon Signals uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt::init();
//!     // Your application code...
//! }
//! ```

use std::fmt::{self, Write as FmtWrite};

use crate::error::SignalError;
use crate::object::{ObjectId, global_registry};
use crate::signals::Signals;

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Crate-wide target.
    pub const CORE: &str = "horizon_signals";
    /// Single-subscription delivery (throttling, redirects).
    pub const SLOT: &str = "horizon_signals::slot";
    /// Per-signal dispatch loop.
    pub const SLOTS: &str = "horizon_signals::slots";
    /// Per-object signal registry.
    pub const SIGNALS: &str = "horizon_signals::signals";
    /// Object lifecycle.
    pub const OBJECT: &str = "horizon_signals::object";
}

/// The condition a [`Diagnostic`] describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// An operation was rejected or became a no-op.
    Rejected(SignalError),
    /// `unblock` was called more often than `block`.
    UnbalancedUnblock(String),
}

/// A condition reported by a [`Signals`] registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The object whose registry reported the condition.
    pub owner: ObjectId,
    /// The operation that was being performed (`"connect"`, `"emit"`, ...).
    pub operation: &'static str,
    /// What went wrong.
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::Rejected(err) => {
                write!(f, "{} on {:?}: {err}", self.operation, self.owner)
            }
            DiagnosticKind::UnbalancedUnblock(signal) => write!(
                f,
                "{} on {:?}: signal '{signal}' unblocked more often than blocked",
                self.operation, self.owner
            ),
        }
    }
}

/// Receiver for conditions detected by the dispatch core.
///
/// Neither channel may panic or abort: the core continues after reporting.
pub trait DiagnosticSink: Send + Sync {
    /// A recoverable condition: the call became a no-op or returned an error.
    fn recoverable(&self, diagnostic: &Diagnostic);

    /// An internal invariant was violated and has been corrected in place.
    fn fatal(&self, diagnostic: &Diagnostic);
}

/// Default sink forwarding to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn recoverable(&self, diagnostic: &Diagnostic) {
        tracing::warn!(
            target: "horizon_signals::signals",
            owner = ?diagnostic.owner,
            operation = diagnostic.operation,
            "{diagnostic}"
        );
    }

    fn fatal(&self, diagnostic: &Diagnostic) {
        tracing::error!(
            target: "horizon_signals::signals",
            owner = ?diagnostic.owner,
            operation = diagnostic.operation,
            "{diagnostic}"
        );
    }
}

/// Style options for connection dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line prefixes.
    Compact,
}

/// Configuration for [`ConnectionDump`] output.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show object IDs.
    pub show_ids: bool,
    /// Whether to list individual slots under each signal.
    pub show_slots: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: true,
            show_slots: true,
        }
    }
}

impl DumpOptions {
    /// Only signal names and slot counts.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_slots: false,
            ..Default::default()
        }
    }
}

/// Debug utility for visualizing an object's signals and subscriptions.
///
/// ```
/// use horizon_signals::{Object, ObjectBase};
/// use horizon_signals::logging::ConnectionDump;
///
/// let button = ObjectBase::default();
/// button.set_name("button");
/// button.signals().register("clicked").unwrap();
/// button.signals().connect("clicked", |_| {}).unwrap();
///
/// let output = ConnectionDump::new().format(button.signals());
/// assert!(output.contains("button"));
/// assert!(output.contains("clicked (1 slot)"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConnectionDump {
    options: DumpOptions,
}

impl ConnectionDump {
    /// Create a dump formatter with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dump formatter with custom options.
    pub fn with_options(options: DumpOptions) -> Self {
        Self { options }
    }

    /// Format every signal registered on `signals`.
    pub fn format(&self, signals: &Signals) -> String {
        let mut output = String::new();
        let owner = signals.owner();
        let registry = global_registry();
        let name = registry.object_name(owner).unwrap_or_default();
        let display_name = if name.is_empty() { "(unnamed)" } else { name.as_str() };

        let _ = write!(output, "{display_name}");
        if self.options.show_ids {
            let _ = write!(output, " [{owner:?}]");
        }
        if !signals.is_alive() {
            output.push_str(" (destroyed)");
        }
        let _ = writeln!(output, " - {} dependents", signals.dependents().len());

        let names = signals.signal_names();
        if names.is_empty() {
            let _ = writeln!(output, "  (no signals)");
            return output;
        }

        let count = names.len();
        for (i, signal) in names.iter().enumerate() {
            let is_last = i + 1 == count;
            let Some(slots) = signals.slots(signal) else {
                continue;
            };
            output.push_str(self.branch(is_last));
            let len = slots.len();
            let _ = write!(output, "{signal} ({len} slot{})", if len == 1 { "" } else { "s" });
            if slots.is_blocked() {
                output.push_str(" [blocked]");
            }
            output.push('\n');

            if !self.options.show_slots {
                continue;
            }
            let snapshot = slots.snapshot();
            let slot_count = snapshot.len();
            for (j, slot) in snapshot.iter().enumerate() {
                output.push_str(self.continuation(is_last));
                output.push_str(self.branch(j + 1 == slot_count));
                match slot.redirect_name() {
                    Some(to) => {
                        let _ = write!(output, "redirect -> '{to}'");
                    }
                    None if slot.key().is_some() => output.push_str("callback"),
                    None => output.push_str("closure"),
                }
                if let (Some(target), true) = (slot.target(), self.options.show_ids) {
                    let _ = write!(output, " target={target:?}");
                }
                if slot.limit() > 0 {
                    let _ = write!(output, " fired {}/{}", slot.fired(), slot.limit());
                } else {
                    let _ = write!(output, " fired {}", slot.fired());
                }
                if slot.throttle() > 0 {
                    let _ = write!(output, " throttle {}/s", slot.throttle());
                }
                output.push('\n');
            }
        }

        output
    }

    fn branch(&self, is_last: bool) -> &'static str {
        let (corner, last) = match self.options.style {
            TreeStyle::Ascii => ("+-- ", "`-- "),
            TreeStyle::Unicode => ("\u{251c}\u{2500}\u{2500} ", "\u{2514}\u{2500}\u{2500} "),
            TreeStyle::Compact => ("- ", "- "),
        };
        if is_last { last } else { corner }
    }

    fn continuation(&self, parent_is_last: bool) -> &'static str {
        match (self.options.style, parent_is_last) {
            (TreeStyle::Ascii, false) => "|   ",
            (TreeStyle::Unicode, false) => "\u{2502}   ",
            (TreeStyle::Compact, _) => "  ",
            (_, true) => "    ",
        }
    }
}
