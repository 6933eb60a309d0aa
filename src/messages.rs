//! Accumulated validation messages for a single document run.
//!
//! Metadata problems are not Rust errors: the resolver keeps going and
//! records everything it finds, so the user sees the complete list in one
//! pass instead of fixing problems one `Err` at a time. Only a non-empty
//! error section aborts the run — the orchestrator converts it into
//! [`crate::error::MdpressError::MetadataInvalid`] before any rendering
//! starts. Warnings are printed and never block generation.

use std::fmt;

/// One message with zero or more indented detail lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub message: String,
    pub details: Vec<String>,
}

/// Ordered-by-insertion log of validation errors and warnings.
///
/// Re-recording an existing message appends its detail lines to the
/// original entry rather than duplicating the message.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    errors: Vec<Entry>,
    warnings: Vec<Entry>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error with no detail lines.
    pub fn error(&mut self, message: impl Into<String>) {
        Self::record(&mut self.errors, message.into(), Vec::new());
    }

    /// Record an error with detail lines.
    pub fn error_with(&mut self, message: impl Into<String>, details: Vec<String>) {
        Self::record(&mut self.errors, message.into(), details);
    }

    /// Record a warning with no detail lines.
    pub fn warning(&mut self, message: impl Into<String>) {
        Self::record(&mut self.warnings, message.into(), Vec::new());
    }

    /// Record a warning with detail lines.
    pub fn warning_with(&mut self, message: impl Into<String>, details: Vec<String>) {
        Self::record(&mut self.warnings, message.into(), details);
    }

    fn record(entries: &mut Vec<Entry>, message: String, details: Vec<String>) {
        if let Some(existing) = entries.iter_mut().find(|e| e.message == message) {
            existing.details.extend(details);
        } else {
            entries.push(Entry { message, details });
        }
    }

    /// Any recorded error makes the whole run a failure.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn errors(&self) -> &[Entry] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Entry] {
        &self.warnings
    }

    /// Fold another log's entries into this one, preserving order.
    pub fn merge(&mut self, other: MessageLog) {
        for e in other.errors {
            Self::record(&mut self.errors, e.message, e.details);
        }
        for w in other.warnings {
            Self::record(&mut self.warnings, w.message, w.details);
        }
    }
}

impl fmt::Display for MessageLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.errors {
            writeln!(f, "  - {}", entry.message)?;
            for detail in &entry.details {
                writeln!(f, "    {detail}")?;
            }
        }
        Ok(())
    }
}
