//! Import diagnostics.
//!
//! Every pass of an importer appends to one [`ImportReport`], passed by
//! `&mut` through the whole pipeline — never a module-level singleton, so
//! concurrent imports in one process cannot cross-talk. Warnings are ordered,
//! append-only and human-readable; nothing is ever cleared, and a non-empty
//! report never blocks applying the resulting IR.

use serde::{Deserialize, Serialize};

/// Ordered, append-only list of human-readable import warnings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ImportReport {
    warnings: Vec<String>,
}

impl ImportReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(warning = %message, "import warning");
        self.warnings.push(message);
    }

    /// All warnings, in append order.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Whether any warning contains the given fragment. Test convenience.
    pub fn contains(&self, fragment: &str) -> bool {
        self.warnings.iter().any(|w| w.contains(fragment))
    }
}
