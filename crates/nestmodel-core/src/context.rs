//! Per-call operation context.

use std::collections::HashSet;

/// The kind of mutation a repository call performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Insert a new instance.
    Create,
    /// Merge onto and rewrite an existing instance.
    Update,
    /// Remove an existing instance.
    Delete,
}

/// Context shared by every recursive step of one top-level repository call.
///
/// A fresh context is created per call; nested steps receive it by reference
/// so they share the same override set. The operation kind itself is passed
/// alongside, since a nested branch may narrow it (an UPDATE branch with no
/// prior value is enforced as CREATE for that branch only).
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    /// Field names skipped during validation.
    ignore_fields: HashSet<&'static str>,
    /// Whether transient fields are merged back from the pre-persist
    /// snapshot after the engine write.
    rebuild_transient: bool,
}

impl OpContext {
    /// Create a context with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip validation for a field (builder pattern).
    #[must_use]
    pub fn ignore_field(mut self, name: &'static str) -> Self {
        self.ignore_fields.insert(name);
        self
    }

    /// Request transient-field rebuild after persisting (builder pattern).
    #[must_use]
    pub fn rebuild_transient(mut self, value: bool) -> Self {
        self.rebuild_transient = value;
        self
    }

    /// Check whether a field's validation is suppressed.
    #[must_use]
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore_fields.contains(name)
    }

    /// Whether transient fields should be rebuilt after the engine write.
    #[must_use]
    pub fn rebuilds_transient(&self) -> bool {
        self.rebuild_transient
    }
}
