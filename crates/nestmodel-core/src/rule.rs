//! Declarative per-field validation rules.
//!
//! Rules are registered on a model's [`ModelMeta`](crate::model::ModelMeta)
//! as `const` data and applied by the enforcer before any I/O. Pattern
//! checks compile through a process-wide cache so a pattern is compiled at
//! most once for the lifetime of the program.

use regex::Regex;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

/// A single structural or cross-field check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Check {
    /// Field must be set and non-null.
    Required,
    /// Minimum string length.
    MinLength(usize),
    /// Maximum string length.
    MaxLength(usize),
    /// String must match the regex pattern.
    Pattern(&'static str),
    /// Minimum numeric value.
    Min(f64),
    /// Maximum numeric value.
    Max(f64),
    /// Field may not change between the persisted and the incoming state.
    Readonly,
}

/// Validation rules for one field of a model.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    /// The field the checks apply to.
    pub field: &'static str,
    /// Checks applied in order; all violations are accumulated.
    pub checks: &'static [Check],
}

impl FieldRule {
    /// Create a rule set for a field.
    #[must_use]
    pub const fn new(field: &'static str, checks: &'static [Check]) -> Self {
        Self { field, checks }
    }
}

/// Thread-safe cache for compiled regex patterns.
struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        // Fast path: already cached. Recover from a poisoned lock; the cache
        // holds no invariants beyond individual entries.
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let regex = Regex::new(pattern)?;
        {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            cache.insert(pattern.to_string(), regex.clone());
        }
        Ok(regex)
    }
}

fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// Check if a string matches a regex pattern.
///
/// Compiled patterns are cached. An invalid pattern is logged and treated as
/// a non-match; validation never panics on bad configuration.
#[must_use]
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    match regex_cache().get_or_compile(pattern) {
        Ok(regex) => regex.is_match(value),
        Err(e) => {
            tracing::warn!(
                pattern = pattern,
                error = %e,
                "Invalid regex pattern in validation rule, treating as non-match"
            );
            false
        }
    }
}

/// Validate a regex pattern eagerly (for configuration checks).
///
/// Returns an error message if the pattern is invalid, `None` if valid.
#[must_use]
pub fn validate_pattern(pattern: &str) -> Option<String> {
    match Regex::new(pattern) {
        Ok(_) => None,
        Err(e) => Some(format!("invalid regex pattern: {e}")),
    }
}
