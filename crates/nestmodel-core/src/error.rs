//! Error types for NestModel operations.

use crate::value::Value;
use std::fmt;

/// The primary error type for all NestModel operations.
#[derive(Debug)]
pub enum Error {
    /// Declarative validation failed; aggregates every violation in the graph.
    Validation(ValidationError),
    /// A root row or a cascaded-read target does not exist.
    NotFound(NotFoundError),
    /// Unique-constraint or duplicate-resource violation surfaced from the engine.
    Conflict(ConflictError),
    /// Programmer/configuration error (missing primary key on update, missing
    /// adapter on dispatch init, invalid relation configuration).
    Internal(InternalError),
    /// Aggregate of per-index failures from a bulk operation.
    Bulk(BulkError),
    /// I/O errors from the storage engine.
    Io(std::io::Error),
    /// Custom error with message.
    Custom(String),
}

/// Convenient result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an [`Error::Internal`] from a message.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(InternalError {
            message: message.into(),
        })
    }

    /// Build an [`Error::NotFound`] for a row identity.
    pub fn not_found(table: impl Into<String>, id: Value) -> Self {
        Error::NotFound(NotFoundError {
            table: table.into(),
            id,
        })
    }

    /// Build an [`Error::Conflict`] for a constraint violation.
    pub fn conflict(
        table: impl Into<String>,
        constraint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Conflict(ConflictError {
            table: table.into(),
            constraint: constraint.into(),
            message: message.into(),
        })
    }

    /// Check whether this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Check whether this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// A missing root row or cascaded-read target.
#[derive(Debug, Clone, PartialEq)]
pub struct NotFoundError {
    /// Table the lookup ran against.
    pub table: String,
    /// Primary key that was requested.
    pub id: Value,
}

/// A unique-constraint or duplicate-resource violation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictError {
    /// Table the write ran against.
    pub table: String,
    /// Name of the violated constraint (usually the column).
    pub constraint: String,
    /// Engine-provided detail.
    pub message: String,
}

/// A programmer or configuration error.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalError {
    /// What went wrong.
    pub message: String,
}

/// A single failed item of a bulk operation.
#[derive(Debug)]
pub struct BulkFailure {
    /// Position of the failed item in the input.
    pub index: usize,
    /// The failure itself.
    pub error: Error,
}

/// Aggregate of per-index failures from a bulk operation.
///
/// Bulk operations collect every per-item failure instead of stopping at the
/// first one; the indices refer to positions in the caller's input slice.
#[derive(Debug, Default)]
pub struct BulkError {
    /// The collected failures, in input order.
    pub failures: Vec<BulkFailure>,
}

impl BulkError {
    /// Create an empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for the item at `index`.
    pub fn push(&mut self, index: usize, error: Error) {
        self.failures.push(BulkFailure { index, error });
    }

    /// Check if no failures were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of failed items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.len()
    }
}

// ============================================================================
// Validation Errors
// ============================================================================

/// The type of validation constraint that was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// Required field is missing/null.
    Required,
    /// String is shorter than minimum length.
    MinLength,
    /// String is longer than maximum length.
    MaxLength,
    /// Value doesn't match regex pattern.
    Pattern,
    /// Value is below minimum.
    Min,
    /// Value is above maximum.
    Max,
    /// A readonly field was changed on update.
    Readonly,
    /// Custom validation failed.
    Custom,
}

/// A single validation violation with its field path.
///
/// Nested violations carry dotted paths (`address.country.name`); violations
/// from bulk inputs carry an index prefix (`[2].name`).
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Path of the offending field, relative to the operation root.
    pub path: String,
    /// The kind of constraint that was violated.
    pub kind: ViolationKind,
    /// Human-readable error message.
    pub message: String,
}

/// Validation error accumulating every violation in a model graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationError {
    /// The violations, in discovery order.
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Create a new empty validation error container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if there are any violations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of accumulated violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Add a violation.
    pub fn add(&mut self, path: impl Into<String>, kind: ViolationKind, message: impl Into<String>) {
        self.violations.push(Violation {
            path: path.into(),
            kind,
            message: message.into(),
        });
    }

    /// Add a required-field violation.
    pub fn add_required(&mut self, path: impl Into<String>) {
        self.add(path, ViolationKind::Required, "is required");
    }

    /// Add a minimum-length violation.
    pub fn add_min_length(&mut self, path: impl Into<String>, min: usize, actual: usize) {
        self.add(
            path,
            ViolationKind::MinLength,
            format!("must be at least {min} characters, got {actual}"),
        );
    }

    /// Add a maximum-length violation.
    pub fn add_max_length(&mut self, path: impl Into<String>, max: usize, actual: usize) {
        self.add(
            path,
            ViolationKind::MaxLength,
            format!("must be at most {max} characters, got {actual}"),
        );
    }

    /// Add a pattern violation.
    pub fn add_pattern(&mut self, path: impl Into<String>, pattern: &str) {
        self.add(
            path,
            ViolationKind::Pattern,
            format!("does not match pattern {pattern}"),
        );
    }

    /// Add a minimum-value violation.
    pub fn add_min(
        &mut self,
        path: impl Into<String>,
        min: impl fmt::Display,
        actual: impl fmt::Display,
    ) {
        self.add(
            path,
            ViolationKind::Min,
            format!("must be at least {min}, got {actual}"),
        );
    }

    /// Add a maximum-value violation.
    pub fn add_max(
        &mut self,
        path: impl Into<String>,
        max: impl fmt::Display,
        actual: impl fmt::Display,
    ) {
        self.add(
            path,
            ViolationKind::Max,
            format!("must be at most {max}, got {actual}"),
        );
    }

    /// Add a readonly violation.
    pub fn add_readonly(&mut self, path: impl Into<String>) {
        self.add(path, ViolationKind::Readonly, "cannot be changed");
    }

    /// Absorb violations from a nested record, prefixing each path.
    ///
    /// `prefix` is joined with a dot unless the nested path already starts
    /// with an index segment (bulk items keep `[i]` as the leading segment).
    pub fn absorb(&mut self, prefix: &str, nested: ValidationError) {
        for violation in nested.violations {
            let path = if violation.path.is_empty() {
                prefix.to_string()
            } else if violation.path.starts_with('[') {
                format!("{prefix}{}", violation.path)
            } else {
                format!("{prefix}.{}", violation.path)
            };
            self.violations.push(Violation {
                path,
                kind: violation.kind,
                message: violation.message,
            });
        }
    }

    /// Convert into a `Result`: `Ok(())` when empty, `Err(Error::Validation)`
    /// otherwise.
    #[allow(clippy::missing_errors_doc)]
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

// ============================================================================
// Display implementations
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(e) => write!(f, "{e}"),
            Error::NotFound(e) => write!(f, "{e}"),
            Error::Conflict(e) => write!(f, "{e}"),
            Error::Internal(e) => write!(f, "{e}"),
            Error::Bulk(e) => write!(f, "{e}"),
            Error::Io(e) => write!(f, "i/o error: {e}"),
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: no row with id {:?}", self.table, self.id)
    }
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: conflict on {}: {}",
            self.table, self.constraint, self.message
        )
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "internal error: {}", self.message)
    }
}

impl fmt::Display for BulkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of the submitted items failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; [{}]: {}", failure.index, failure.error)?;
        }
        Ok(())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed")?;
        for violation in &self.violations {
            write!(f, "; {}: {}", violation.path, violation.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for NotFoundError {}
impl std::error::Error for ConflictError {}
impl std::error::Error for InternalError {}
impl std::error::Error for BulkError {}
impl std::error::Error for ValidationError {}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
