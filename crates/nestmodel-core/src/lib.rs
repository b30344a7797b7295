//! Core types and traits for NestModel.
//!
//! This crate provides the foundational abstractions of the persistence
//! adapter:
//!
//! - `Model` trait and `ModelMeta` statically-registered metadata
//! - `Record`/`FieldValue` dynamic model graphs
//! - `RelationInfo` cascade/populate descriptors
//! - `FieldRule` declarative validation rules
//! - `Gateway` trait for the storage engine boundary
//! - `Outcome`/`Cx` re-exports from asupersync for cancel-correct operations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod context;
pub mod error;
pub mod field;
pub mod gateway;
pub mod model;
pub mod record;
pub mod relation;
pub mod row;
pub mod rule;
pub mod value;

pub use context::{OpContext, Operation};
pub use error::{
    BulkError, BulkFailure, ConflictError, Error, InternalError, NotFoundError, Result,
    ValidationError, Violation, ViolationKind,
};
pub use field::{FieldInfo, Stamp};
pub use gateway::{Gateway, LifecycleObserver};
pub use model::{Model, ModelMeta};
pub use record::{FieldValue, Record};
pub use relation::{
    Cascade, LinkTableInfo, RelationInfo, RelationKind, validate_meta,
};
pub use row::{ColumnInfo, FromValue, Row};
pub use rule::{Check, FieldRule, matches_pattern, validate_pattern};
pub use value::Value;
