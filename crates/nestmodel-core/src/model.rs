//! Model trait and statically-registered metadata.
//!
//! `ModelMeta` is the explicit registry mapping a model type to its field,
//! relation, and validation-rule descriptors. It is built once from `const`
//! data at model-definition time; nothing is discovered at runtime.

use crate::error::{Error, Result};
use crate::field::FieldInfo;
use crate::record::Record;
use crate::relation::RelationInfo;
use crate::rule::FieldRule;
use crate::value::Value;

/// Statically-registered metadata for one model type.
#[derive(Debug)]
pub struct ModelMeta {
    /// Storage table name.
    pub table: &'static str,
    /// Name of the primary-key field.
    pub primary_key: &'static str,
    /// Scalar field descriptors (including the primary key).
    pub fields: &'static [FieldInfo],
    /// Relation descriptors.
    pub relations: &'static [RelationInfo],
    /// Declarative validation rules.
    pub rules: &'static [FieldRule],
}

impl ModelMeta {
    /// Look up a scalar field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a relation by field name.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationInfo> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Validation checks registered for a field (empty slice if none).
    #[must_use]
    pub fn rules_for(&self, field: &str) -> &'static [crate::rule::Check] {
        self.rules
            .iter()
            .find(|r| r.field == field)
            .map_or(&[], |r| r.checks)
    }

    /// The primary-key field descriptor.
    pub fn pk_field(&self) -> Result<&FieldInfo> {
        self.field(self.primary_key).ok_or_else(|| {
            Error::internal(format!(
                "{}: primary key field {} is not declared",
                self.table, self.primary_key
            ))
        })
    }

    /// Iterate over the fields the engine actually persists.
    pub fn persisted_fields(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields.iter().filter(|f| !f.transient)
    }
}

/// Trait for types that can be persisted through a repository.
///
/// A model converts itself to and from the orchestrator's dynamic
/// [`Record`] representation; traversal, cascades, validation, and key
/// reconciliation are all driven by the metadata.
///
/// # Example
///
/// ```ignore
/// struct Country {
///     id: Option<i64>,
///     name: Option<String>,
///     country_code: Option<String>,
/// }
///
/// static COUNTRY_META: ModelMeta = ModelMeta {
///     table: "countries",
///     primary_key: "id",
///     fields: &[
///         FieldInfo::new("id").primary_key(true).auto_increment(true),
///         FieldInfo::new("name"),
///         FieldInfo::new("country_code").unique(true),
///     ],
///     relations: &[],
///     rules: &[FieldRule::new("name", &[Check::Required])],
/// };
///
/// impl Model for Country {
///     fn meta() -> &'static ModelMeta { &COUNTRY_META }
///     // to_record / from_record / primary_key ...
/// }
/// ```
pub trait Model: Sized + Send + Sync {
    /// The statically-registered metadata for this type.
    fn meta() -> &'static ModelMeta;

    /// Convert this instance into a record graph.
    ///
    /// This is a defensive copy: the orchestrator mutates the record in
    /// place (stamps, generated keys) and the caller's instance stays
    /// untouched.
    fn to_record(&self) -> Record;

    /// Construct an instance from a record graph.
    fn from_record(record: &Record) -> Result<Self>;

    /// The primary key value, [`Value::Null`] when not yet persisted.
    fn primary_key(&self) -> Value;

    /// Check if this is a new instance (no primary key yet).
    fn is_new(&self) -> bool {
        self.primary_key().is_null()
    }
}
