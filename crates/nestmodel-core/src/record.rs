//! Dynamic record graphs.
//!
//! A [`Record`] is the orchestrator's view of one model instance: scalar
//! columns plus nested records for relation fields, paired with the model's
//! statically-registered metadata. Records are built by `Model::to_record`
//! (a defensive copy of the caller's struct), mutated in place during the
//! cascade walk (stamps, generated keys), and converted back with
//! `Model::from_record`.

use crate::model::ModelMeta;
use crate::row::Row;
use crate::value::Value;

/// The value of one record field.
///
/// `Unset` means "absent from the payload": on update the persisted value is
/// retained, on create the field persists as NULL (subject to `Required`
/// rules). This is distinct from an explicit `Scalar(Value::Null)`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent from the payload.
    Unset,
    /// A plain column value.
    Scalar(Value),
    /// A single nested record (one-to-one relation).
    One(Box<Record>),
    /// An array of nested records (one-to-many / many-to-many relation).
    Many(Vec<Record>),
}

impl FieldValue {
    /// Check whether the field carries a value.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        !matches!(self, FieldValue::Unset)
    }
}

const UNSET: &FieldValue = &FieldValue::Unset;

/// One model instance in the orchestrator's dynamic representation.
#[derive(Debug, Clone)]
pub struct Record {
    meta: &'static ModelMeta,
    fields: Vec<(&'static str, FieldValue)>,
}

impl Record {
    /// Create an empty record for a model type.
    #[must_use]
    pub fn new(meta: &'static ModelMeta) -> Self {
        Self {
            meta,
            fields: Vec::new(),
        }
    }

    /// A shallow reference record carrying only the primary key.
    ///
    /// Used when a cycle guard turns a repeated visit into a no-op reference.
    #[must_use]
    pub fn reference(meta: &'static ModelMeta, id: Value) -> Self {
        let mut record = Self::new(meta);
        record.set_primary_key(id);
        record
    }

    /// The model metadata this record belongs to.
    #[must_use]
    pub fn meta(&self) -> &'static ModelMeta {
        self.meta
    }

    /// The storage table name.
    #[must_use]
    pub fn table(&self) -> &'static str {
        self.meta.table
    }

    /// Set a field, replacing any existing value.
    pub fn set(&mut self, name: &'static str, value: FieldValue) {
        if let Some(entry) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    /// Set a scalar field.
    pub fn set_scalar(&mut self, name: &'static str, value: impl Into<Value>) {
        self.set(name, FieldValue::Scalar(value.into()));
    }

    /// Set a single nested record.
    pub fn set_one(&mut self, name: &'static str, nested: Record) {
        self.set(name, FieldValue::One(Box::new(nested)));
    }

    /// Set an array of nested records.
    pub fn set_many(&mut self, name: &'static str, nested: Vec<Record>) {
        self.set(name, FieldValue::Many(nested));
    }

    /// Remove a field (back to unset).
    pub fn unset(&mut self, name: &str) {
        self.fields.retain(|(n, _)| *n != name);
    }

    /// Get a field value; missing fields read as [`FieldValue::Unset`].
    #[must_use]
    pub fn field(&self, name: &str) -> &FieldValue {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map_or(UNSET, |(_, v)| v)
    }

    /// Get a mutable field value, if present.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.fields
            .iter_mut()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    /// Check whether a field carries a value.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.field(name).is_set()
    }

    /// Get a scalar field value.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<&Value> {
        match self.field(name) {
            FieldValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Get a single nested record.
    #[must_use]
    pub fn one(&self, name: &str) -> Option<&Record> {
        match self.field(name) {
            FieldValue::One(r) => Some(r),
            _ => None,
        }
    }

    /// Get a mutable single nested record.
    pub fn one_mut(&mut self, name: &str) -> Option<&mut Record> {
        match self.field_mut(name) {
            Some(FieldValue::One(r)) => Some(r),
            _ => None,
        }
    }

    /// Get an array of nested records.
    #[must_use]
    pub fn many(&self, name: &str) -> Option<&[Record]> {
        match self.field(name) {
            FieldValue::Many(r) => Some(r),
            _ => None,
        }
    }

    /// Get a mutable array of nested records.
    pub fn many_mut(&mut self, name: &str) -> Option<&mut Vec<Record>> {
        match self.field_mut(name) {
            Some(FieldValue::Many(r)) => Some(r),
            _ => None,
        }
    }

    /// The primary key value, [`Value::Null`] when unset.
    #[must_use]
    pub fn primary_key(&self) -> Value {
        self.scalar(self.meta.primary_key)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Write the primary key back into the record.
    pub fn set_primary_key(&mut self, id: Value) {
        self.set(self.meta.primary_key, FieldValue::Scalar(id));
    }

    /// Check whether the record has a non-null primary key.
    #[must_use]
    pub fn has_primary_key(&self) -> bool {
        !self.primary_key().is_null()
    }

    /// Merge the persisted state into this record.
    ///
    /// Fields absent from this record take the persisted value; explicitly
    /// set scalars win. Nested records merge recursively; arrays pair
    /// index-for-index, and incoming elements beyond the persisted length
    /// are kept as-is (they are creations).
    pub fn merge_from(&mut self, persisted: &Record) {
        for (name, old_value) in &persisted.fields {
            let name = *name;
            match self.field_mut(name) {
                None | Some(FieldValue::Unset) => {
                    self.set(name, old_value.clone());
                }
                Some(FieldValue::One(mine)) => {
                    if let FieldValue::One(theirs) = old_value {
                        mine.merge_from(theirs);
                    }
                }
                Some(FieldValue::Many(mine)) => {
                    if let FieldValue::Many(theirs) = old_value {
                        for (incoming, old) in mine.iter_mut().zip(theirs.iter()) {
                            incoming.merge_from(old);
                        }
                    }
                }
                Some(FieldValue::Scalar(_)) => {}
            }
        }
    }

    /// Build the storage row for this record's own table.
    ///
    /// Includes every set, non-transient scalar field; relation fields and
    /// unset fields are excluded.
    #[must_use]
    pub fn to_row(&self) -> Row {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for info in self.meta.persisted_fields() {
            if let FieldValue::Scalar(v) = self.field(info.name) {
                columns.push(info.column.to_string());
                values.push(v.clone());
            }
        }
        Row::new(columns, values)
    }

    /// Rehydrate scalar fields from a storage row.
    ///
    /// Only columns declared in the metadata are read; unknown row columns
    /// are ignored.
    #[must_use]
    pub fn from_row(meta: &'static ModelMeta, row: &Row) -> Self {
        let mut record = Self::new(meta);
        for info in meta.persisted_fields() {
            if let Some(value) = row.get_by_name(info.column) {
                record.set_scalar(info.name, value.clone());
            }
        }
        record
    }

    /// Iterate over set fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (*n, v))
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        if !std::ptr::eq(self.meta, other.meta) && self.meta.table != other.meta.table {
            return false;
        }
        // Order-insensitive: a missing field equals an explicit Unset.
        let names = self
            .fields
            .iter()
            .map(|(n, _)| *n)
            .chain(other.fields.iter().map(|(n, _)| *n));
        for name in names {
            if self.field(name) != other.field(name) {
                return false;
            }
        }
        true
    }
}
