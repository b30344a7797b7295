//! Field/column metadata.

/// Value-generation rule attached to a field.
///
/// Stamps are applied by the enforcer before any I/O, scoped to the
/// operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stamp {
    /// No generated value.
    #[default]
    None,
    /// Set to the current time on CREATE only; untouched afterwards.
    CreatedAt,
    /// Refreshed to the current time on every CREATE and UPDATE.
    UpdatedAt,
}

/// Metadata about a model field/column.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Storage column name (may differ from field name)
    pub column: &'static str,
    /// Whether this is the primary key
    pub primary_key: bool,
    /// Whether the engine generates this key on insert
    pub auto_increment: bool,
    /// Whether this field has a unique constraint
    pub unique: bool,
    /// Whether this field is nullable
    pub nullable: bool,
    /// Whether the engine skips this field; rebuilt from the pre-persist
    /// snapshot when the operation context asks for it
    pub transient: bool,
    /// Value-generation rule for this field
    pub stamp: Stamp,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    ///
    /// The column name defaults to the field name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            column: name,
            primary_key: false,
            auto_increment: false,
            unique: false,
            nullable: false,
            transient: false,
            stamp: Stamp::None,
        }
    }

    /// Set the storage column name.
    #[must_use]
    pub const fn column(mut self, name: &'static str) -> Self {
        self.column = name;
        self
    }

    /// Set primary key flag.
    #[must_use]
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set auto-increment flag.
    #[must_use]
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    /// Set unique flag.
    #[must_use]
    pub const fn unique(mut self, value: bool) -> Self {
        self.unique = value;
        self
    }

    /// Set nullable flag.
    #[must_use]
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set transient flag.
    #[must_use]
    pub const fn transient(mut self, value: bool) -> Self {
        self.transient = value;
        self
    }

    /// Set the value-generation rule.
    #[must_use]
    pub const fn stamp(mut self, stamp: Stamp) -> Self {
        self.stamp = stamp;
        self
    }
}
