//! Relation metadata.
//!
//! Relations are declared at model-definition time and represented as static
//! metadata on each model's [`ModelMeta`](crate::model::ModelMeta). The
//! orchestrator reads this metadata to decide traversal, cascade behavior,
//! and write ordering without runtime reflection.

use crate::error::{Error, Result};
use crate::model::ModelMeta;

/// The shape of a relationship between two models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// One nested record; the foreign key lives on either side.
    OneToOne,
    /// Many nested records carrying a foreign key back to the owner.
    OneToMany,
    /// Many nested records joined through a link table.
    ManyToMany,
}

/// Whether a write/delete on the owner also writes/deletes the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cascade {
    /// Nested entities are created/updated/deleted alongside the owner.
    #[default]
    Cascade,
    /// Nested entities are treated as existing references and left untouched.
    None,
}

impl Cascade {
    /// Check whether this policy cascades.
    #[must_use]
    pub const fn is_cascade(&self) -> bool {
        matches!(self, Cascade::Cascade)
    }
}

/// Join-table description for many-to-many relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTableInfo {
    /// The link table name (e.g., `"customer_tags"`).
    pub table: &'static str,
    /// Column in the link table pointing to the owning model.
    pub local_column: &'static str,
    /// Column in the link table pointing to the target model.
    pub remote_column: &'static str,
}

impl LinkTableInfo {
    /// Create a new link-table definition.
    #[must_use]
    pub const fn new(
        table: &'static str,
        local_column: &'static str,
        remote_column: &'static str,
    ) -> Self {
        Self {
            table,
            local_column,
            remote_column,
        }
    }
}

/// Metadata about one relation field of a model.
///
/// Immutable once registered. The target model's metadata is reached through
/// a function pointer so relation tables stay `const` and allocation-free.
#[derive(Debug, Clone, Copy)]
pub struct RelationInfo {
    /// Name of the relation field on the owning model.
    pub name: &'static str,

    /// Kind of relation.
    pub kind: RelationKind,

    /// Cascade policy for the write path (create and update).
    pub write_cascade: Cascade,

    /// Cascade policy for deletes.
    pub delete_cascade: Cascade,

    /// Whether the relation resolves to full nested record(s) (`true`) or is
    /// persisted/read as a bare foreign-key scalar and never traversed.
    pub populate: bool,

    /// Foreign-key column on the owning row (one-to-one, owner holds the FK).
    pub local_key: Option<&'static str>,

    /// Foreign-key column on the target rows (one-to-many, or one-to-one
    /// where the target holds the FK).
    pub remote_key: Option<&'static str>,

    /// Link table for many-to-many relations.
    pub link_table: Option<LinkTableInfo>,

    /// Function pointer returning the target model's metadata.
    pub target_meta: fn() -> &'static ModelMeta,
}

impl PartialEq for RelationInfo {
    fn eq(&self, other: &Self) -> bool {
        // Intentionally ignore `target_meta`: function-pointer equality is not
        // stable across codegen units and is not part of a relation's identity.
        self.name == other.name
            && self.kind == other.kind
            && self.write_cascade == other.write_cascade
            && self.delete_cascade == other.delete_cascade
            && self.populate == other.populate
            && self.local_key == other.local_key
            && self.remote_key == other.remote_key
            && self.link_table == other.link_table
    }
}

impl Eq for RelationInfo {}

impl RelationInfo {
    /// Create a new relation with required fields.
    ///
    /// Defaults: cascade writes and deletes, populated.
    #[must_use]
    pub const fn new(
        name: &'static str,
        kind: RelationKind,
        target_meta: fn() -> &'static ModelMeta,
    ) -> Self {
        Self {
            name,
            kind,
            write_cascade: Cascade::Cascade,
            delete_cascade: Cascade::Cascade,
            populate: true,
            local_key: None,
            remote_key: None,
            link_table: None,
            target_meta,
        }
    }

    /// Set the write-path cascade policy.
    #[must_use]
    pub const fn write_cascade(mut self, policy: Cascade) -> Self {
        self.write_cascade = policy;
        self
    }

    /// Set the delete cascade policy.
    #[must_use]
    pub const fn delete_cascade(mut self, policy: Cascade) -> Self {
        self.delete_cascade = policy;
        self
    }

    /// Set whether the relation is resolved to full nested record(s).
    #[must_use]
    pub const fn populate(mut self, value: bool) -> Self {
        self.populate = value;
        self
    }

    /// Set the foreign-key column on the owning row.
    #[must_use]
    pub const fn local_key(mut self, column: &'static str) -> Self {
        self.local_key = Some(column);
        self
    }

    /// Set the foreign-key column on the target rows.
    #[must_use]
    pub const fn remote_key(mut self, column: &'static str) -> Self {
        self.remote_key = Some(column);
        self
    }

    /// Set the link table metadata (many-to-many).
    #[must_use]
    pub const fn link_table(mut self, info: LinkTableInfo) -> Self {
        self.link_table = Some(info);
        self
    }

    /// Resolve the target model's metadata.
    #[must_use]
    pub fn target(&self) -> &'static ModelMeta {
        (self.target_meta)()
    }

    /// Whether the owning row carries the foreign key.
    #[must_use]
    pub const fn owner_holds_key(&self) -> bool {
        self.local_key.is_some()
    }
}

/// Validate the relation configuration of a model's metadata.
///
/// Misconfigured relations are programmer errors and surface as
/// [`Error::Internal`] before any I/O is attempted:
///
/// - one-to-one relations need exactly one of `local_key`/`remote_key`
/// - one-to-many relations need `remote_key` and nothing else
/// - many-to-many relations need a `link_table` and nothing else
/// - `populate = false` is only meaningful when the owner holds the key
pub fn validate_meta(meta: &ModelMeta) -> Result<()> {
    for relation in meta.relations {
        let path = format!("{}.{}", meta.table, relation.name);
        match relation.kind {
            RelationKind::OneToOne => {
                if relation.local_key.is_some() == relation.remote_key.is_some() {
                    return Err(Error::internal(format!(
                        "{path}: one-to-one relations need exactly one of local_key/remote_key"
                    )));
                }
                if relation.link_table.is_some() {
                    return Err(Error::internal(format!(
                        "{path}: one-to-one relations cannot use a link table"
                    )));
                }
            }
            RelationKind::OneToMany => {
                if relation.remote_key.is_none() {
                    return Err(Error::internal(format!(
                        "{path}: one-to-many relations need remote_key"
                    )));
                }
                if relation.local_key.is_some() || relation.link_table.is_some() {
                    return Err(Error::internal(format!(
                        "{path}: one-to-many relations only carry remote_key"
                    )));
                }
            }
            RelationKind::ManyToMany => {
                if relation.link_table.is_none() {
                    return Err(Error::internal(format!(
                        "{path}: many-to-many relations need a link table"
                    )));
                }
                if relation.local_key.is_some() || relation.remote_key.is_some() {
                    return Err(Error::internal(format!(
                        "{path}: many-to-many relations only carry a link table"
                    )));
                }
            }
        }
        if !relation.populate && !relation.owner_holds_key() {
            return Err(Error::internal(format!(
                "{path}: populate=false requires the owner to hold the foreign key"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldInfo;

    static TARGET_META: ModelMeta = ModelMeta {
        table: "countries",
        primary_key: "id",
        fields: &[FieldInfo::new("id").primary_key(true)],
        relations: &[],
        rules: &[],
    };

    fn target_meta() -> &'static ModelMeta {
        &TARGET_META
    }

    static META_FIELDS: [FieldInfo; 1] = [FieldInfo::new("id").primary_key(true)];

    fn meta_with(relations: &'static [RelationInfo]) -> ModelMeta {
        ModelMeta {
            table: "addresses",
            primary_key: "id",
            fields: &META_FIELDS,
            relations,
            rules: &[],
        }
    }

    #[test]
    fn test_builder_chain() {
        let info = RelationInfo::new("country", RelationKind::OneToOne, target_meta)
            .local_key("country_id")
            .write_cascade(Cascade::None)
            .populate(false);

        assert_eq!(info.name, "country");
        assert_eq!(info.kind, RelationKind::OneToOne);
        assert_eq!(info.write_cascade, Cascade::None);
        assert_eq!(info.delete_cascade, Cascade::Cascade);
        assert!(!info.populate);
        assert!(info.owner_holds_key());
        assert_eq!(info.target().table, "countries");
    }

    #[test]
    fn test_validate_one_to_one_requires_one_key() {
        static BAD: [RelationInfo; 1] =
            [RelationInfo::new("country", RelationKind::OneToOne, target_meta)];
        let meta = meta_with(&BAD);
        assert!(validate_meta(&meta).is_err());

        static GOOD: [RelationInfo; 1] =
            [RelationInfo::new("country", RelationKind::OneToOne, target_meta)
                .local_key("country_id")];
        let meta = meta_with(&GOOD);
        assert!(validate_meta(&meta).is_ok());
    }

    #[test]
    fn test_validate_one_to_many_requires_remote_key() {
        static BAD: [RelationInfo; 1] =
            [RelationInfo::new("orders", RelationKind::OneToMany, target_meta)];
        let meta = meta_with(&BAD);
        assert!(validate_meta(&meta).is_err());
    }

    #[test]
    fn test_validate_many_to_many_requires_link_table() {
        static BAD: [RelationInfo; 1] =
            [RelationInfo::new("tags", RelationKind::ManyToMany, target_meta)];
        let meta = meta_with(&BAD);
        assert!(validate_meta(&meta).is_err());

        static GOOD: [RelationInfo; 1] =
            [RelationInfo::new("tags", RelationKind::ManyToMany, target_meta)
                .link_table(LinkTableInfo::new("customer_tags", "customer_id", "tag_id"))];
        let meta = meta_with(&GOOD);
        assert!(validate_meta(&meta).is_ok());
    }

    #[test]
    fn test_validate_populate_false_needs_local_key() {
        static BAD: [RelationInfo; 1] =
            [RelationInfo::new("orders", RelationKind::OneToMany, target_meta)
                .remote_key("customer_id")
                .populate(false)];
        let meta = meta_with(&BAD);
        assert!(validate_meta(&meta).is_err());
    }

    #[test]
    fn test_relation_equality_ignores_target_fn() {
        let a = RelationInfo::new("country", RelationKind::OneToOne, target_meta)
            .local_key("country_id");
        let b = RelationInfo::new("country", RelationKind::OneToOne, target_meta)
            .local_key("country_id");
        assert_eq!(a, b);
    }
}
