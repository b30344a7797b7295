//! Recursive cascading persistence.
//!
//! The orchestrator walks a record graph and drives every CRUD verb through
//! the same three-phase shape: **prefix** (validate + stamp + resolve
//! relations to persistable form), **execute** (delegate row I/O to the
//! storage engine), **revert** (rehydrate returned rows, repopulating
//! cascaded relations and reconciling generated keys).
//!
//! Write ordering is fixed by foreign-key direction:
//! - owner holds the FK: the child is persisted strictly before the owner
//! - target holds the FK: the owner is persisted first, children afterwards
//! - many-to-many junction rows are created only after both sides exist
//!
//! Deletes run child-first; owner-held FK targets are removed after the
//! owning row is gone.

use crate::enforce::enforce;
use crate::key::VisitKey;
use nestmodel_core::record::{FieldValue, Record};
use nestmodel_core::relation::{RelationKind, validate_meta};
use nestmodel_core::row::Row;
use nestmodel_core::{
    BulkError, Cx, Error, Gateway, ModelMeta, OpContext, Operation, Outcome, ValidationError,
    Value,
};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

/// Propagate non-`Ok` outcomes unchanged (cancel-correct `?`).
macro_rules! try_outcome {
    ($expr:expr) => {
        match $expr {
            Outcome::Ok(value) => value,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
    };
}

type BoxOutcome<'a, T> = Pin<Box<dyn Future<Output = Outcome<T, Error>> + Send + 'a>>;

/// Drives validate → cascade → persist → rehydrate pipelines against a
/// storage engine.
pub struct Orchestrator<'g, G: Gateway> {
    gateway: &'g G,
}

impl<'g, G: Gateway> Orchestrator<'g, G> {
    /// Create an orchestrator borrowing the given engine.
    #[must_use]
    pub fn new(gateway: &'g G) -> Self {
        Self { gateway }
    }

    // ========================================================================
    // Single-record operations
    // ========================================================================

    /// Persist a new record graph and return it with generated keys filled in.
    #[tracing::instrument(level = "debug", skip_all, fields(table = record.table()))]
    pub async fn create(
        &self,
        cx: &Cx,
        mut record: Record,
        ctx: &OpContext,
    ) -> Outcome<Record, Error> {
        if let Err(e) = validate_meta(record.meta()) {
            return Outcome::Err(e);
        }
        if let Err(violations) = enforce(&mut record, ctx, Operation::Create, None) {
            return Outcome::Err(Error::Validation(violations));
        }
        try_outcome!(self.persist_node(cx, &mut record, ctx, Operation::Create).await);
        Outcome::Ok(record)
    }

    /// Fetch a record graph by primary key, populating relations to
    /// arbitrary depth.
    #[tracing::instrument(level = "debug", skip_all, fields(table = meta.table))]
    pub async fn read(
        &self,
        cx: &Cx,
        meta: &'static ModelMeta,
        id: &Value,
    ) -> Outcome<Record, Error> {
        if let Err(e) = validate_meta(meta) {
            return Outcome::Err(e);
        }
        let mut visited = HashSet::new();
        self.read_node(cx, meta, id.clone(), &mut visited).await
    }

    /// Merge a partial record onto the persisted state and rewrite it.
    #[tracing::instrument(level = "debug", skip_all, fields(table = record.table()))]
    pub async fn update(
        &self,
        cx: &Cx,
        mut record: Record,
        ctx: &OpContext,
    ) -> Outcome<Record, Error> {
        let meta = record.meta();
        if let Err(e) = validate_meta(meta) {
            return Outcome::Err(e);
        }
        let id = record.primary_key();
        if id.is_null() {
            return Outcome::Err(Error::internal(format!(
                "{}: update requires a primary key",
                meta.table
            )));
        }

        let mut visited = HashSet::new();
        let old = try_outcome!(self.read_node(cx, meta, id, &mut visited).await);
        record.merge_from(&old);

        if let Err(violations) = enforce(&mut record, ctx, Operation::Update, Some(&old)) {
            return Outcome::Err(Error::Validation(violations));
        }
        try_outcome!(self.persist_node(cx, &mut record, ctx, Operation::Update).await);
        Outcome::Ok(record)
    }

    /// Delete a record graph and return its last known state.
    #[tracing::instrument(level = "debug", skip_all, fields(table = meta.table))]
    pub async fn delete(
        &self,
        cx: &Cx,
        meta: &'static ModelMeta,
        id: &Value,
    ) -> Outcome<Record, Error> {
        if let Err(e) = validate_meta(meta) {
            return Outcome::Err(e);
        }
        let mut deleted = HashSet::new();
        self.delete_node(cx, meta, id.clone(), &mut deleted).await
    }

    // ========================================================================
    // Bulk operations
    // ========================================================================

    /// Persist several new record graphs.
    ///
    /// Prefix validation runs over every item first and reports all
    /// per-index violations together. Flat graphs (no populated relation
    /// set) are batched into one engine round trip; execute-phase failures
    /// are collected into an aggregate [`BulkError`].
    #[tracing::instrument(level = "debug", skip_all, fields(count = records.len()))]
    pub async fn create_all(
        &self,
        cx: &Cx,
        mut records: Vec<Record>,
        ctx: &OpContext,
    ) -> Outcome<Vec<Record>, Error> {
        let Some(first) = records.first() else {
            return Outcome::Ok(records);
        };
        let meta = first.meta();
        if let Err(e) = validate_meta(meta) {
            return Outcome::Err(e);
        }

        let mut errors = ValidationError::new();
        for (index, record) in records.iter_mut().enumerate() {
            if let Err(violations) = enforce(record, ctx, Operation::Create, None) {
                errors.absorb(&format!("[{index}]"), violations);
            }
        }
        if let Err(e) = errors.into_result() {
            return Outcome::Err(e);
        }

        let flat = records.iter().all(|record| {
            record
                .meta()
                .relations
                .iter()
                .all(|relation| !relation.populate || !record.is_set(relation.name))
        });
        if flat {
            let rows: Vec<Row> = records.iter().map(Record::to_row).collect();
            let stored = try_outcome!(self.gateway.insert_all(cx, meta.table, rows).await);
            for (record, row) in records.iter_mut().zip(stored.iter()) {
                finish_node(record, row, ctx);
            }
            return Outcome::Ok(records);
        }

        let mut bulk = BulkError::new();
        for (index, record) in records.iter_mut().enumerate() {
            match self.persist_node(cx, record, ctx, Operation::Create).await {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => bulk.push(index, e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        if bulk.is_empty() {
            Outcome::Ok(records)
        } else {
            Outcome::Err(Error::Bulk(bulk))
        }
    }

    /// Fetch every record of a table, populating relations per root.
    #[tracing::instrument(level = "debug", skip_all, fields(table = meta.table))]
    pub async fn read_all(
        &self,
        cx: &Cx,
        meta: &'static ModelMeta,
    ) -> Outcome<Vec<Record>, Error> {
        if let Err(e) = validate_meta(meta) {
            return Outcome::Err(e);
        }
        let rows = try_outcome!(self.gateway.read_all(cx, meta.table).await);
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut visited = HashSet::new();
            out.push(try_outcome!(self.hydrate(cx, meta, row, &mut visited).await));
        }
        Outcome::Ok(out)
    }

    /// Merge-and-rewrite several record graphs.
    ///
    /// The prefix phase (read + merge + validate) runs over every item and
    /// reports all failures together before any write happens.
    #[tracing::instrument(level = "debug", skip_all, fields(count = records.len()))]
    pub async fn update_all(
        &self,
        cx: &Cx,
        mut records: Vec<Record>,
        ctx: &OpContext,
    ) -> Outcome<Vec<Record>, Error> {
        let Some(first) = records.first() else {
            return Outcome::Ok(records);
        };
        if let Err(e) = validate_meta(first.meta()) {
            return Outcome::Err(e);
        }

        let mut errors = ValidationError::new();
        let mut prefix_failures = BulkError::new();
        for (index, record) in records.iter_mut().enumerate() {
            let meta = record.meta();
            let id = record.primary_key();
            if id.is_null() {
                prefix_failures.push(
                    index,
                    Error::internal(format!("{}: update requires a primary key", meta.table)),
                );
                continue;
            }
            let mut visited = HashSet::new();
            match self.read_node(cx, meta, id, &mut visited).await {
                Outcome::Ok(old) => {
                    record.merge_from(&old);
                    if let Err(violations) = enforce(record, ctx, Operation::Update, Some(&old)) {
                        errors.absorb(&format!("[{index}]"), violations);
                    }
                }
                Outcome::Err(e) => prefix_failures.push(index, e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        if let Err(e) = errors.into_result() {
            return Outcome::Err(e);
        }
        if !prefix_failures.is_empty() {
            return Outcome::Err(Error::Bulk(prefix_failures));
        }

        let mut bulk = BulkError::new();
        for (index, record) in records.iter_mut().enumerate() {
            match self.persist_node(cx, record, ctx, Operation::Update).await {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => bulk.push(index, e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        if bulk.is_empty() {
            Outcome::Ok(records)
        } else {
            Outcome::Err(Error::Bulk(bulk))
        }
    }

    /// Delete several record graphs by primary key.
    #[tracing::instrument(level = "debug", skip_all, fields(table = meta.table, count = ids.len()))]
    pub async fn delete_all(
        &self,
        cx: &Cx,
        meta: &'static ModelMeta,
        ids: &[Value],
    ) -> Outcome<Vec<Record>, Error> {
        if let Err(e) = validate_meta(meta) {
            return Outcome::Err(e);
        }
        let mut bulk = BulkError::new();
        let mut out = Vec::with_capacity(ids.len());
        for (index, id) in ids.iter().enumerate() {
            let mut deleted = HashSet::new();
            match self.delete_node(cx, meta, id.clone(), &mut deleted).await {
                Outcome::Ok(record) => out.push(record),
                Outcome::Err(e) => bulk.push(index, e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        if bulk.is_empty() {
            Outcome::Ok(out)
        } else {
            Outcome::Err(Error::Bulk(bulk))
        }
    }

    // ========================================================================
    // Recursive walkers
    // ========================================================================

    /// Persist one node of the graph (and its cascaded relations) in place.
    fn persist_node<'a>(
        &'a self,
        cx: &'a Cx,
        record: &'a mut Record,
        ctx: &'a OpContext,
        operation: Operation,
    ) -> BoxOutcome<'a, ()> {
        Box::pin(async move {
            let meta = record.meta();

            // Children the owner references: persisted before the owning row
            // so the FK column is available at insert time.
            for relation in meta.relations {
                let Some(local_key) = relation.local_key else {
                    continue;
                };
                let taken = match record.field_mut(relation.name) {
                    Some(slot @ FieldValue::One(_)) => {
                        Some(std::mem::replace(slot, FieldValue::Unset))
                    }
                    _ => None,
                };
                let Some(FieldValue::One(mut child)) = taken else {
                    continue;
                };
                if relation.populate && relation.write_cascade.is_cascade() {
                    let child_op = write_op(&child);
                    try_outcome!(self.persist_node(cx, &mut child, ctx, child_op).await);
                }
                let fk = child.primary_key();
                record.set_one(relation.name, *child);
                if !fk.is_null() {
                    record.set_scalar(local_key, fk);
                }
            }

            let row = record.to_row();
            let stored = match operation {
                Operation::Create => {
                    try_outcome!(self.gateway.insert(cx, meta.table, row).await)
                }
                Operation::Update => {
                    let id = record.primary_key();
                    try_outcome!(self.gateway.update(cx, meta.table, &id, row).await)
                }
                Operation::Delete => {
                    return Outcome::Err(Error::internal("persist_node called with delete"));
                }
            };
            finish_node(record, &stored, ctx);
            let root_pk = record.primary_key();

            // Children carrying the FK back to the owner: persisted after the
            // owning row exists.
            for relation in meta.relations {
                if !relation.populate || !relation.write_cascade.is_cascade() {
                    continue;
                }
                match relation.kind {
                    RelationKind::OneToOne | RelationKind::OneToMany => {
                        let Some(remote_key) = relation.remote_key else {
                            continue;
                        };
                        let taken = match record.field_mut(relation.name) {
                            Some(slot @ (FieldValue::One(_) | FieldValue::Many(_))) => {
                                Some(std::mem::replace(slot, FieldValue::Unset))
                            }
                            _ => None,
                        };
                        match taken {
                            Some(FieldValue::One(mut child)) => {
                                child.set_scalar(remote_key, root_pk.clone());
                                let child_op = write_op(&child);
                                try_outcome!(
                                    self.persist_node(cx, &mut child, ctx, child_op).await
                                );
                                record.set_one(relation.name, *child);
                            }
                            Some(FieldValue::Many(mut children)) => {
                                for child in &mut children {
                                    child.set_scalar(remote_key, root_pk.clone());
                                    let child_op = write_op(child);
                                    try_outcome!(
                                        self.persist_node(cx, child, ctx, child_op).await
                                    );
                                }
                                record.set_many(relation.name, children);
                            }
                            _ => {}
                        }
                    }
                    RelationKind::ManyToMany => {
                        let Some(link) = relation.link_table else {
                            continue;
                        };
                        let taken = match record.field_mut(relation.name) {
                            Some(slot @ FieldValue::Many(_)) => {
                                Some(std::mem::replace(slot, FieldValue::Unset))
                            }
                            _ => None,
                        };
                        let Some(FieldValue::Many(mut children)) = taken else {
                            continue;
                        };
                        for child in &mut children {
                            let child_op = write_op(child);
                            try_outcome!(self.persist_node(cx, child, ctx, child_op).await);
                        }
                        // Junction rows are replaced as a set so re-running an
                        // update stays idempotent.
                        if matches!(operation, Operation::Update) {
                            try_outcome!(
                                self.gateway
                                    .delete_by(cx, link.table, link.local_column, &root_pk)
                                    .await
                            );
                        }
                        for child in &children {
                            let link_row = Row::new(
                                vec![
                                    link.local_column.to_string(),
                                    link.remote_column.to_string(),
                                ],
                                vec![root_pk.clone(), child.primary_key()],
                            );
                            try_outcome!(self.gateway.insert(cx, link.table, link_row).await);
                        }
                        record.set_many(relation.name, children);
                    }
                }
            }

            Outcome::Ok(())
        })
    }

    /// Fetch and hydrate a node by primary key.
    fn read_node<'a>(
        &'a self,
        cx: &'a Cx,
        meta: &'static ModelMeta,
        id: Value,
        visited: &'a mut HashSet<VisitKey>,
    ) -> BoxOutcome<'a, Record> {
        Box::pin(async move {
            let key = VisitKey::new(meta.table, &id);
            if visited.contains(&key) {
                return Outcome::Ok(Record::reference(meta, id));
            }
            let row = try_outcome!(self.gateway.read(cx, meta.table, &id).await);
            let Some(row) = row else {
                return Outcome::Err(Error::not_found(meta.table, id));
            };
            self.hydrate(cx, meta, row, visited).await
        })
    }

    /// Hydrate a fetched row into a record, populating relations.
    fn hydrate<'a>(
        &'a self,
        cx: &'a Cx,
        meta: &'static ModelMeta,
        row: Row,
        visited: &'a mut HashSet<VisitKey>,
    ) -> BoxOutcome<'a, Record> {
        Box::pin(async move {
            let mut record = Record::from_row(meta, &row);
            let id = record.primary_key();
            if !visited.insert(VisitKey::new(meta.table, &id)) {
                return Outcome::Ok(Record::reference(meta, id));
            }

            for relation in meta.relations {
                if !relation.populate {
                    continue;
                }
                let target = relation.target();
                match relation.kind {
                    RelationKind::OneToOne => {
                        if let Some(local_key) = relation.local_key {
                            let fk = record.scalar(local_key).cloned().unwrap_or(Value::Null);
                            if !fk.is_null() {
                                // A missing target behind a non-null FK is a
                                // NotFound naming the nested identity.
                                let child =
                                    try_outcome!(self.read_node(cx, target, fk, visited).await);
                                record.set_one(relation.name, child);
                            }
                        } else if let Some(remote_key) = relation.remote_key {
                            let rows = try_outcome!(
                                self.gateway.read_by(cx, target.table, remote_key, &id).await
                            );
                            if let Some(child_row) = rows.into_iter().next() {
                                let child =
                                    try_outcome!(self.hydrate(cx, target, child_row, visited).await);
                                record.set_one(relation.name, child);
                            }
                        }
                    }
                    RelationKind::OneToMany => {
                        let Some(remote_key) = relation.remote_key else {
                            continue;
                        };
                        let rows = try_outcome!(
                            self.gateway.read_by(cx, target.table, remote_key, &id).await
                        );
                        let mut children = Vec::with_capacity(rows.len());
                        for child_row in rows {
                            children.push(try_outcome!(
                                self.hydrate(cx, target, child_row, visited).await
                            ));
                        }
                        record.set_many(relation.name, children);
                    }
                    RelationKind::ManyToMany => {
                        let Some(link) = relation.link_table else {
                            continue;
                        };
                        let links = try_outcome!(
                            self.gateway
                                .read_by(cx, link.table, link.local_column, &id)
                                .await
                        );
                        let mut children = Vec::with_capacity(links.len());
                        for link_row in links {
                            let Some(remote_id) =
                                link_row.get_by_name(link.remote_column).cloned()
                            else {
                                tracing::warn!(
                                    table = link.table,
                                    column = link.remote_column,
                                    "junction row missing remote key column, skipping"
                                );
                                continue;
                            };
                            children.push(try_outcome!(
                                self.read_node(cx, target, remote_id, visited).await
                            ));
                        }
                        record.set_many(relation.name, children);
                    }
                }
            }

            Outcome::Ok(record)
        })
    }

    /// Delete one node and its cascading relations, child-first.
    fn delete_node<'a>(
        &'a self,
        cx: &'a Cx,
        meta: &'static ModelMeta,
        id: Value,
        deleted: &'a mut HashSet<VisitKey>,
    ) -> BoxOutcome<'a, Record> {
        Box::pin(async move {
            if !deleted.insert(VisitKey::new(meta.table, &id)) {
                return Outcome::Ok(Record::reference(meta, id));
            }

            // Last known state, fully populated; also the source of child ids.
            let mut visited = HashSet::new();
            let record = try_outcome!(self.read_node(cx, meta, id.clone(), &mut visited).await);

            // Children referencing the root go first.
            for relation in meta.relations {
                if !relation.populate {
                    continue;
                }
                let target = relation.target();
                match relation.kind {
                    RelationKind::OneToOne if relation.remote_key.is_some() => {
                        if relation.delete_cascade.is_cascade() {
                            if let Some(child) = record.one(relation.name) {
                                let child_id = child.primary_key();
                                if !child_id.is_null() {
                                    try_outcome!(
                                        self.delete_node(cx, target, child_id, deleted).await
                                    );
                                }
                            }
                        }
                    }
                    RelationKind::OneToMany => {
                        if relation.delete_cascade.is_cascade() {
                            let child_ids: Vec<Value> = record
                                .many(relation.name)
                                .unwrap_or(&[])
                                .iter()
                                .map(Record::primary_key)
                                .filter(|child_id| !child_id.is_null())
                                .collect();
                            for child_id in child_ids {
                                try_outcome!(self.delete_node(cx, target, child_id, deleted).await);
                            }
                        }
                    }
                    RelationKind::ManyToMany => {
                        let Some(link) = relation.link_table else {
                            continue;
                        };
                        // Junction rows reference the dying row and go
                        // regardless of the cascade policy.
                        try_outcome!(
                            self.gateway
                                .delete_by(cx, link.table, link.local_column, &id)
                                .await
                        );
                        if relation.delete_cascade.is_cascade() {
                            let child_ids: Vec<Value> = record
                                .many(relation.name)
                                .unwrap_or(&[])
                                .iter()
                                .map(Record::primary_key)
                                .filter(|child_id| !child_id.is_null())
                                .collect();
                            for child_id in child_ids {
                                try_outcome!(self.delete_node(cx, target, child_id, deleted).await);
                            }
                        }
                    }
                    RelationKind::OneToOne => {}
                }
            }

            try_outcome!(self.gateway.delete(cx, meta.table, &id).await);

            // Targets the root referenced are removed after the owning row.
            for relation in meta.relations {
                if !relation.populate || !relation.delete_cascade.is_cascade() {
                    continue;
                }
                if let (RelationKind::OneToOne, Some(local_key)) = (relation.kind, relation.local_key)
                {
                    let fk = record.scalar(local_key).cloned().unwrap_or(Value::Null);
                    if !fk.is_null() {
                        try_outcome!(
                            self.delete_node(cx, relation.target(), fk, deleted).await
                        );
                    }
                }
            }

            Outcome::Ok(record)
        })
    }
}

/// Pick create vs update for a cascaded child by key presence.
fn write_op(child: &Record) -> Operation {
    if child.has_primary_key() {
        Operation::Update
    } else {
        Operation::Create
    }
}

/// Revert phase for one node: adopt the stored row (generated keys, engine
/// defaults) and drop transient fields unless the context keeps them.
fn finish_node(record: &mut Record, stored: &Row, ctx: &OpContext) {
    let meta = record.meta();
    for info in meta.persisted_fields() {
        if let Some(value) = stored.get_by_name(info.column) {
            record.set_scalar(info.name, value.clone());
        }
    }
    if !ctx.rebuilds_transient() {
        let transient: Vec<&'static str> = meta
            .fields
            .iter()
            .filter(|f| f.transient)
            .map(|f| f.name)
            .collect();
        for name in transient {
            record.unset(name);
        }
    }
}
