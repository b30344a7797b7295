//! In-memory storage engine for NestModel.
//!
//! `MemEngine` implements the [`Gateway`] boundary against plain in-process
//! tables: registered table specs drive primary-key generation and unique
//! constraint enforcement, and every completed mutation fires the engine's
//! native lifecycle hooks exactly once with the affected id set.
//!
//! The engine backs the integration test suite and demos; it deliberately
//! provides no durability, transactions, or query planning.

use nestmodel_core::{
    Cx, Error, Gateway, LifecycleObserver, ModelMeta, Outcome, Result, Row, Value,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

type StoredRow = HashMap<String, Value>;

/// Schema registration for one table.
#[derive(Debug, Clone)]
pub struct TableSpec {
    /// Table name.
    pub table: String,
    /// Primary key column.
    pub primary_key: String,
    /// Whether the engine generates missing primary keys.
    pub auto_increment: bool,
    /// Columns with a unique constraint.
    pub unique: Vec<String>,
}

impl TableSpec {
    /// Create a spec with an auto-incrementing primary key.
    pub fn new(table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: primary_key.into(),
            auto_increment: true,
            unique: Vec::new(),
        }
    }

    /// Set whether missing primary keys are generated (builder pattern).
    #[must_use]
    pub fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    /// Add a unique column (builder pattern).
    #[must_use]
    pub fn unique(mut self, column: impl Into<String>) -> Self {
        self.unique.push(column.into());
        self
    }

    /// Derive a spec from a model's registered metadata.
    #[must_use]
    pub fn from_meta(meta: &ModelMeta) -> Self {
        let auto = meta
            .field(meta.primary_key)
            .is_some_and(|f| f.auto_increment);
        let unique = meta
            .fields
            .iter()
            .filter(|f| f.unique && !f.primary_key)
            .map(|f| f.column.to_string())
            .collect();
        Self {
            table: meta.table.to_string(),
            primary_key: meta.primary_key.to_string(),
            auto_increment: auto,
            unique,
        }
    }
}

#[derive(Debug)]
struct MemTable {
    spec: TableSpec,
    next_id: i64,
    rows: Vec<StoredRow>,
}

impl MemTable {
    fn new(spec: TableSpec) -> Self {
        Self {
            spec,
            next_id: 1,
            rows: Vec::new(),
        }
    }

    fn pk(&self) -> &str {
        &self.spec.primary_key
    }

    fn position(&self, id: &Value) -> Option<usize> {
        self.rows.iter().position(|r| r.get(self.pk()) == Some(id))
    }

    fn check_unique(&self, map: &StoredRow, skip: Option<usize>) -> Result<()> {
        for column in &self.spec.unique {
            let Some(value) = map.get(column) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let taken = self
                .rows
                .iter()
                .enumerate()
                .any(|(i, r)| Some(i) != skip && r.get(column) == Some(value));
            if taken {
                return Err(Error::conflict(
                    self.spec.table.clone(),
                    column.clone(),
                    format!("duplicate value {value:?}"),
                ));
            }
        }
        Ok(())
    }

    fn insert_row(&mut self, mut map: StoredRow) -> Result<(StoredRow, Value)> {
        let pk = self.spec.primary_key.clone();
        if map.get(&pk).is_none_or(Value::is_null) {
            if !self.spec.auto_increment {
                return Err(Error::internal(format!(
                    "{}: insert without a primary key",
                    self.spec.table
                )));
            }
            let id = self.next_id;
            self.next_id += 1;
            map.insert(pk.clone(), Value::BigInt(id));
        } else {
            let id = map[&pk].clone();
            if self.position(&id).is_some() {
                return Err(Error::conflict(
                    self.spec.table.clone(),
                    pk.clone(),
                    "duplicate primary key",
                ));
            }
            // Keep generated keys clear of caller-chosen numeric keys.
            if let Value::BigInt(n) = id {
                self.next_id = self.next_id.max(n + 1);
            }
        }
        self.check_unique(&map, None)?;
        let id = map[&pk].clone();
        self.rows.push(map.clone());
        Ok((map, id))
    }

    fn update_row(&mut self, id: &Value, incoming: &Row) -> Result<StoredRow> {
        let Some(index) = self.position(id) else {
            return Err(Error::not_found(self.spec.table.clone(), id.clone()));
        };
        let mut merged = self.rows[index].clone();
        for (name, value) in incoming.iter() {
            merged.insert(name.to_string(), value.clone());
        }
        self.check_unique(&merged, Some(index))?;
        self.rows[index] = merged.clone();
        Ok(merged)
    }
}

#[derive(Default)]
struct MemInner {
    tables: RwLock<HashMap<String, MemTable>>,
    observers: RwLock<Vec<Arc<dyn LifecycleObserver>>>,
    connected: AtomicBool,
}

enum Hook {
    Insert,
    Update,
    Remove,
}

fn fire(inner: &Arc<MemInner>, hook: &Hook, table: &str, ids: &[Value]) {
    if ids.is_empty() {
        return;
    }
    let observers: Vec<Arc<dyn LifecycleObserver>> = inner
        .observers
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone();
    for observer in observers {
        match hook {
            Hook::Insert => observer.after_insert(table, ids),
            Hook::Update => observer.after_update(table, ids),
            Hook::Remove => observer.after_remove(table, ids),
        }
    }
}

fn row_to_map(row: &Row) -> StoredRow {
    row.iter().map(|(n, v)| (n.to_string(), v.clone())).collect()
}

fn map_to_row(map: &StoredRow) -> Row {
    let columns: Vec<String> = map.keys().cloned().collect();
    let values: Vec<Value> = columns.iter().map(|c| map[c].clone()).collect();
    Row::new(columns, values)
}

/// In-memory storage engine with native lifecycle hooks.
#[derive(Clone)]
pub struct MemEngine {
    inner: Arc<MemInner>,
}

impl Default for MemEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemEngine {
    /// Create a connected, empty engine.
    #[must_use]
    pub fn new() -> Self {
        let engine = Self {
            inner: Arc::new(MemInner::default()),
        };
        engine.inner.connected.store(true, Ordering::Release);
        engine
    }

    /// Register a table before use.
    ///
    /// Re-registering an existing table keeps its rows.
    pub fn register_table(&self, spec: TableSpec) {
        let mut tables = self.inner.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.entry(spec.table.clone()).or_insert_with(|| {
            tracing::debug!(table = %spec.table, "registered table");
            MemTable::new(spec)
        });
    }

    /// Register tables for a model's metadata, including link tables.
    pub fn register_model(&self, meta: &ModelMeta) {
        self.register_table(TableSpec::from_meta(meta));
        for relation in meta.relations {
            if let Some(link) = relation.link_table {
                self.register_table(TableSpec::new(link.table, "id"));
            }
        }
    }

    /// Toggle the simulated connection (handshake testing).
    pub fn set_connected(&self, value: bool) {
        self.inner.connected.store(value, Ordering::Release);
    }

    /// Number of rows currently stored in a table.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.inner
            .tables
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(table)
            .map_or(0, |t| t.rows.len())
    }
}

impl std::fmt::Debug for MemEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.inner.tables.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("MemEngine")
            .field("tables", &tables.len())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Gateway for MemEngine {
    fn insert(
        &self,
        _cx: &Cx,
        table: &str,
        row: Row,
    ) -> impl Future<Output = Outcome<Row, Error>> + Send {
        let inner = Arc::clone(&self.inner);
        let table = table.to_string();
        async move {
            let (stored, id) = {
                let mut tables = inner.tables.write().unwrap_or_else(|e| e.into_inner());
                let Some(mem_table) = tables.get_mut(&table) else {
                    return Outcome::Err(Error::internal(format!("{table}: table not registered")));
                };
                match mem_table.insert_row(row_to_map(&row)) {
                    Ok(done) => done,
                    Err(e) => return Outcome::Err(e),
                }
            };
            fire(&inner, &Hook::Insert, &table, &[id]);
            Outcome::Ok(map_to_row(&stored))
        }
    }

    fn insert_all(
        &self,
        _cx: &Cx,
        table: &str,
        rows: Vec<Row>,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let inner = Arc::clone(&self.inner);
        let table = table.to_string();
        async move {
            let (stored, ids) = {
                let mut tables = inner.tables.write().unwrap_or_else(|e| e.into_inner());
                let Some(mem_table) = tables.get_mut(&table) else {
                    return Outcome::Err(Error::internal(format!("{table}: table not registered")));
                };
                let mut stored = Vec::with_capacity(rows.len());
                let mut ids = Vec::with_capacity(rows.len());
                for row in &rows {
                    match mem_table.insert_row(row_to_map(row)) {
                        Ok((map, id)) => {
                            stored.push(map_to_row(&map));
                            ids.push(id);
                        }
                        Err(e) => return Outcome::Err(e),
                    }
                }
                (stored, ids)
            };
            // One hook per completed bulk mutation, carrying the id set.
            fire(&inner, &Hook::Insert, &table, &ids);
            Outcome::Ok(stored)
        }
    }

    fn read(
        &self,
        _cx: &Cx,
        table: &str,
        id: &Value,
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let inner = Arc::clone(&self.inner);
        let table = table.to_string();
        let id = id.clone();
        async move {
            let tables = inner.tables.read().unwrap_or_else(|e| e.into_inner());
            let row = tables
                .get(&table)
                .and_then(|t| t.position(&id).map(|i| map_to_row(&t.rows[i])));
            Outcome::Ok(row)
        }
    }

    fn read_all(
        &self,
        _cx: &Cx,
        table: &str,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let inner = Arc::clone(&self.inner);
        let table = table.to_string();
        async move {
            let tables = inner.tables.read().unwrap_or_else(|e| e.into_inner());
            let rows = tables
                .get(&table)
                .map_or_else(Vec::new, |t| t.rows.iter().map(map_to_row).collect());
            Outcome::Ok(rows)
        }
    }

    fn read_by(
        &self,
        _cx: &Cx,
        table: &str,
        column: &str,
        value: &Value,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let inner = Arc::clone(&self.inner);
        let table = table.to_string();
        let column = column.to_string();
        let value = value.clone();
        async move {
            let tables = inner.tables.read().unwrap_or_else(|e| e.into_inner());
            let rows = tables.get(&table).map_or_else(Vec::new, |t| {
                t.rows
                    .iter()
                    .filter(|r| r.get(&column) == Some(&value))
                    .map(map_to_row)
                    .collect()
            });
            Outcome::Ok(rows)
        }
    }

    fn update(
        &self,
        _cx: &Cx,
        table: &str,
        id: &Value,
        row: Row,
    ) -> impl Future<Output = Outcome<Row, Error>> + Send {
        let inner = Arc::clone(&self.inner);
        let table = table.to_string();
        let id = id.clone();
        async move {
            let merged = {
                let mut tables = inner.tables.write().unwrap_or_else(|e| e.into_inner());
                let Some(mem_table) = tables.get_mut(&table) else {
                    return Outcome::Err(Error::internal(format!("{table}: table not registered")));
                };
                match mem_table.update_row(&id, &row) {
                    Ok(merged) => merged,
                    Err(e) => return Outcome::Err(e),
                }
            };
            fire(&inner, &Hook::Update, &table, &[id]);
            Outcome::Ok(map_to_row(&merged))
        }
    }

    fn delete(
        &self,
        _cx: &Cx,
        table: &str,
        id: &Value,
    ) -> impl Future<Output = Outcome<Row, Error>> + Send {
        let inner = Arc::clone(&self.inner);
        let table = table.to_string();
        let id = id.clone();
        async move {
            let removed = {
                let mut tables = inner.tables.write().unwrap_or_else(|e| e.into_inner());
                let Some(mem_table) = tables.get_mut(&table) else {
                    return Outcome::Err(Error::internal(format!("{table}: table not registered")));
                };
                let Some(index) = mem_table.position(&id) else {
                    return Outcome::Err(Error::not_found(table.clone(), id.clone()));
                };
                mem_table.rows.remove(index)
            };
            fire(&inner, &Hook::Remove, &table, &[id]);
            Outcome::Ok(map_to_row(&removed))
        }
    }

    fn delete_by(
        &self,
        _cx: &Cx,
        table: &str,
        column: &str,
        value: &Value,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let inner = Arc::clone(&self.inner);
        let table = table.to_string();
        let column = column.to_string();
        let value = value.clone();
        async move {
            let (removed, ids) = {
                let mut tables = inner.tables.write().unwrap_or_else(|e| e.into_inner());
                let Some(mem_table) = tables.get_mut(&table) else {
                    return Outcome::Ok(vec![]);
                };
                let pk = mem_table.pk().to_string();
                let mut removed = Vec::new();
                let mut ids = Vec::new();
                mem_table.rows.retain(|r| {
                    if r.get(&column) == Some(&value) {
                        if let Some(id) = r.get(&pk) {
                            ids.push(id.clone());
                        }
                        removed.push(map_to_row(r));
                        false
                    } else {
                        true
                    }
                });
                (removed, ids)
            };
            fire(&inner, &Hook::Remove, &table, &ids);
            Outcome::Ok(removed)
        }
    }

    fn subscribe(&self, observer: Arc<dyn LifecycleObserver>) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::internal("engine has no live connection"));
        }
        let mut observers = self
            .inner
            .observers
            .write()
            .unwrap_or_else(|e| e.into_inner());
        observers.push(observer);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }
}
