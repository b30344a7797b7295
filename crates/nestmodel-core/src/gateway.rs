//! Storage engine boundary.
//!
//! This module defines the adapter's view of the relational engine:
//!
//! - [`Gateway`] - row-level create/read/update/delete plus bulk variants
//! - [`LifecycleObserver`] - the engine's native after-write hooks, consumed
//!   by the change-notification dispatcher
//!
//! Everything behind this boundary (SQL generation, pooling, transactions,
//! isolation levels) belongs to the engine. All operations integrate with
//! asupersync's structured concurrency via `Cx` for proper cancellation
//! handling.

use crate::error::{Error, Result};
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};
use std::future::Future;
use std::sync::Arc;

/// Receiver for the engine's native row lifecycle hooks.
///
/// Implementations must tolerate being called from inside the engine's write
/// path: hooks are fire-and-forget, must not block for long, and must never
/// panic back into the engine.
pub trait LifecycleObserver: Send + Sync {
    /// One or more rows were inserted into `table`.
    fn after_insert(&self, table: &str, ids: &[Value]);

    /// One or more rows of `table` were updated.
    fn after_update(&self, table: &str, ids: &[Value]);

    /// One or more rows of `table` were removed.
    fn after_remove(&self, table: &str, ids: &[Value]);
}

/// A storage engine capable of single-row and bulk record I/O.
///
/// All operations are async, take a `Cx` context, and return
/// `Outcome` so cancellation propagates unchanged. Implementations must be
/// `Send + Sync` for use across async boundaries.
///
/// # Example
///
/// ```rust,ignore
/// let row = engine.insert(&cx, "countries", row).await?;
/// let id = row.get_named::<i64>("id")?;
/// let found = engine.read(&cx, "countries", &Value::BigInt(id)).await?;
/// ```
pub trait Gateway: Send + Sync {
    /// Insert a row and return it as stored (generated keys included).
    fn insert(
        &self,
        cx: &Cx,
        table: &str,
        row: Row,
    ) -> impl Future<Output = Outcome<Row, Error>> + Send;

    /// Insert several rows in one engine round trip.
    fn insert_all(
        &self,
        cx: &Cx,
        table: &str,
        rows: Vec<Row>,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Fetch a row by primary key.
    fn read(
        &self,
        cx: &Cx,
        table: &str,
        id: &Value,
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send;

    /// Fetch every row of a table.
    fn read_all(
        &self,
        cx: &Cx,
        table: &str,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Fetch the rows whose `column` equals `value` (foreign-key lookup).
    fn read_by(
        &self,
        cx: &Cx,
        table: &str,
        column: &str,
        value: &Value,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Update the row with the given primary key and return it as stored.
    fn update(
        &self,
        cx: &Cx,
        table: &str,
        id: &Value,
        row: Row,
    ) -> impl Future<Output = Outcome<Row, Error>> + Send;

    /// Delete a row by primary key and return its last stored state.
    fn delete(
        &self,
        cx: &Cx,
        table: &str,
        id: &Value,
    ) -> impl Future<Output = Outcome<Row, Error>> + Send;

    /// Delete the rows whose `column` equals `value`; returns the removed
    /// rows (junction cleanup for many-to-many relations).
    fn delete_by(
        &self,
        cx: &Cx,
        table: &str,
        column: &str,
        value: &Value,
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Register a receiver for the engine's native lifecycle hooks.
    ///
    /// Fails with [`Error::Internal`] when the engine exposes no hooks or has
    /// no live connection.
    fn subscribe(&self, observer: Arc<dyn LifecycleObserver>) -> Result<()>;

    /// Whether the engine currently holds a live connection.
    fn is_connected(&self) -> bool;
}
