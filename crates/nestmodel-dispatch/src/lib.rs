//! Change-notification dispatch for NestModel.
//!
//! The dispatcher bridges the storage engine's native row lifecycle hooks to
//! a set of registered observers, normalizing every event into the canonical
//! `(table, operation, ids)` shape. Delivery is strictly best-effort: a
//! malformed event is logged and dropped, an observer failure is logged and
//! never affects the remaining observers or the write that triggered the
//! notification, and running with zero observers is a deliberate no-op.
//!
//! # Lifecycle
//!
//! The dispatcher moves through `Uninitialized → Subscribing → Active`, or
//! `Subscribing → Failed` when the engine handshake fails. A failed
//! dispatcher stays parked until the caller explicitly re-initializes; there
//! is no automatic retry.

use nestmodel_core::{Error, Gateway, LifecycleObserver, Result, Value};
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_micros() as i64)
}

// ============================================================================
// Notification shape
// ============================================================================

/// The kind of mutation a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    /// Rows were inserted.
    Create,
    /// Rows were updated.
    Update,
    /// Rows were removed.
    Delete,
}

impl ChangeOp {
    /// Canonical lowercase name of the operation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Create => "create",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized change notification.
///
/// This shape is consumed by external subsystems (cache invalidators and the
/// like) and must remain stable.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification {
    /// Entity table the mutation ran against.
    pub table: String,
    /// Kind of mutation.
    pub operation: ChangeOp,
    /// Primary keys of the affected rows.
    pub ids: Vec<Value>,
}

impl ChangeNotification {
    /// Build a notification.
    #[must_use]
    pub fn new(table: impl Into<String>, operation: ChangeOp, ids: Vec<Value>) -> Self {
        Self {
            table: table.into(),
            operation,
            ids,
        }
    }
}

// ============================================================================
// Observers
// ============================================================================

type ObserverFn = Box<dyn Fn(&ChangeNotification) -> Result<()> + Send + Sync>;

/// A registered notification callback.
///
/// An observer is keyed by table name or registered as a wildcard; it stays
/// in the registry until explicitly removed via its [`ObserverId`].
pub struct Observer {
    table: Option<String>,
    callback: ObserverFn,
}

impl Observer {
    /// Observe one entity table.
    pub fn for_table(
        table: impl Into<String>,
        callback: impl Fn(&ChangeNotification) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            table: Some(table.into()),
            callback: Box::new(callback),
        }
    }

    /// Observe every table.
    pub fn wildcard(
        callback: impl Fn(&ChangeNotification) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            table: None,
            callback: Box::new(callback),
        }
    }

    fn matches(&self, table: &str) -> bool {
        self.table.as_deref().is_none_or(|t| t == table)
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

/// Handle for removing a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Concurrency-safe observer registry.
///
/// Registration and removal are safe to perform concurrently with delivery;
/// readers never observe a partially-mutated set.
#[derive(Default)]
pub struct ObserverRegistry {
    entries: RwLock<Vec<(ObserverId, Observer)>>,
    next_id: AtomicU64,
}

impl ObserverRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer and return its removal handle.
    pub fn observe(&self, observer: Observer) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.push((id, observer));
        id
    }

    /// Remove an observer; returns whether it was registered.
    pub fn un_observe(&self, id: ObserverId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Check if no observers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver a notification to every matching observer.
    ///
    /// Returns the number of successful deliveries. A panicking or failing
    /// observer is logged and skipped; delivery continues with the rest.
    pub fn notify(&self, notification: &ChangeNotification) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut delivered = 0;
        for (id, observer) in entries.iter() {
            if !observer.matches(&notification.table) {
                continue;
            }
            let call = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                (observer.callback)(notification)
            }));
            match call {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(
                        observer = id.0,
                        table = %notification.table,
                        operation = %notification.operation,
                        error = %e,
                        "observer failed, continuing delivery"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        observer = id.0,
                        table = %notification.table,
                        operation = %notification.operation,
                        "observer panicked, continuing delivery"
                    );
                }
            }
        }
        delivered
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Options for the dispatch initialization handshake.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Window the subscription handshake may take. Engines in this workspace
    /// report connectivity synchronously, so the window is checked once.
    pub handshake_timeout: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

impl DispatchOptions {
    /// Create options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handshake window (builder pattern).
    #[must_use]
    pub fn handshake_timeout(mut self, window: Duration) -> Self {
        self.handshake_timeout = window;
        self
    }
}

/// Dispatcher lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Not yet initialized.
    Uninitialized,
    /// Subscription handshake in progress.
    Subscribing,
    /// Receiving engine events and delivering notifications.
    Active,
    /// Handshake failed; a later `initialize` call may retry explicitly.
    Failed,
}

/// Converts engine lifecycle events into observer notifications.
pub struct Dispatcher {
    state: RwLock<DispatchState>,
    registry: ObserverRegistry,
    last_event_micros: AtomicI64,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create an uninitialized dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DispatchState::Uninitialized),
            registry: ObserverRegistry::new(),
            last_event_micros: AtomicI64::new(0),
        }
    }

    /// Subscribe to the engine's native lifecycle hooks.
    ///
    /// Requires a live connection; fails with [`Error::Internal`] (and parks
    /// the dispatcher in [`DispatchState::Failed`]) when the engine reports
    /// none, without ever reaching Active.
    pub fn initialize<G: Gateway>(
        self: &Arc<Self>,
        gateway: &G,
        options: &DispatchOptions,
    ) -> Result<()> {
        self.set_state(DispatchState::Subscribing);
        if !gateway.is_connected() {
            self.set_state(DispatchState::Failed);
            tracing::error!(
                timeout_ms = options.handshake_timeout.as_millis() as u64,
                "dispatch handshake failed: no adapter available"
            );
            return Err(Error::internal("no adapter available for dispatch"));
        }
        match gateway.subscribe(Arc::clone(self) as Arc<dyn LifecycleObserver>) {
            Ok(()) => {
                self.set_state(DispatchState::Active);
                tracing::debug!("dispatcher active");
                Ok(())
            }
            Err(e) => {
                self.set_state(DispatchState::Failed);
                tracing::error!(error = %e, "dispatch subscription failed");
                Err(e)
            }
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DispatchState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: DispatchState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Register an observer.
    pub fn observe(&self, observer: Observer) -> ObserverId {
        self.registry.observe(observer)
    }

    /// Remove a previously registered observer.
    pub fn un_observe(&self, id: ObserverId) -> bool {
        self.registry.un_observe(id)
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.registry.len()
    }

    /// Microsecond timestamp of the last well-formed event, if any.
    #[must_use]
    pub fn last_event_at(&self) -> Option<i64> {
        match self.last_event_micros.load(Ordering::Acquire) {
            0 => None,
            micros => Some(micros),
        }
    }

    /// The single normalization point for engine events.
    ///
    /// Runs inside a lifecycle callback with no caller to propagate to, so a
    /// malformed event is logged and dropped rather than raised.
    pub fn notification_handler(&self, table: &str, operation: ChangeOp, ids: &[Value]) {
        if table.is_empty() {
            tracing::warn!(operation = %operation, "dropping change event without a table");
            return;
        }
        if ids.is_empty() || ids.iter().any(Value::is_null) {
            tracing::warn!(
                table = table,
                operation = %operation,
                "dropping change event with a malformed id set"
            );
            return;
        }

        self.last_event_micros.store(now_micros(), Ordering::Release);
        let notification = ChangeNotification::new(table, operation, ids.to_vec());
        self.update_observers(&notification);
    }

    fn update_observers(&self, notification: &ChangeNotification) {
        if self.registry.is_empty() {
            // Deliberate no-op: the dispatcher tolerates zero listeners.
            tracing::trace!(
                table = %notification.table,
                operation = %notification.operation,
                "no observers registered"
            );
            return;
        }
        let delivered = self.registry.notify(notification);
        tracing::trace!(
            table = %notification.table,
            operation = %notification.operation,
            ids = notification.ids.len(),
            delivered,
            "notification delivered"
        );
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.state())
            .field("observers", &self.registry.len())
            .field("last_event_at", &self.last_event_at())
            .finish()
    }
}

impl LifecycleObserver for Dispatcher {
    fn after_insert(&self, table: &str, ids: &[Value]) {
        self.notification_handler(table, ChangeOp::Create, ids);
    }

    fn after_update(&self, table: &str, ids: &[Value]) {
        self.notification_handler(table, ChangeOp::Update, ids);
    }

    fn after_remove(&self, table: &str, ids: &[Value]) {
        self.notification_handler(table, ChangeOp::Delete, ids);
    }
}
