//! NestModel is a cascading persistence adapter for hierarchical domain
//! models.
//!
//! Application code works with plain structs implementing [`Model`] and a
//! per-type [`Repository`]; the adapter validates the whole model graph with
//! declarative rules, persists nested relations in dependency order
//! (honoring per-relation cascade and populate policies), reconciles
//! engine-generated keys back into the graph, and merges partial updates
//! against the persisted state.
//!
//! Independently, the [`Dispatcher`] bridges the storage engine's native
//! lifecycle hooks into best-effort `(table, operation, ids)` notifications
//! for registered observers.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use nestmodel::prelude::*;
//!
//! let engine = Arc::new(MemEngine::new());
//! engine.register_model(Country::meta());
//!
//! let repo: Repository<Country, MemEngine> = Repository::new(Arc::clone(&engine))?;
//! let created = repo.create(&cx, &country).await?;
//! let fetched = repo.read(&cx, created.id.unwrap()).await?;
//! ```

pub use nestmodel_core::{
    BulkError, BulkFailure, Cascade, Check, ColumnInfo, ConflictError, Cx, Error, FieldInfo,
    FieldRule, FieldValue, FromValue, Gateway, InternalError, LifecycleObserver, LinkTableInfo,
    Model, ModelMeta, NotFoundError, OpContext, Operation, Outcome, Record, RelationInfo,
    RelationKind, Result, Row, Stamp, ValidationError, Value, Violation, ViolationKind,
    matches_pattern, validate_meta,
};
pub use nestmodel_dispatch::{
    ChangeNotification, ChangeOp, DispatchOptions, DispatchState, Dispatcher, Observer,
    ObserverId, ObserverRegistry,
};
pub use nestmodel_repo::{Orchestrator, Repository, enforce};

/// Commonly used imports for application code.
pub mod prelude {
    pub use crate::{
        Cascade, ChangeNotification, ChangeOp, Check, Cx, DispatchOptions, Dispatcher, Error,
        FieldInfo, FieldRule, Gateway, LinkTableInfo, Model, ModelMeta, Observer, OpContext,
        Outcome, Record, RelationInfo, RelationKind, Repository, Result, Stamp, Value,
    };
}
