//! Typed repository facade.
//!
//! A `Repository` pairs one model type with a storage engine and exposes the
//! uniform CRUD surface. Each call converts the typed instance into the
//! orchestrator's record representation (a defensive copy), runs the
//! validate → cascade → persist → rehydrate pipeline, and converts the
//! result back.

use crate::orchestrate::Orchestrator;
use nestmodel_core::relation::validate_meta;
use nestmodel_core::{Cx, Error, Gateway, Model, OpContext, Outcome, Record, Result, Value};
use std::marker::PhantomData;
use std::sync::Arc;

/// Map a record outcome back into a typed model outcome.
fn revert<M: Model>(outcome: Outcome<Record, Error>) -> Outcome<M, Error> {
    match outcome {
        Outcome::Ok(record) => match M::from_record(&record) {
            Ok(model) => Outcome::Ok(model),
            Err(e) => Outcome::Err(e),
        },
        Outcome::Err(e) => Outcome::Err(e),
        Outcome::Cancelled(r) => Outcome::Cancelled(r),
        Outcome::Panicked(p) => Outcome::Panicked(p),
    }
}

/// Map a bulk record outcome back into typed model outcomes.
fn revert_all<M: Model>(outcome: Outcome<Vec<Record>, Error>) -> Outcome<Vec<M>, Error> {
    match outcome {
        Outcome::Ok(records) => {
            let mut models = Vec::with_capacity(records.len());
            for record in &records {
                match M::from_record(record) {
                    Ok(model) => models.push(model),
                    Err(e) => return Outcome::Err(e),
                }
            }
            Outcome::Ok(models)
        }
        Outcome::Err(e) => Outcome::Err(e),
        Outcome::Cancelled(r) => Outcome::Cancelled(r),
        Outcome::Panicked(p) => Outcome::Panicked(p),
    }
}

/// Uniform persistence interface for one model type.
pub struct Repository<M: Model, G: Gateway> {
    gateway: Arc<G>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model, G: Gateway> Repository<M, G> {
    /// Create a repository over a shared engine handle.
    ///
    /// The model's relation configuration is validated eagerly so a
    /// misconfigured descriptor fails here instead of mid-operation.
    pub fn new(gateway: Arc<G>) -> Result<Self> {
        validate_meta(M::meta())?;
        Ok(Self {
            gateway,
            _model: PhantomData,
        })
    }

    /// The shared engine handle.
    #[must_use]
    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    fn orchestrator(&self) -> Orchestrator<'_, G> {
        Orchestrator::new(self.gateway.as_ref())
    }

    /// Persist a new instance; returns it with generated fields filled in.
    pub async fn create(&self, cx: &Cx, model: &M) -> Outcome<M, Error> {
        self.create_with(cx, model, &OpContext::new()).await
    }

    /// Persist a new instance with an explicit operation context.
    pub async fn create_with(&self, cx: &Cx, model: &M, ctx: &OpContext) -> Outcome<M, Error> {
        revert(self.orchestrator().create(cx, model.to_record(), ctx).await)
    }

    /// Fetch an instance by primary key, populating relations.
    pub async fn read(&self, cx: &Cx, id: impl Into<Value>) -> Outcome<M, Error> {
        revert(self.orchestrator().read(cx, M::meta(), &id.into()).await)
    }

    /// Merge a (possibly partial) instance onto the persisted state and
    /// rewrite it.
    pub async fn update(&self, cx: &Cx, model: &M) -> Outcome<M, Error> {
        self.update_with(cx, model, &OpContext::new()).await
    }

    /// Update with an explicit operation context.
    pub async fn update_with(&self, cx: &Cx, model: &M, ctx: &OpContext) -> Outcome<M, Error> {
        revert(self.orchestrator().update(cx, model.to_record(), ctx).await)
    }

    /// Delete an instance by primary key; returns its last known state.
    pub async fn delete(&self, cx: &Cx, id: impl Into<Value>) -> Outcome<M, Error> {
        revert(self.orchestrator().delete(cx, M::meta(), &id.into()).await)
    }

    /// Persist several new instances.
    pub async fn create_all(&self, cx: &Cx, models: &[M]) -> Outcome<Vec<M>, Error> {
        let records = models.iter().map(Model::to_record).collect();
        revert_all(
            self.orchestrator()
                .create_all(cx, records, &OpContext::new())
                .await,
        )
    }

    /// Fetch every instance of this model type.
    pub async fn read_all(&self, cx: &Cx) -> Outcome<Vec<M>, Error> {
        revert_all(self.orchestrator().read_all(cx, M::meta()).await)
    }

    /// Merge-and-rewrite several instances.
    pub async fn update_all(&self, cx: &Cx, models: &[M]) -> Outcome<Vec<M>, Error> {
        let records = models.iter().map(Model::to_record).collect();
        revert_all(
            self.orchestrator()
                .update_all(cx, records, &OpContext::new())
                .await,
        )
    }

    /// Delete several instances by primary key.
    pub async fn delete_all(&self, cx: &Cx, ids: Vec<Value>) -> Outcome<Vec<M>, Error> {
        revert_all(self.orchestrator().delete_all(cx, M::meta(), &ids).await)
    }
}
