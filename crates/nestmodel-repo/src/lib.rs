//! Persistence orchestration for NestModel.
//!
//! `nestmodel-repo` is the **cascading persistence layer**. It walks model
//! graphs described by statically-registered metadata and coordinates
//! validation, cascade decisions, write ordering, and rehydration around a
//! storage engine.
//!
//! # Role In The Architecture
//!
//! - **Enforcer**: declarative validation and value-generation, recursing
//!   into every relation field before any I/O.
//! - **Orchestrator**: the validate → cascade → persist → rehydrate
//!   pipeline, with write ordering fixed by foreign-key direction.
//! - **Repository**: the typed per-model CRUD surface application code uses.
//!
//! # Design Philosophy
//!
//! - **Metadata-driven**: only declared relation fields are traversed; no
//!   runtime reflection.
//! - **No partial writes**: validation failures abort before the first row.
//! - **Cancel-correct**: all async operations use `Cx` + `Outcome` via
//!   `nestmodel-core`.

pub mod enforce;
pub mod key;
pub mod orchestrate;
pub mod repository;

pub use enforce::enforce;
pub use key::VisitKey;
pub use orchestrate::Orchestrator;
pub use repository::Repository;

// ============================================================================
// Unit Tests
// ============================================================================
