//! Repository layer: the storage boundary for entities.
//!
//! # Responsibility
//! - Define the data access contract used by the service layer.
//! - Isolate SQLite query details from orchestration and ranking.
//!
//! # Invariants
//! - Repository writes validate before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to
//!   storage transport errors.

pub mod entity_repo;
