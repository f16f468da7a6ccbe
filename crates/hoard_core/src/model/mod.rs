//! Domain model for recorded entities.
//!
//! # Responsibility
//! - Define the data structures shared by storage, search and the shell.
//!
//! # Invariants
//! - Every entity is identified by a storage-assigned `EntityId`.
//! - Deletion is a hard delete; there are no tombstones.

pub mod entity;
