//! Table-storage backend contracts and persistence implementations.
//!
//! # Responsibility
//! - Define the keyed row primitives the schema manager and engine consume.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - "Row absent" is an empty `Row`, distinct from any `RepoError`.
//! - Writes report `WriteOutcome::NotApplied` separately from errors.

pub mod table_repo;
