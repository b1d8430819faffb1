//! Record model for the item store.
//!
//! # Invariants
//! - One record per key; the key column is the table's only key column.
//! - Records are never deleted by core.

pub mod record;
