//! Core use-case services.
//!
//! # Responsibility
//! - Turn typed commands into backend calls.
//! - Map backend results onto the store error taxonomy.

pub mod error;
pub mod item_service;
pub mod schema_service;
