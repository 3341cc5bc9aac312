//! Banner Persistence - database entities and the transactional config store
//!
//! This crate provides:
//! - SeaORM entity definitions for every persisted record
//! - The config-store service layer: all mutations commit the domain row,
//!   the audit row, and the outbox row in one transaction
//! - Snapshot loading: projecting flag configuration into the
//!   self-contained form the evaluator consumes

pub mod entity;
pub mod service;

// Re-export sea-orm for convenience
pub use sea_orm;
