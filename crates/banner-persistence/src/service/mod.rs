//! Config-store service layer
//!
//! Free async functions over a `DatabaseConnection`, one module per
//! aggregate. Every mutation commits its domain rows, the audit row, and
//! the outbox rows in a single transaction; partial persistence is
//! impossible.

pub mod audit;
pub mod environment;
pub mod evaluation;
pub mod flag;
pub mod outbox;
pub mod project;
pub mod segment;
pub mod snapshot;
