//! SeaORM entity definitions

pub mod audit_log;
pub mod environment;
pub mod evaluation_log;
pub mod flag;
pub mod flag_environment;
pub mod flag_rule;
pub mod flag_variant;
pub mod outbox_event;
pub mod project;
pub mod segment;
pub mod segment_rule;
