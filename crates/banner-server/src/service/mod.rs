//! Long-lived service components owned by the application state.

pub mod cache;
pub mod change_bus;
pub mod evaluation_sink;
pub mod outbox;
pub mod scheduler;
