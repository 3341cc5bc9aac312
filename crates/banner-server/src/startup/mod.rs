//! Server startup: logging, HTTP assembly, and scheduler re-arming.

pub mod http;
pub mod logging;

pub use logging::{init_logging, LoggingConfig, LoggingGuard};
