//! Logging initialization
//!
//! Console output plus an optional daily-rolling `banner.log`. `RUST_LOG`
//! overrides the configured level when set.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Logging configuration for the application.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Log directory; file logging is disabled when `None`
    pub log_dir: Option<PathBuf>,
    /// Default level for console and file output
    pub level: String,
}

impl LoggingConfig {
    pub fn new(log_dir: Option<String>, level: String) -> Self {
        Self {
            log_dir: log_dir.map(PathBuf::from),
            level,
        }
    }
}

/// Guard that keeps the logging system alive.
///
/// Must be kept alive for the duration of the application; dropping it
/// flushes buffered file output.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

/// Initialize the global tracing subscriber.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, Box<dyn std::error::Error>> {
    let mut guards: Vec<WorkerGuard> = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
    let console_layer = fmt::layer()
        .with_target(true)
        .with_filter(console_filter);
    layers.push(Box::new(console_layer));

    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;

        let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "banner.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);

        let file_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_ansi(false)
            .with_filter(file_filter);
        layers.push(Box::new(file_layer));
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {}", e))?;

    Ok(LoggingGuard {
        _file_guards: guards,
    })
}
