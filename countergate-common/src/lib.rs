//! countergate common library
//!
//! Shared types and utilities for the countergate Prometheus bridge:
//!
//! - [`counter`] - Counter data model (`Counter`, `CounterValue`, `Statistics`)
//! - [`store`] - Read access to the counter aggregation buffer
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`error`] - Error types

pub mod config;
pub mod counter;
pub mod error;
pub mod store;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, load_config, parse_config};
pub use counter::{
    Counter, CounterType, CounterValue, Statistics, current_timestamp_millis,
};
pub use error::{Error, Result};
pub use store::{CounterStore, MemoryCounterStore, SharedCounterStore};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over `config.level`. Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
