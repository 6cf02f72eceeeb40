//! # Pipe Telemetry
//!
//! Structured logging for message-pipe endpoints. Endpoints log through
//! `tracing` macros; this crate installs the subscriber that renders them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pipe_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     init_telemetry(TelemetryConfig::from_env()).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PIPE_SERVICE_NAME` | `pipe-bindings` | Service name in log events |
//! | `PIPE_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `PIPE_JSON_LOGS` | `false` | Emit JSON instead of plain text |

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::build_filter;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Install the global tracing subscriber described by `config`.
///
/// Calling it twice returns [`TelemetryError::AlreadyInitialized`].
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_setup::init_tracing(&config)
}
