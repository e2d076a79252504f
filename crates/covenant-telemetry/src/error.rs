//! Telemetry error types.

use thiserror::Error;

/// Errors raised while installing the logging subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The level or filter directive does not parse.
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// Offending directive
        filter: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),
}
