//! # Covenant Telemetry
//!
//! Structured logging for covenant services. Every covenant crate logs
//! through `tracing` macros with structured fields (`operation_id`,
//! `request_id`, `status`, `method`, `path`); this crate installs the
//! subscriber that renders them as JSON lines or pretty text.
//!
//! # Example
//!
//! ```rust,ignore
//! use covenant_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(operation_id = "things.getThing", "Registered route");
//! ```

#![doc(html_root_url = "https://docs.rs/covenant-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
