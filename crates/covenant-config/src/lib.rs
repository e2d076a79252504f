//! Typed configuration for covenant services.
//!
//! A [`CovenantConfig`] has four sections:
//!
//! - [`ServerSettings`]: bind address and shutdown timeout
//! - [`LoggingSettings`]: subscriber level and format
//! - [`ValidationSettings`]: route logging, response validation, body limit
//! - `bindings`: string values exposed read-only to every request context
//!
//! Unknown fields are rejected. [`ConfigLoader`] layers defaults, a file and
//! environment variables.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! shutdown_timeout_secs = 30
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [validation]
//! log_initialization = true
//! validate_responses = true
//! max_body_bytes = 1048576
//!
//! [bindings]
//! ENABLE_RESPONSE_VALIDATION = "true"
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `COVENANT__SERVER__HTTP_ADDR=0.0.0.0:9000`
//! - `COVENANT__LOGGING__FORMAT=pretty`
//! - `COVENANT__VALIDATION__VALIDATE_RESPONSES=false`
//! - `COVENANT__BINDINGS__STAGE=staging`

mod config;
mod error;
mod loader;
mod schema;

pub use config::CovenantConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{LoggingSettings, ServerSettings, ValidationSettings};

pub use covenant_telemetry::LogFormat;
