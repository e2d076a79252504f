//! The root configuration type.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use covenant_telemetry::{create_env_filter, LogFormat};

use crate::{ConfigError, LoggingSettings, ServerSettings, ValidationSettings};

/// Complete service configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to layer files and environment
/// variables over the defaults.
///
/// # Example
///
/// ```
/// use covenant_config::CovenantConfig;
///
/// let config = CovenantConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert!(config.validation.validate_responses);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct CovenantConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Request and response validation settings.
    #[serde(default)]
    pub validation: ValidationSettings,

    /// Read-only values handed to every request context.
    #[serde(default)]
    pub bindings: IndexMap<String, String>,
}

impl CovenantConfig {
    /// Debug logging in pretty format, route registration logged.
    #[must_use]
    pub fn development() -> Self {
        Self {
            server: ServerSettings {
                http_addr: "127.0.0.1:8080".to_string(),
                shutdown_timeout_secs: 5,
            },
            logging: LoggingSettings {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                ansi_enabled: true,
                include_location: true,
                ..LoggingSettings::default()
            },
            validation: ValidationSettings {
                log_initialization: true,
                ..ValidationSettings::default()
            },
            bindings: IndexMap::new(),
        }
    }

    /// Info logging in JSON format.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }

    /// Checks values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the bind address is not a
    /// socket address, the body limit is zero or the log level does not parse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server
            .http_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.validation.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "validation.max_body_bytes",
                "must be greater than zero",
            ));
        }

        if let Err(err) = create_env_filter(&self.logging.level) {
            return Err(ConfigError::invalid_value("logging.level", err.to_string()));
        }

        Ok(())
    }
}
