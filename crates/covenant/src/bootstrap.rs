//! Wiring a [`CovenantConfig`] into the runtime pieces.
//!
//! ```rust,no_run
//! use covenant::bootstrap;
//! use covenant::config::ConfigLoader;
//! use covenant::server::App;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()
//!     .with_optional_file("covenant.toml")?
//!     .with_default_env_prefix()
//!     .load()?;
//! bootstrap::init_logging(&config)?;
//!
//! let app = App::new().with_bindings(bootstrap::bindings(&config));
//! // Mount contracts with `bootstrap::endpoint_config(&config)` here.
//! bootstrap::server(app, &config).run().await?;
//! # Ok(())
//! # }
//! ```

use covenant_config::CovenantConfig;
use covenant_core::Bindings;
use covenant_server::{App, EndpointConfig, Server};
use covenant_telemetry::TelemetryError;

/// Installs the global subscriber from the `logging` section.
///
/// # Errors
///
/// Fails when the level does not parse or a subscriber is already installed.
pub fn init_logging(config: &CovenantConfig) -> Result<(), TelemetryError> {
    covenant_telemetry::init_logging(&config.logging.to_log_config())
}

/// The `bindings` section as request-context bindings.
#[must_use]
pub fn bindings(config: &CovenantConfig) -> Bindings {
    config
        .bindings
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Endpoint options from the `validation` section.
#[must_use]
pub fn endpoint_config(config: &CovenantConfig) -> EndpointConfig {
    EndpointConfig::from_settings(&config.validation)
}

/// A server for `app` using the `server` and `validation` sections.
#[must_use]
pub fn server(app: App, config: &CovenantConfig) -> Server {
    Server::from_settings(app, &config.server, &config.validation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::RequestContext;

    #[test]
    fn test_bindings_from_config() {
        let mut config = CovenantConfig::default();
        config
            .bindings
            .insert("ENABLE_RESPONSE_VALIDATION".to_string(), "false".to_string());
        let bindings = bindings(&config);
        assert_eq!(bindings.get_bool("ENABLE_RESPONSE_VALIDATION"), Some(false));
    }

    #[test]
    fn test_endpoint_config_follows_validation_section() {
        let mut config = CovenantConfig::development();
        config.validation.validate_responses = false;
        let endpoint = endpoint_config(&config);
        assert!(endpoint.logs_initialization());
        assert!(!endpoint.validates_response(&RequestContext::mock()));
    }
}
