//! Layered configuration loading.
//!
//! Later layers override earlier ones: built-in defaults (or a preset), then
//! a TOML or JSON file, then `PREFIX__SECTION__KEY` environment variables.

use std::env;
use std::fs;
use std::path::Path;

use covenant_telemetry::LogFormat;

use crate::{ConfigError, CovenantConfig};

/// Environment prefix used by [`ConfigLoader::with_default_env_prefix`].
pub const DEFAULT_ENV_PREFIX: &str = "COVENANT";

/// Builds a [`CovenantConfig`] from layered sources.
///
/// # Example
///
/// ```no_run
/// use covenant_config::ConfigLoader;
///
/// # fn main() -> Result<(), covenant_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_optional_file("covenant.toml")?
///     .with_default_env_prefix()
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: CovenantConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// A loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets to the default configuration.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = CovenantConfig::default();
        self
    }

    /// Starts from the development preset.
    ///
    /// ```
    /// use covenant_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert!(config.validation.log_initialization);
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = CovenantConfig::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = CovenantConfig::production();
        self
    }

    /// Loads a `.toml` or `.json` file, chosen by extension.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing, unreadable, malformed or has unknown
    /// fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        self.config = parse(&content, format)?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration text in the given format (`"toml"` or `"json"`).
    ///
    /// ```
    /// use covenant_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[validation]\nvalidate_responses = false", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert!(!config.validation.validate_responses);
    /// ```
    ///
    /// # Errors
    ///
    /// Fails on an unknown format or content that does not parse.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, format)?;
        Ok(self)
    }

    /// Applies `PREFIX__SECTION__KEY` variables at [`load`](Self::load).
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Applies `COVENANT__SECTION__KEY` variables at [`load`](Self::load).
    #[must_use]
    pub fn with_default_env_prefix(self) -> Self {
        self.with_env_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Loads a `.env` file into the process environment, if one exists.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        self
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Fails when an override does not parse or the result is invalid.
    pub fn load(mut self) -> Result<CovenantConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration as layered so far, without environment
    /// overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> CovenantConfig {
        self.config
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let marker = format!("{prefix}__");
        let mut vars: Vec<(String, String)> =
            env::vars().filter(|(k, _)| k.starts_with(&marker)).collect();
        vars.sort();

        for (key, value) in vars {
            self.apply_env_var(&key, &value, prefix)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let rest = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;
        let parts: Vec<&str> = rest.split("__").collect();

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => {
                self.config.server.http_addr = value.to_string();
            }
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                self.config.server.shutdown_timeout_secs = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
            }
            ["LOGGING", "ENABLED"] => {
                self.config.logging.enabled = bool_var(key, value)?;
            }
            ["LOGGING", "LEVEL"] => {
                self.config.logging.level = value.to_string();
            }
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["LOGGING", "ANSI_ENABLED"] => {
                self.config.logging.ansi_enabled = bool_var(key, value)?;
            }
            ["LOGGING", "INCLUDE_LOCATION"] => {
                self.config.logging.include_location = bool_var(key, value)?;
            }
            ["LOGGING", "SPAN_EVENTS"] => {
                self.config.logging.span_events = bool_var(key, value)?;
            }
            ["VALIDATION", "LOG_INITIALIZATION"] => {
                self.config.validation.log_initialization = bool_var(key, value)?;
            }
            ["VALIDATION", "VALIDATE_RESPONSES"] => {
                self.config.validation.validate_responses = bool_var(key, value)?;
            }
            ["VALIDATION", "MAX_BODY_BYTES"] => {
                self.config.validation.max_body_bytes = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
            }
            ["BINDINGS", name] if !name.is_empty() => {
                self.config
                    .bindings
                    .insert((*name).to_string(), value.to_string());
            }
            _ => {
                tracing::debug!(var = key, "Ignoring unknown configuration variable");
            }
        }
        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<CovenantConfig, ConfigError> {
    match format.to_lowercase().as_str() {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn bool_var(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
