//! Configuration sections.

use serde::{Deserialize, Serialize};

use covenant_telemetry::{LogConfig, LogFormat};

/// `[server]`: listener and shutdown behaviour.
///
/// ```
/// use covenant_config::ServerSettings;
///
/// let server = ServerSettings::default();
/// assert_eq!(server.http_addr, "0.0.0.0:8080");
/// assert_eq!(server.shutdown_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// How long shutdown waits for open connections, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

/// `[logging]`: subscriber setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Install a subscriber at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// ANSI colors for pretty output.
    #[serde(default)]
    pub ansi_enabled: bool,

    /// File and line of each call site.
    #[serde(default)]
    pub include_location: bool,

    /// Span open/close events.
    #[serde(default)]
    pub span_events: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
            ansi_enabled: false,
            include_location: false,
            span_events: false,
        }
    }
}

impl LoggingSettings {
    /// The telemetry configuration for these settings.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            format: self.format,
            span_events: self.span_events,
            file_line_info: self.include_location,
            include_target: true,
            ansi: self.ansi_enabled,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[validation]`: request and response checking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ValidationSettings {
    /// Log each registered route at startup.
    #[serde(default)]
    pub log_initialization: bool,

    /// Validate structured handler results against the declared schema.
    #[serde(default = "default_true")]
    pub validate_responses: bool,

    /// Largest accepted request body, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            log_initialization: false,
            validate_responses: true,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_true() -> bool {
    true
}
