//! Endpoint configuration.
//!
//! Error shaping is configured with plain function values rather than
//! overridable methods:
//!
//! ```rust
//! use covenant_server::{EndpointConfig, StructuredResponse};
//! use http::StatusCode;
//! use serde_json::json;
//!
//! let config = EndpointConfig::new()
//!     .log_initialization(true)
//!     .response_validation(|ctx| ctx.bindings().get_bool("ENABLE_RESPONSE_VALIDATION").unwrap_or(true))
//!     .request_validation_error_handler(|issues| {
//!         StructuredResponse::new(StatusCode::UNPROCESSABLE_ENTITY, json!({ "invalid": issues.formatted() }))
//!     });
//!
//! assert!(config.logs_initialization());
//! ```

use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use serde_json::{json, Value};

use covenant_config::ValidationSettings;
use covenant_core::{format_issues, Issue, RequestContext, Response, ResponseExt};

use crate::validation::SurfaceIssues;

/// A status and JSON body produced by an error callback.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredResponse {
    /// Response status
    pub status: StatusCode,
    /// Response body
    pub body: Value,
}

impl StructuredResponse {
    /// Creates a structured response.
    pub fn new(status: StatusCode, body: impl Into<Value>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Renders the HTTP response.
    #[must_use]
    pub fn into_response(self) -> Response {
        Response::json(self.status, &self.body)
    }
}

/// Per-request predicate gating response validation.
pub type ResponseValidationPredicate = Arc<dyn Fn(&RequestContext) -> bool + Send + Sync>;

/// Shapes the response for a failed request validation.
pub type RequestErrorHandler = Arc<dyn Fn(&SurfaceIssues) -> StructuredResponse + Send + Sync>;

/// Shapes the response for a failed response validation.
pub type ResponseErrorHandler = Arc<dyn Fn(&[Issue]) -> StructuredResponse + Send + Sync>;

/// Options for [`create_endpoints`](crate::create_endpoints).
#[derive(Clone)]
pub struct EndpointConfig {
    log_initialization: bool,
    response_validation: ResponseValidationPredicate,
    request_error: RequestErrorHandler,
    response_error: ResponseErrorHandler,
}

impl EndpointConfig {
    /// Defaults: no route logging, response validation always on.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log_initialization: false,
            response_validation: Arc::new(|_: &RequestContext| true),
            request_error: Arc::new(default_request_error),
            response_error: Arc::new(default_response_error),
        }
    }

    /// Builds a configuration from the `validation` settings section.
    #[must_use]
    pub fn from_settings(settings: &ValidationSettings) -> Self {
        let enabled = settings.validate_responses;
        Self::new()
            .log_initialization(settings.log_initialization)
            .response_validation(move |_| enabled)
    }

    /// Emits one log line per registered route.
    #[must_use]
    pub fn log_initialization(mut self, enabled: bool) -> Self {
        self.log_initialization = enabled;
        self
    }

    /// Sets the per-request response validation predicate.
    #[must_use]
    pub fn response_validation<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        self.response_validation = Arc::new(predicate);
        self
    }

    /// Sets the request validation error callback.
    #[must_use]
    pub fn request_validation_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&SurfaceIssues) -> StructuredResponse + Send + Sync + 'static,
    {
        self.request_error = Arc::new(handler);
        self
    }

    /// Sets the response validation error callback.
    #[must_use]
    pub fn response_validation_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[Issue]) -> StructuredResponse + Send + Sync + 'static,
    {
        self.response_error = Arc::new(handler);
        self
    }

    /// Whether routes are logged at registration.
    #[must_use]
    pub fn logs_initialization(&self) -> bool {
        self.log_initialization
    }

    /// Evaluates the response validation predicate.
    #[must_use]
    pub fn validates_response(&self, ctx: &RequestContext) -> bool {
        (self.response_validation)(ctx)
    }

    /// Shapes a request validation failure.
    #[must_use]
    pub fn request_error(&self, issues: &SurfaceIssues) -> StructuredResponse {
        (self.request_error)(issues)
    }

    /// Shapes a response validation failure.
    #[must_use]
    pub fn response_error(&self, issues: &[Issue]) -> StructuredResponse {
        (self.response_error)(issues)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("log_initialization", &self.log_initialization)
            .finish_non_exhaustive()
    }
}

/// `400 {"errors": {"pathParams", "query", "headers", "body"}}`.
#[must_use]
pub fn default_request_error(issues: &SurfaceIssues) -> StructuredResponse {
    StructuredResponse::new(StatusCode::BAD_REQUEST, json!({ "errors": issues.formatted() }))
}

/// `500 {"errors": <formatted issues>}`.
#[must_use]
pub fn default_response_error(issues: &[Issue]) -> StructuredResponse {
    StructuredResponse::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "errors": format_issues(issues).to_value() }),
    )
}
