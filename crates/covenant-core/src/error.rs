//! Error types.
//!
//! - [`HttpError`] is the structured error a handler raises when it wants a
//!   specific HTTP response; the top-level boundary renders it as-is.
//! - [`HandlerError`] is what handlers return: either an [`HttpError`] or any
//!   other failure, which the boundary turns into a bare 500.
//! - [`ContractError`] and [`RegistrationError`] are construction-time
//!   failures; a server refuses to start on either.

use covenant_router::RouteError;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;

use crate::response::{Response, ResponseExt};

/// An error that carries its own HTTP response.
///
/// Without an explicit body the response is `{"message": <message>}`.
///
/// ```
/// use covenant_core::HttpError;
/// use http::StatusCode;
///
/// let err = HttpError::not_found("thing 42 does not exist");
/// assert_eq!(err.status(), StatusCode::NOT_FOUND);
/// assert_eq!(err.to_string(), "thing 42 does not exist");
/// ```
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
    body: Option<Value>,
    headers: HeaderMap,
}

impl HttpError {
    /// Creates an error with an arbitrary status.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    /// 400 Bad Request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 401 Unauthorized.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// 403 Forbidden.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// 404 Not Found.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 409 Conflict.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// 422 Unprocessable Entity.
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Replaces the default `{"message": ...}` body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a response header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// The response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The body this error renders.
    #[must_use]
    pub fn body(&self) -> Value {
        self.body
            .clone()
            .unwrap_or_else(|| json!({ "message": self.message }))
    }

    /// Renders the declared response.
    #[must_use]
    pub fn to_response(&self) -> Response {
        let mut response = Response::json(self.status, &self.body());
        for (name, value) in &self.headers {
            response.headers_mut().append(name.clone(), value.clone());
        }
        response
    }
}

/// Failure returned by a handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A structured error rendering its own response.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Anything else. Rendered as 500 with the message only.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    /// Wraps an arbitrary error.
    pub fn other(error: impl Into<anyhow::Error>) -> Self {
        Self::Other(error.into())
    }

    /// Returns the structured error, including one wrapped inside an
    /// `anyhow::Error`.
    #[must_use]
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(err) => Some(err),
            Self::Other(err) => err.downcast_ref::<HttpError>(),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(err.into())
    }
}

/// A contract that cannot be built.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractError {
    /// Two entries share a name within one level.
    #[error("duplicate contract entry `{name}` under path prefix `{path_prefix}`")]
    DuplicateName {
        /// Path prefix of the level holding the duplicate (empty when unset)
        path_prefix: String,
        /// Repeated name
        name: String,
    },

    /// A template parameter is not declared by the path-params schema.
    #[error("operation `{operation}`: path parameter `{param}` is not declared by its path params schema")]
    UndeclaredPathParam {
        /// Dotted operation name
        operation: String,
        /// Template parameter name
        param: String,
    },

    /// A declared response status is outside 100..=999.
    #[error("operation `{operation}`: invalid response status {status}")]
    InvalidStatus {
        /// Dotted operation name
        operation: String,
        /// Offending status
        status: u16,
    },
}

/// Failure while binding handlers and routes. Fatal at startup.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// A contract operation has no handler.
    #[error("no handler registered for operation `{operation}`")]
    MissingHandler {
        /// Dotted operation name
        operation: String,
    },

    /// A handler has no matching contract entry.
    #[error("handler `{name}` does not correspond to any contract entry")]
    UnexpectedHandler {
        /// Dotted handler name
        name: String,
    },

    /// Contract and handlers disagree on whether an entry is a group.
    #[error("`{name}` is {expected} in the contract but {found} in the handlers")]
    ShapeMismatch {
        /// Dotted entry name
        name: String,
        /// Kind in the contract
        expected: &'static str,
        /// Kind in the handler tree
        found: &'static str,
    },

    /// The same handler name was registered twice.
    #[error("handler `{name}` registered more than once")]
    DuplicateHandler {
        /// Dotted handler name
        name: String,
    },

    /// The host router rejected a route.
    #[error("cannot register {method} {path}: {source}")]
    Route {
        /// Route method
        method: Method,
        /// Route template
        path: String,
        /// Router error
        #[source]
        source: RouteError,
    },
}
