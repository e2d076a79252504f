//! The concrete host router.
//!
//! [`App`] matches requests against registered templates, hands matched
//! requests to their route callback and owns the top-level error boundary:
//! a structured [`HttpError`](covenant_core::HttpError) renders its own
//! response, anything else becomes `500 {"message": ...}`.
//!
//! # Example
//!
//! ```rust
//! use covenant_core::{Contract, HandlerResponse, Handlers, Input, Operation, RequestContext};
//! use covenant_server::{App, EndpointConfig};
//! use serde_json::json;
//!
//! let contract = Contract::builder()
//!     .operation("health", Operation::get("/health").build())
//!     .build()
//!     .unwrap();
//! let handlers = Handlers::new().handler_sync("health", |_input: Input, _ctx: RequestContext| {
//!     Ok(HandlerResponse::ok(json!({ "status": "ok" })))
//! });
//!
//! let mut app = App::new();
//! app.mount(&contract, handlers, EndpointConfig::new()).unwrap();
//! assert_eq!(app.routes().len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::ALLOW;
use http::{HeaderValue, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use serde_json::json;

use covenant_core::{
    Bindings, Contract, HandlerError, Handlers, RegistrationError, Response, ResponseExt,
};
use covenant_router::{Lookup, Router};

use crate::config::EndpointConfig;
use crate::dispatcher::{create_endpoints, HostRouter, RouteCallback, RouteRequest};

/// Renders errors that escape a route callback.
pub type ErrorBoundary = Arc<dyn Fn(&HandlerError) -> Response + Send + Sync>;

/// A registered route, as listed by [`App::routes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// Route method
    pub method: Method,
    /// Route template
    pub path: String,
}

/// Router plus error boundary.
#[derive(Clone)]
pub struct App {
    router: Router<usize>,
    callbacks: Vec<RouteCallback>,
    routes: Vec<RouteInfo>,
    bindings: Bindings,
    on_error: ErrorBoundary,
}

impl App {
    /// An app with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            callbacks: Vec::new(),
            routes: Vec::new(),
            bindings: Bindings::default(),
            on_error: Arc::new(default_error_response),
        }
    }

    /// Sets the read-only bindings every request context sees.
    #[must_use]
    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Replaces the top-level error boundary.
    #[must_use]
    pub fn on_error<F>(mut self, boundary: F) -> Self
    where
        F: Fn(&HandlerError) -> Response + Send + Sync + 'static,
    {
        self.on_error = Arc::new(boundary);
        self
    }

    /// Registers every operation of `contract`.
    ///
    /// # Errors
    ///
    /// Fails when `handlers` does not match the contract or a route
    /// conflicts with one already registered. On failure the app keeps the
    /// routes it had before the call.
    pub fn mount(
        &mut self,
        contract: &Contract,
        handlers: Handlers,
        config: EndpointConfig,
    ) -> Result<(), RegistrationError> {
        let mut staged = self.clone();
        create_endpoints(contract, handlers, &mut staged, config)?;
        *self = staged;
        Ok(())
    }

    /// Registered routes in registration order.
    #[must_use]
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    /// The bindings handed to request contexts.
    #[must_use]
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Handles one request.
    pub async fn handle(&self, request: Request<Full<Bytes>>) -> Response {
        let (parts, body) = request.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };
        self.handle_parts(parts, body).await
    }

    /// Handles a request whose body is already collected.
    pub async fn handle_parts(&self, parts: http::request::Parts, body: Bytes) -> Response {
        let route = match self.router.lookup(&parts.method, parts.uri.path()) {
            Lookup::Found(found) => found,
            Lookup::MethodNotAllowed(allowed) => {
                tracing::debug!(method = %parts.method, path = %parts.uri.path(), "Method not allowed");
                return method_not_allowed(&allowed);
            }
            Lookup::NotFound => {
                tracing::debug!(method = %parts.method, path = %parts.uri.path(), "No route matched");
                return Response::json(StatusCode::NOT_FOUND, &json!({ "message": "Not Found" }));
            }
        };

        let Some(callback) = self.callbacks.get(*route.value) else {
            return Response::json(StatusCode::NOT_FOUND, &json!({ "message": "Not Found" }));
        };

        let request = RouteRequest {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            path_params: route
                .params
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            body,
            bindings: self.bindings.clone(),
        };

        match callback(request).await {
            Ok(response) => response,
            Err(err) => (self.on_error)(&err),
        }
    }
}

impl HostRouter for App {
    fn register(
        &mut self,
        method: Method,
        path: &str,
        callback: RouteCallback,
    ) -> Result<(), RegistrationError> {
        let index = self.callbacks.len();
        self.router
            .route(method.clone(), path, index)
            .map_err(|source| RegistrationError::Route {
                method: method.clone(),
                path: path.to_string(),
                source,
            })?;
        self.callbacks.push(callback);
        self.routes.push(RouteInfo {
            method,
            path: path.to_string(),
        });
        Ok(())
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

/// The default error boundary.
#[must_use]
pub fn default_error_response(err: &HandlerError) -> Response {
    if let Some(http) = err.as_http() {
        return http.to_response();
    }
    tracing::error!(error = %err, "Unhandled handler error");
    Response::json(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({ "message": err.to_string() }),
    )
}

fn method_not_allowed(allowed: &[Method]) -> Response {
    let mut response = Response::json(
        StatusCode::METHOD_NOT_ALLOWED,
        &json!({ "message": "Method Not Allowed" }),
    );
    let list = allowed
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if let Ok(value) = HeaderValue::from_str(&list) {
        response.headers_mut().insert(ALLOW, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::{HandlerResponse, HttpError, Input, Operation, RequestContext, Schema};
    use serde_json::Value;

    fn request(method: Method, uri: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn app() -> App {
        let contract = Contract::builder()
            .operation(
                "getThing",
                Operation::get("/things/:id")
                    .path_params(Schema::object().field("id", Schema::string()))
                    .build(),
            )
            .operation("fail", Operation::get("/fail").build())
            .operation("boom", Operation::get("/boom").build())
            .build()
            .unwrap();
        let handlers = Handlers::new()
            .handler_sync("getThing", |input: Input, ctx: RequestContext| {
                Ok(HandlerResponse::ok(json!({
                    "id": input.params["id"],
                    "env": ctx.bindings().get("STAGE").cloned()
                })))
            })
            .handler_sync("fail", |_input: Input, _ctx: RequestContext| {
                Err::<HandlerResponse, _>(HttpError::conflict("already exists").into())
            })
            .handler_sync("boom", |_input: Input, _ctx: RequestContext| {
                Err::<HandlerResponse, _>(HandlerError::other(disk_error()))
            });
        let mut app = App::new().with_bindings(Bindings::new().with("STAGE", "test"));
        app.mount(&contract, handlers, EndpointConfig::new()).unwrap();
        app
    }

    fn disk_error() -> std::io::Error {
        std::io::Error::other("disk on fire")
    }

    #[tokio::test]
    async fn test_matched_route_with_params_and_bindings() {
        let response = app().handle(request(Method::GET, "/things/42")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"id": "42", "env": "test"}));
    }

    #[test]
    fn test_not_found() {
        let response = tokio_test::block_on(app().handle(request(Method::GET, "/nothing")));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            tokio_test::block_on(json_body(response)),
            json!({"message": "Not Found"})
        );
    }

    #[tokio::test]
    async fn test_method_not_allowed_lists_methods() {
        let response = app().handle(request(Method::DELETE, "/things/42")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), "GET");
    }

    #[tokio::test]
    async fn test_structured_error_renders_itself() {
        let response = app().handle(request(Method::GET, "/fail")).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await, json!({"message": "already exists"}));
    }

    #[tokio::test]
    async fn test_unstructured_error_is_500_with_message() {
        let response = app().handle(request(Method::GET, "/boom")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({"message": "disk on fire"}));
    }

    #[tokio::test]
    async fn test_custom_error_boundary() {
        let app = app().on_error(|_| Response::text(StatusCode::SERVICE_UNAVAILABLE, "down"));
        let response = app.handle(request(Method::GET, "/boom")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_route_conflict_is_registration_error() {
        let contract = Contract::builder()
            .operation("a", Operation::get("/same").build())
            .operation("b", Operation::get("/same").build())
            .build()
            .unwrap();
        let noop = |_input: Input, _ctx: RequestContext| Ok(HandlerResponse::empty(StatusCode::OK));
        let handlers = Handlers::new().handler_sync("a", noop).handler_sync("b", noop);
        let mut app = App::new();
        let err = app.mount(&contract, handlers, EndpointConfig::new()).unwrap_err();
        assert!(matches!(err, RegistrationError::Route { .. }));
        assert!(app.routes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_mount_keeps_previous_routes() {
        let noop = |_input: Input, _ctx: RequestContext| Ok(HandlerResponse::empty(StatusCode::OK));
        let first = Contract::builder()
            .operation("taken", Operation::get("/taken").build())
            .build()
            .unwrap();
        let mut app = App::new();
        app.mount(&first, Handlers::new().handler_sync("taken", noop), EndpointConfig::new())
            .unwrap();

        let second = Contract::builder()
            .operation("fresh", Operation::get("/fresh").build())
            .operation("again", Operation::get("/taken").build())
            .build()
            .unwrap();
        let handlers = Handlers::new().handler_sync("fresh", noop).handler_sync("again", noop);
        let err = app.mount(&second, handlers, EndpointConfig::new()).unwrap_err();
        assert!(matches!(err, RegistrationError::Route { .. }));

        let paths: Vec<_> = app.routes().iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/taken"]);
        let response = app.handle(request(Method::GET, "/fresh")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = app.handle(request(Method::GET, "/taken")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_routes_listing() {
        let routes: Vec<_> = app()
            .routes()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect();
        assert_eq!(routes, vec!["GET /things/:id", "GET /fail", "GET /boom"]);
    }
}
