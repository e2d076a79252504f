//! Contract dispatcher.
//!
//! [`create_endpoints`] registers one route per contract operation on a
//! [`HostRouter`]. Each route callback runs the same pipeline:
//!
//! 1. request validation; on failure the request error callback shapes the
//!    response and the handler is skipped
//! 2. the handler, with the validated [`Input`] and a fresh [`RequestContext`]
//! 3. response validation for structured results when the per-request
//!    predicate allows it and the returned status declares a schema
//! 4. emission
//!
//! Handler errors are returned to the host router's error boundary.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use tracing::Instrument;

use covenant_core::{
    check_shape, Bindings, BoxFuture, BoxedHandler, Contract, HandlerError, HandlerResponse,
    Handlers, Input, Operation, RegistrationError, RequestContext, Response, ResponseExt,
};

use crate::config::EndpointConfig;
use crate::validation::{validate_request, RawRequest};

/// Context key holding the dotted operation id.
pub const OPERATION_ID_KEY: &str = "operation_id";

/// What the host router hands to a route callback.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// Request method
    pub method: Method,
    /// Request URI
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
    /// Path parameters captured by route matching
    pub path_params: Vec<(String, String)>,
    /// Collected request body
    pub body: Bytes,
    /// Process bindings visible to handlers
    pub bindings: Bindings,
}

/// A registered route callback.
pub type RouteCallback =
    Arc<dyn Fn(RouteRequest) -> BoxFuture<'static, Result<Response, HandlerError>> + Send + Sync>;

/// A router that can accept `(method, template) -> callback` registrations.
pub trait HostRouter {
    /// Registers `callback` for `method` and `path`.
    ///
    /// # Errors
    ///
    /// Fails when the router rejects the route.
    fn register(
        &mut self,
        method: Method,
        path: &str,
        callback: RouteCallback,
    ) -> Result<(), RegistrationError>;
}

/// Registers every operation of `contract` on `router`.
///
/// The handler tree is checked against the contract before anything is
/// registered, so a mismatch leaves the router untouched. Routes are
/// registered in declaration order; when the router rejects one, the routes
/// before it stay registered. [`App::mount`](crate::App::mount) stages
/// registration on a copy so a failure there leaves the app unchanged.
///
/// # Errors
///
/// Returns the first shape mismatch or route registration failure.
pub fn create_endpoints<R>(
    contract: &Contract,
    handlers: Handlers,
    router: &mut R,
    config: EndpointConfig,
) -> Result<(), RegistrationError>
where
    R: HostRouter + ?Sized,
{
    check_shape(contract, &handlers)?;

    for entry in contract.operations() {
        let operation_id = entry.operation_id();
        let handler = handlers
            .resolve(entry.key())
            .cloned()
            .ok_or_else(|| RegistrationError::MissingHandler {
                operation: operation_id.clone(),
            })?;
        let method = entry.operation().method().clone();

        if config.logs_initialization() {
            tracing::info!(
                method = %method,
                path = %entry.path(),
                operation_id = %operation_id,
                "Registered route"
            );
        }

        let endpoint = Arc::new(Endpoint {
            operation_id,
            operation: entry.operation().clone(),
            handler,
            config: config.clone(),
        });
        let callback: RouteCallback = Arc::new(
            move |request: RouteRequest| -> BoxFuture<'static, Result<Response, HandlerError>> {
                let endpoint = Arc::clone(&endpoint);
                Box::pin(async move { endpoint.call(request).await })
            },
        );
        router.register(method, entry.path(), callback)?;
    }

    Ok(())
}

struct Endpoint {
    operation_id: String,
    operation: Operation,
    handler: BoxedHandler,
    config: EndpointConfig,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("operation_id", &self.operation_id)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

impl Endpoint {
    async fn call(&self, request: RouteRequest) -> Result<Response, HandlerError> {
        let ctx = RequestContext::builder(request.method, request.uri)
            .operation_id(self.operation_id.as_str())
            .headers(request.headers.clone())
            .path_params(request.path_params.iter().cloned())
            .bindings(request.bindings)
            .build();
        ctx.set(OPERATION_ID_KEY, self.operation_id.as_str());

        let span = tracing::info_span!(
            "operation",
            operation_id = %self.operation_id,
            request_id = %ctx.request_id(),
            status = tracing::field::Empty,
        );

        let raw = RawRequest {
            path_params: request.path_params,
            query: ctx.raw_query().map(str::to_string),
            headers: request.headers,
            body: request.body,
        };

        async move {
            let result = self.run(raw, ctx).await;
            if let Ok(response) = &result {
                tracing::Span::current().record("status", response.status().as_u16());
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, raw: RawRequest, ctx: RequestContext) -> Result<Response, HandlerError> {
        let input: Input = match validate_request(&self.operation, &raw) {
            Ok(input) => input,
            Err(issues) => {
                tracing::debug!(
                    surfaces = ?issues.failing_surfaces(),
                    "Request validation failed"
                );
                return Ok(self.config.request_error(&issues).into_response());
            }
        };

        let outcome = (self.handler)(input, ctx.clone()).await?;

        let (status, body) = match outcome {
            HandlerResponse::Sent(response) => return Ok(response),
            HandlerResponse::Structured { status, body } => (status, body),
        };

        if self.config.validates_response(&ctx) {
            // Undeclared statuses and bodiless declarations both skip validation.
            if let Some(schema) = self.operation.response_schema(status) {
                if let Err(issues) = schema.validate(&body) {
                    tracing::warn!(
                        status = status.as_u16(),
                        issues = issues.len(),
                        "Response validation failed"
                    );
                    return Ok(self.config.response_error(&issues).into_response());
                }
            }
        }

        Ok(Response::json(status, &body))
    }
}
