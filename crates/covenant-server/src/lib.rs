//! # Covenant Server
//!
//! Binds a [`Contract`](covenant_core::Contract) and its
//! [`Handlers`](covenant_core::Handlers) onto a router:
//!
//! - [`validate_request`] - the request validation stage over path params,
//!   query, headers and body
//! - [`create_endpoints`] - the dispatcher, generic over any [`HostRouter`]
//! - [`App`] - the bundled host router with its top-level error boundary
//! - [`Server`] - a hyper HTTP/1.1 serving loop with graceful shutdown
//!
//! ## Example
//!
//! ```rust,ignore
//! use covenant_server::{App, EndpointConfig, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = App::new();
//!     app.mount(&contract(), handlers(), EndpointConfig::new().log_initialization(true))?;
//!     Server::new(app).http_addr("0.0.0.0:8080").run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/covenant-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod app;
pub mod config;
pub mod dispatcher;
pub mod query;
pub mod server;
pub mod validation;

pub use app::{default_error_response, App, ErrorBoundary, RouteInfo};
pub use config::{
    default_request_error, default_response_error, EndpointConfig, RequestErrorHandler,
    ResponseErrorHandler, ResponseValidationPredicate, StructuredResponse,
};
pub use dispatcher::{create_endpoints, HostRouter, RouteCallback, RouteRequest, OPERATION_ID_KEY};
pub use query::normalize_query;
pub use server::{Server, ServerError};
pub use validation::{validate_request, RawRequest, SurfaceIssues};
