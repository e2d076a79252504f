//! # Covenant
//!
//! Contract-first HTTP endpoints. A [`Contract`](core::Contract) declares each
//! operation's method, path and schemas; a [`Handlers`](core::Handlers) tree
//! of the same shape supplies the logic; [`create_endpoints`](server::create_endpoints)
//! checks the two against each other and registers one validated route per
//! operation.
//!
//! ## Quick Start
//!
//! ```rust
//! use covenant::prelude::*;
//! use serde_json::json;
//!
//! let contract = Contract::builder()
//!     .operation(
//!         "getThing",
//!         Operation::get("/things/:id")
//!             .path_params(Schema::object().field("id", Schema::string()))
//!             .response(200, Schema::object().field("id", Schema::string()))
//!             .build(),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let handlers = Handlers::new().handler("getThing", |input: Input, _ctx: RequestContext| async move {
//!     Ok(HandlerResponse::ok(json!({ "id": input.params["id"] })))
//! });
//!
//! let mut app = App::new();
//! app.mount(&contract, handlers, EndpointConfig::new().log_initialization(true))
//!     .unwrap();
//! ```
//!
//! ## Request flow
//!
//! ```text
//! Request → App (route match) → validate path/query/headers/body → Handler
//!                                                                    ↓
//! Response ← error boundary ← response validation (if enabled) ←────┘
//! ```

pub mod bootstrap;

pub use covenant_config as config;
pub use covenant_core as core;
pub use covenant_router as router;
pub use covenant_server as server;
pub use covenant_telemetry as telemetry;

/// Common imports.
///
/// ```rust
/// use covenant::prelude::*;
/// ```
pub mod prelude {
    pub use covenant_core::{
        Bindings, Contract, HandlerError, HandlerResponse, HandlerResult, Handlers, HttpError,
        Input, Issue, Operation, RegistrationError, RequestContext, Response, ResponseExt, Schema,
        SchemaValidator,
    };

    pub use covenant_server::{
        create_endpoints, App, EndpointConfig, HostRouter, Server, StructuredResponse,
        SurfaceIssues,
    };

    pub use covenant_config::{ConfigLoader, CovenantConfig};
}
