//! # Covenant Core
//!
//! Core types shared by every covenant crate:
//!
//! - [`Schema`] and the [`SchemaValidator`] capability - structural validation
//!   producing a parsed value or a list of [`Issue`]s
//! - [`format_issues`] - turns issue lists into a stable, client-facing tree
//! - [`Operation`] and [`Contract`] - the declarative API description
//! - [`RequestContext`] - per-request key/value state plus the raw request view
//! - [`Handlers`] and [`HandlerResponse`] - the implementation side of a contract
//! - [`HttpError`] and [`HandlerError`] - errors handlers may raise
//!
//! ## Example
//!
//! ```
//! use covenant_core::{Contract, Operation, Schema};
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
//! assert_eq!(contract.operations().len(), 1);
//! ```

#![doc(html_root_url = "https://docs.rs/covenant-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod contract;
mod error;
pub mod format;
pub mod handler;
pub mod registry;
pub mod response;
pub mod schema;

pub use context::{Bindings, RequestContext, RequestId};
pub use contract::{Contract, ContractBuilder, ContractNode, Operation, OperationBuilder, OperationEntry};
pub use error::{ContractError, HandlerError, HttpError, RegistrationError};
pub use format::{format_issues, FormattedIssues};
pub use handler::{BoxFuture, BoxedHandler, HandlerNode, HandlerResponse, HandlerResult, Handlers, Input};
pub use registry::check_shape;
pub use response::{Response, ResponseExt};
pub use schema::{Issue, IssueCode, Pattern, Schema, SchemaValidator, SharedSchema, UnknownKeys};
