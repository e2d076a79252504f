//! Handler types.
//!
//! A handler receives the validated [`Input`] bundle and the
//! [`RequestContext`], and finishes in one of two ways:
//!
//! - [`HandlerResponse::Structured`] - a status and JSON body, subject to
//!   response validation
//! - [`HandlerResponse::Sent`] - a response emitted directly through the
//!   context (early return), which bypasses response validation
//!
//! [`Handlers`] mirrors the shape of a [`Contract`](crate::Contract): one
//! handler per operation, one nested [`Handlers`] per nested contract.
//!
//! ```
//! use covenant_core::{HandlerError, HandlerResponse, Handlers, Input, RequestContext};
//! use serde_json::json;
//!
//! let handlers = Handlers::new()
//!     .handler("getThing", |input: Input, _ctx: RequestContext| async move {
//!         Ok(HandlerResponse::ok(json!({ "id": input.params["id"] })))
//!     })
//!     .handler_sync("getSyncReturn", |_input: Input, _ctx: RequestContext| {
//!         Ok(HandlerResponse::ok(json!({ "id": "sync" })))
//!     });
//!
//! assert_eq!(handlers.len(), 2);
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::context::RequestContext;
use crate::error::HandlerError;
use crate::response::{Response, ResponseExt};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler produces.
pub type HandlerResult = Result<HandlerResponse, HandlerError>;

/// A type-erased handler over untyped input.
pub type BoxedHandler =
    Arc<dyn Fn(Input, RequestContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Terminal outcome of a handler.
#[derive(Debug)]
pub enum HandlerResponse {
    /// A status and body for the dispatcher to validate and emit.
    Structured {
        /// Response status
        status: StatusCode,
        /// JSON body; `null` means no body
        body: Value,
    },
    /// A response already produced through the context.
    Sent(Response),
}

impl HandlerResponse {
    /// A structured response.
    pub fn new(status: StatusCode, body: impl Into<Value>) -> Self {
        Self::Structured {
            status,
            body: body.into(),
        }
    }

    /// A structured `200 OK`.
    pub fn ok(body: impl Into<Value>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// A structured response without a body.
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, Value::Null)
    }

    /// A structured response from any serializable body.
    pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Result<Self, HandlerError> {
        Ok(Self::new(status, serde_json::to_value(body)?))
    }

    /// The status of either variant.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Structured { status, .. } => *status,
            Self::Sent(response) => response.status(),
        }
    }

    /// True for the early-return variant.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent(_))
    }

    /// Renders the HTTP response.
    #[must_use]
    pub fn into_response(self) -> Response {
        match self {
            Self::Structured { status, body } => Response::json(status, &body),
            Self::Sent(response) => response,
        }
    }
}

impl From<(StatusCode, Value)> for HandlerResponse {
    fn from((status, body): (StatusCode, Value)) -> Self {
        Self::new(status, body)
    }
}

/// The validated input bundle.
///
/// Each surface holds the parsed value when the operation declares a schema
/// for it and the raw value otherwise. Handlers may ask for their own types
/// by naming them; conversion uses serde.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Input<P = Value, Q = Value, H = Value, B = Value> {
    /// Path parameters
    pub params: P,
    /// Query parameters
    pub query: Q,
    /// Request headers
    pub headers: H,
    /// Request body
    pub body: B,
}

impl Input {
    /// Deserializes every surface into the requested types.
    ///
    /// A mismatch here means the handler types disagree with the contract,
    /// so it surfaces as an internal error rather than a client error.
    pub fn typed<P, Q, H, B>(self) -> Result<Input<P, Q, H, B>, HandlerError>
    where
        P: DeserializeOwned,
        Q: DeserializeOwned,
        H: DeserializeOwned,
        B: DeserializeOwned,
    {
        Ok(Input {
            params: convert("params", self.params)?,
            query: convert("query", self.query)?,
            headers: convert("headers", self.headers)?,
            body: convert("body", self.body)?,
        })
    }
}

fn convert<T: DeserializeOwned>(surface: &str, value: Value) -> Result<T, HandlerError> {
    serde_json::from_value(value).map_err(|err| {
        HandlerError::other(anyhow::anyhow!(
            "validated {surface} does not match the handler input type: {err}"
        ))
    })
}

/// An entry of a handler tree.
#[derive(Clone)]
pub enum HandlerNode {
    /// The implementation of one operation.
    Handler(BoxedHandler),
    /// Handlers of a nested contract.
    Router(Handlers),
}

impl HandlerNode {
    pub(crate) const fn kind(&self) -> &'static str {
        match self {
            Self::Handler(_) => "a handler",
            Self::Router(_) => "a router",
        }
    }
}

impl fmt::Debug for HandlerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler"),
            Self::Router(nested) => f.debug_tuple("Router").field(nested).finish(),
        }
    }
}

/// Handler tree mirroring a contract.
#[derive(Debug, Clone, Default)]
pub struct Handlers {
    entries: IndexMap<String, HandlerNode>,
    duplicates: Vec<String>,
}

impl Handlers {
    /// An empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an async handler.
    ///
    /// The surface types `P`, `Q`, `H`, `B` are deserialized from the
    /// validated input; use `Input` (all `serde_json::Value`) to skip that.
    #[must_use]
    pub fn handler<F, Fut, P, Q, H, B, R>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Input<P, Q, H, B>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
        R: Into<HandlerResponse>,
        P: DeserializeOwned + Send + 'static,
        Q: DeserializeOwned + Send + 'static,
        H: DeserializeOwned + Send + 'static,
        B: DeserializeOwned + Send + 'static,
    {
        let boxed: BoxedHandler = Arc::new(
            move |input: Input, ctx: RequestContext| -> BoxFuture<'static, HandlerResult> {
                match input.typed::<P, Q, H, B>() {
                    Ok(typed) => {
                        let pending = handler(typed, ctx);
                        Box::pin(async move { pending.await.map(Into::into) })
                    }
                    Err(err) => Box::pin(std::future::ready(Err(err))),
                }
            },
        );
        self.insert(name.into(), HandlerNode::Handler(boxed))
    }

    /// Adds a handler that completes without suspending.
    #[must_use]
    pub fn handler_sync<F, P, Q, H, B, R>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Input<P, Q, H, B>, RequestContext) -> Result<R, HandlerError> + Send + Sync + 'static,
        R: Into<HandlerResponse>,
        P: DeserializeOwned,
        Q: DeserializeOwned,
        H: DeserializeOwned,
        B: DeserializeOwned,
    {
        let boxed: BoxedHandler = Arc::new(
            move |input: Input, ctx: RequestContext| -> BoxFuture<'static, HandlerResult> {
                let result = input
                    .typed::<P, Q, H, B>()
                    .and_then(|typed| handler(typed, ctx).map(Into::into));
                Box::pin(std::future::ready(result))
            },
        );
        self.insert(name.into(), HandlerNode::Handler(boxed))
    }

    /// Adds an already type-erased handler.
    #[must_use]
    pub fn boxed(self, name: impl Into<String>, handler: BoxedHandler) -> Self {
        self.insert(name.into(), HandlerNode::Handler(handler))
    }

    /// Adds the handlers of a nested contract.
    #[must_use]
    pub fn router(self, name: impl Into<String>, nested: Handlers) -> Self {
        self.insert(name.into(), HandlerNode::Router(nested))
    }

    fn insert(mut self, name: String, node: HandlerNode) -> Self {
        if self.entries.contains_key(&name) {
            self.duplicates.push(name);
        } else {
            self.entries.insert(name, node);
        }
        self
    }

    /// Looks up an entry of this level.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&HandlerNode> {
        self.entries.get(name)
    }

    /// Follows `key` down the tree to a handler.
    #[must_use]
    pub fn resolve(&self, key: &[&str]) -> Option<&BoxedHandler> {
        let (last, parents) = key.split_last()?;
        let mut level = self;
        for name in parents {
            match level.entries.get(*name)? {
                HandlerNode::Router(nested) => level = nested,
                HandlerNode::Handler(_) => return None,
            }
        }
        match level.entries.get(*last)? {
            HandlerNode::Handler(handler) => Some(handler),
            HandlerNode::Router(_) => None,
        }
    }

    /// Entries of this level in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &HandlerNode)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Names registered more than once at this level.
    #[must_use]
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Number of entries at this level.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when this level is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
