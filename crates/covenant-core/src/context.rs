//! Per-request context.
//!
//! A [`RequestContext`] is created fresh for every request by the dispatcher
//! and dropped once the response is emitted. It carries:
//!
//! - the request id and the dotted operation name
//! - a read-only view of the raw request (method, URI, headers, path params)
//! - process-wide [`Bindings`], such as feature toggles read by config predicates
//! - a mutable key/value bag for handler state (an auth token, for example)
//! - early-return helpers that let a handler emit a response directly
//!
//! Cloning a context yields another handle to the same request state. Handles
//! never outlive the request they were created for.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::{HeaderMap, Method, StatusCode, Uri};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::handler::HandlerResponse;
use crate::response::{Response, ResponseExt};

/// A unique, time-ordered request identifier (UUID v7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a new id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Read-only values shared by every request of a process.
///
/// Typically populated from configuration or the environment at startup.
///
/// ```
/// use covenant_core::Bindings;
///
/// let bindings = Bindings::new().with("ENABLE_RESPONSE_VALIDATION", "false");
/// assert_eq!(bindings.get_bool("ENABLE_RESPONSE_VALIDATION"), Some(false));
/// assert_eq!(bindings.get_bool("MISSING"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Bindings(Arc<IndexMap<String, Value>>);

impl Bindings {
    /// Empty bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.0).insert(key.into(), value.into());
        self
    }

    /// Looks up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Reads a flag. Accepts JSON booleans and the strings
    /// `true`/`false`/`1`/`0`/`yes`/`no`/`on`/`off`.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(flag) => Some(*flag),
            Value::String(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(Arc::new(
            iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }
}

#[derive(Debug)]
struct Inner {
    request_id: RequestId,
    operation_id: Option<String>,
    started_at: Instant,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    path_params: Vec<(String, String)>,
    bindings: Bindings,
    vars: Mutex<IndexMap<String, Value>>,
    responded: AtomicBool,
}

/// Per-request state handed to handlers.
///
/// ```
/// use covenant_core::RequestContext;
/// use http::{Method, Uri};
///
/// let ctx = RequestContext::builder(Method::GET, Uri::from_static("/things/1?x=2"))
///     .path_param("id", "1")
///     .operation_id("getThing")
///     .build();
///
/// ctx.set("auth_token", "abc");
/// assert_eq!(ctx.get_as::<String>("auth_token").as_deref(), Some("abc"));
/// assert_eq!(ctx.path_param("id"), Some("1"));
/// assert_eq!(ctx.raw_query(), Some("x=2"));
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

impl RequestContext {
    /// Starts building a context for a request.
    pub fn builder(method: Method, uri: Uri) -> RequestContextBuilder {
        RequestContextBuilder {
            request_id: None,
            operation_id: None,
            method,
            uri,
            headers: HeaderMap::new(),
            path_params: Vec::new(),
            bindings: Bindings::default(),
        }
    }

    /// A `GET /` context for tests.
    #[must_use]
    pub fn mock() -> Self {
        Self::builder(Method::GET, Uri::from_static("/")).build()
    }

    /// The request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.inner.request_id
    }

    /// Dotted name of the operation being served.
    #[must_use]
    pub fn operation_id(&self) -> Option<&str> {
        self.inner.operation_id.as_deref()
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    /// Request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// Request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    /// The undecoded query string, if any.
    #[must_use]
    pub fn raw_query(&self) -> Option<&str> {
        self.inner.uri.query()
    }

    /// Decoded query pairs grouped by key, every value kept in order.
    ///
    /// An unparseable query string yields an empty map.
    #[must_use]
    pub fn raw_queries(&self) -> IndexMap<String, Vec<String>> {
        let pairs = self
            .raw_query()
            .and_then(|raw| serde_urlencoded::from_str::<Vec<(String, String)>>(raw).ok())
            .unwrap_or_default();
        let mut grouped: IndexMap<String, Vec<String>> = IndexMap::new();
        for (key, value) in pairs {
            grouped.entry(key).or_default().push(value);
        }
        grouped
    }

    /// Raw request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// A header value, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// A raw path parameter.
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.inner
            .path_params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All raw path parameters in template order.
    pub fn path_params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .path_params
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Process-wide bindings.
    #[must_use]
    pub fn bindings(&self) -> &Bindings {
        &self.inner.bindings
    }

    // ==================== Key/value bag ====================

    /// Reads a value from the bag.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.vars.lock().get(key).cloned()
    }

    /// Reads and deserializes a value from the bag.
    ///
    /// Returns `None` when the key is absent or holds another type.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    /// Stores a value, returning the previous one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inner.vars.lock().insert(key.into(), value.into())
    }

    /// Removes a value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.vars.lock().shift_remove(key)
    }

    /// True when the bag holds `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.vars.lock().contains_key(key)
    }

    /// Copy of the whole bag, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.inner.vars.lock().clone()
    }

    // ==================== Early return ====================

    /// Emits a JSON response directly. Response validation does not apply.
    pub fn json(&self, status: StatusCode, body: &Value) -> HandlerResponse {
        self.respond(Response::json(status, body))
    }

    /// Emits a plain text response directly.
    pub fn text(&self, status: StatusCode, body: impl Into<String>) -> HandlerResponse {
        self.respond(Response::text(status, body))
    }

    /// Emits an empty response directly.
    pub fn empty(&self, status: StatusCode) -> HandlerResponse {
        self.respond(Response::empty(status))
    }

    /// Emits a prebuilt response directly.
    pub fn respond(&self, response: Response) -> HandlerResponse {
        self.inner.responded.store(true, Ordering::Release);
        HandlerResponse::Sent(response)
    }

    /// True once an early-return helper was used.
    #[must_use]
    pub fn has_responded(&self) -> bool {
        self.inner.responded.load(Ordering::Acquire)
    }
}

/// Builder for [`RequestContext`].
#[must_use]
pub struct RequestContextBuilder {
    request_id: Option<RequestId>,
    operation_id: Option<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    path_params: Vec<(String, String)>,
    bindings: Bindings,
}

impl RequestContextBuilder {
    /// Uses a specific request id instead of generating one.
    pub fn request_id(mut self, id: RequestId) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Sets the dotted operation name.
    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    /// Sets the raw headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Adds a raw path parameter.
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.push((name.into(), value.into()));
        self
    }

    /// Replaces all raw path parameters.
    pub fn path_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.path_params = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Sets the process bindings.
    pub fn bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Finishes the context.
    #[must_use]
    pub fn build(self) -> RequestContext {
        RequestContext {
            inner: Arc::new(Inner {
                request_id: self.request_id.unwrap_or_default(),
                operation_id: self.operation_id,
                started_at: Instant::now(),
                method: self.method,
                uri: self.uri,
                headers: self.headers,
                path_params: self.path_params,
                bindings: self.bindings,
                vars: Mutex::new(IndexMap::new()),
                responded: AtomicBool::new(false),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_fresh_contexts_do_not_share_state() {
        let first = RequestContext::mock();
        let second = RequestContext::mock();
        first.set("auth_token", "abc");
        assert!(second.get("auth_token").is_none());
        assert_ne!(first.request_id(), second.request_id());
    }

    #[test]
    fn test_clones_share_the_bag() {
        let ctx = RequestContext::mock();
        let handle = ctx.clone();
        handle.set("auth_token", "lul");
        assert_eq!(ctx.get("auth_token"), Some(json!("lul")));
    }

    #[test]
    fn test_bag_set_replace_remove() {
        let ctx = RequestContext::mock();
        assert!(ctx.set("n", 1).is_none());
        assert_eq!(ctx.set("n", 2), Some(json!(1)));
        assert_eq!(ctx.get_as::<u32>("n"), Some(2));
        assert_eq!(ctx.get_as::<String>("n"), None);
        assert_eq!(ctx.remove("n"), Some(json!(2)));
        assert!(!ctx.contains("n"));
    }

    #[test]
    fn test_snapshot_keeps_insertion_order() {
        let ctx = RequestContext::mock();
        ctx.set("b", 1);
        ctx.set("a", 2);
        let keys: Vec<_> = ctx.snapshot().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_raw_request_view() {
        let mut headers = HeaderMap::new();
        headers.insert("x-thing", HeaderValue::from_static("yes"));
        let ctx = RequestContext::builder(Method::DELETE, Uri::from_static("/things/9"))
            .headers(headers)
            .path_params([("id", "9")])
            .operation_id("deleteThing")
            .build();

        assert_eq!(ctx.method(), Method::DELETE);
        assert_eq!(ctx.header("X-Thing"), Some("yes"));
        assert_eq!(ctx.path_params().collect::<Vec<_>>(), vec![("id", "9")]);
        assert_eq!(ctx.operation_id(), Some("deleteThing"));
        assert!(ctx.raw_query().is_none());
        assert!(ctx.raw_queries().is_empty());
    }

    #[test]
    fn test_raw_queries_group_repeated_keys() {
        let ctx = RequestContext::builder(
            Method::GET,
            Uri::from_static("/things/1?array=a&single=s&array=b&br%5B%5D=x"),
        )
        .build();

        let queries = ctx.raw_queries();
        let keys: Vec<_> = queries.keys().cloned().collect();
        assert_eq!(keys, vec!["array", "single", "br[]"]);
        assert_eq!(queries["array"], vec!["a", "b"]);
        assert_eq!(queries["single"], vec!["s"]);
        assert_eq!(queries["br[]"], vec!["x"]);
    }

    #[test]
    fn test_early_return_marks_context() {
        let ctx = RequestContext::mock();
        assert!(!ctx.has_responded());
        let response = ctx.json(StatusCode::OK, &json!({"early": true}));
        assert!(ctx.has_responded());
        assert!(matches!(response, HandlerResponse::Sent(_)));
    }

    #[test]
    fn test_bindings_flags() {
        let bindings: Bindings = [("A", json!(true)), ("B", json!("off")), ("C", json!(3))]
            .into_iter()
            .collect();
        assert_eq!(bindings.get_bool("A"), Some(true));
        assert_eq!(bindings.get_bool("B"), Some(false));
        assert_eq!(bindings.get_bool("C"), None);
        assert_eq!(bindings.len(), 3);
    }

    #[test]
    fn test_bindings_shared_via_context() {
        let ctx = RequestContext::builder(Method::GET, Uri::from_static("/"))
            .bindings(Bindings::new().with("ENABLE_RESPONSE_VALIDATION", false))
            .build();
        assert_eq!(
            ctx.bindings().get_bool("ENABLE_RESPONSE_VALIDATION"),
            Some(false)
        );
    }
}
