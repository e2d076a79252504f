//! HTTP response type shared by handlers, the dispatcher and the host router.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::Full;
use serde_json::Value;

/// A fully buffered HTTP response.
pub type Response = http::Response<Full<Bytes>>;

const APPLICATION_JSON: &str = "application/json";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Constructors for [`Response`].
pub trait ResponseExt {
    /// A JSON response. A `null` body produces an empty payload with no
    /// content type.
    fn json(status: StatusCode, body: &Value) -> Response;

    /// A plain text response.
    fn text(status: StatusCode, body: impl Into<String>) -> Response;

    /// A response without a body.
    fn empty(status: StatusCode) -> Response;
}

impl ResponseExt for Response {
    fn json(status: StatusCode, body: &Value) -> Response {
        if body.is_null() {
            return Self::empty(status);
        }
        // Serializing a `Value` cannot fail.
        let bytes = serde_json::to_vec(body).unwrap_or_default();
        with_body(status, Bytes::from(bytes), Some(APPLICATION_JSON))
    }

    fn text(status: StatusCode, body: impl Into<String>) -> Response {
        with_body(status, Bytes::from(body.into()), Some(TEXT_PLAIN))
    }

    fn empty(status: StatusCode) -> Response {
        with_body(status, Bytes::new(), None)
    }
}

fn with_body(status: StatusCode, body: Bytes, content_type: Option<&'static str>) -> Response {
    let mut response = http::Response::new(Full::new(body));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    response
}
