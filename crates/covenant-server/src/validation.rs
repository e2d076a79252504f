//! Request validation stage.
//!
//! Every surface (path params, query, headers, body) is validated
//! independently; a failure on one surface never stops the others, so a
//! single error report covers every offending surface.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use serde::Serialize;
use serde_json::{Map, Value};

use covenant_core::{format_issues, Input, Issue, IssueCode, Operation, SchemaValidator};

use crate::query::normalize_query;

/// The raw request surfaces as seen by the host router.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    /// Path parameters captured by route matching, in template order
    pub path_params: Vec<(String, String)>,
    /// Raw query string, without the `?`
    pub query: Option<String>,
    /// Request headers
    pub headers: HeaderMap,
    /// Collected request body
    pub body: Bytes,
}

/// Per-surface issue lists of a failed validation.
///
/// `None` means the surface had no schema or passed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceIssues {
    /// Path parameter issues
    pub path_params: Option<Vec<Issue>>,
    /// Query issues
    pub query: Option<Vec<Issue>>,
    /// Header issues
    pub headers: Option<Vec<Issue>>,
    /// Body issues
    pub body: Option<Vec<Issue>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FormattedSurfaces {
    path_params: Option<Value>,
    query: Option<Value>,
    headers: Option<Value>,
    body: Option<Value>,
}

impl SurfaceIssues {
    /// True when no surface failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path_params.is_none()
            && self.query.is_none()
            && self.headers.is_none()
            && self.body.is_none()
    }

    /// Names of the failing surfaces, for logging.
    #[must_use]
    pub fn failing_surfaces(&self) -> Vec<&'static str> {
        [
            ("pathParams", &self.path_params),
            ("query", &self.query),
            ("headers", &self.headers),
            ("body", &self.body),
        ]
        .into_iter()
        .filter(|(_, issues)| issues.is_some())
        .map(|(name, _)| name)
        .collect()
    }

    /// Renders `{"pathParams", "query", "headers", "body"}`, each the
    /// formatted issue tree or `null`.
    #[must_use]
    pub fn formatted(&self) -> Value {
        let render = |issues: &Option<Vec<Issue>>| {
            issues
                .as_deref()
                .map(|issues| format_issues(issues).to_value())
        };
        let surfaces = FormattedSurfaces {
            path_params: render(&self.path_params),
            query: render(&self.query),
            headers: render(&self.headers),
            body: render(&self.body),
        };
        serde_json::to_value(surfaces).unwrap_or(Value::Null)
    }
}

/// Validates every surface of `request` against `operation`.
///
/// Surfaces without a schema pass through as raw JSON values.
pub fn validate_request(operation: &Operation, request: &RawRequest) -> Result<Input, SurfaceIssues> {
    let mut failures = SurfaceIssues::default();

    let params = surface(
        operation.path_params_schema(),
        params_value(&request.path_params),
        &mut failures.path_params,
    );

    let array_keys = operation
        .query_schema()
        .map(|schema| schema.array_properties())
        .unwrap_or_default();
    let query = surface(
        operation.query_schema(),
        normalize_query(request.query.as_deref(), &array_keys),
        &mut failures.query,
    );

    let headers = surface(
        operation.headers_schema(),
        headers_value(&request.headers),
        &mut failures.headers,
    );

    let body = match (operation.body_schema(), parse_body(&request.headers, &request.body)) {
        (Some(schema), Ok(raw)) => surface(Some(schema), raw, &mut failures.body),
        (Some(_), Err(issue)) => {
            failures.body = Some(vec![issue]);
            Value::Null
        }
        (None, Ok(raw)) => raw,
        (None, Err(_)) => Value::String(String::from_utf8_lossy(&request.body).into_owned()),
    };

    if failures.is_empty() {
        Ok(Input {
            params,
            query,
            headers,
            body,
        })
    } else {
        Err(failures)
    }
}

fn surface(schema: Option<&dyn SchemaValidator>, raw: Value, failure: &mut Option<Vec<Issue>>) -> Value {
    let Some(schema) = schema else {
        return raw;
    };
    match schema.validate(&raw) {
        Ok(parsed) => parsed,
        Err(issues) => {
            *failure = Some(issues);
            Value::Null
        }
    }
}

/// Path parameters as a JSON object of strings.
#[must_use]
pub fn params_value(params: &[(String, String)]) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(name, value)| (name.clone(), Value::from(value.as_str())))
            .collect(),
    )
}

/// Headers as a JSON object keyed by lower-case name.
///
/// Repeated headers are joined with `", "`.
#[must_use]
pub fn headers_value(headers: &HeaderMap) -> Value {
    let mut object = Map::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        object.insert(name.as_str().to_string(), Value::from(joined));
    }
    Value::Object(object)
}

/// Parses the request payload.
///
/// An empty payload is `null`. JSON content types are parsed strictly; a
/// payload without a content type is parsed when it looks like JSON. Any
/// other payload is passed on as a string.
pub fn parse_body(headers: &HeaderMap, body: &Bytes) -> Result<Value, Issue> {
    if body.is_empty() {
        return Ok(Value::Null);
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_ascii_lowercase);

    match content_type {
        Some(ct) if is_json(&ct) => serde_json::from_slice(body)
            .map_err(|err| Issue::new(IssueCode::InvalidJson, format!("Invalid JSON: {err}"))),
        None if looks_like_json(body) => Ok(serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))),
        _ => Ok(Value::String(String::from_utf8_lossy(body).into_owned())),
    }
}

fn is_json(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence == "application/json" || essence.ends_with("+json")
}

fn looks_like_json(body: &[u8]) -> bool {
    matches!(
        body.iter().find(|b| !b.is_ascii_whitespace()),
        Some(b'{' | b'[')
    )
}
