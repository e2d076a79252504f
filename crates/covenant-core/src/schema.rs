//! Structural schemas and the validation capability.
//!
//! Every input surface and response body in a [`Contract`](crate::Contract) is
//! described by something implementing [`SchemaValidator`]. The built-in
//! [`Schema`] enum covers the JSON shapes a typical HTTP API needs; any other
//! validator (a generated one, a JSON Schema engine) can be plugged in instead.
//!
//! Validation never stops at the first problem: all [`Issue`]s found in a value
//! are reported together, each with the path that leads to it.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Machine-readable classification of an [`Issue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    /// The value has the wrong JSON type, or a required property is absent.
    InvalidType,
    /// Below a length, size or numeric lower bound.
    TooSmall,
    /// Above a length, size or numeric upper bound.
    TooBig,
    /// A string does not match its pattern.
    InvalidString,
    /// A value differs from the single literal it must equal.
    InvalidLiteral,
    /// A string is not one of the allowed values.
    InvalidEnumValue,
    /// A strict object carries properties it does not declare.
    UnrecognizedKeys,
    /// The payload could not be parsed as JSON.
    InvalidJson,
    /// Raised by a custom validator.
    Custom,
}

impl IssueCode {
    /// The snake_case wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidType => "invalid_type",
            Self::TooSmall => "too_small",
            Self::TooBig => "too_big",
            Self::InvalidString => "invalid_string",
            Self::InvalidLiteral => "invalid_literal",
            Self::InvalidEnumValue => "invalid_enum_value",
            Self::UnrecognizedKeys => "unrecognized_keys",
            Self::InvalidJson => "invalid_json",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation failure.
///
/// `path` walks from the validated root to the offending value; array indices
/// are rendered as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Location of the failing value
    pub path: Vec<String>,
    /// Human-readable explanation
    pub message: String,
    /// Classification
    pub code: IssueCode,
}

impl Issue {
    /// Creates an issue at the root of the validated value.
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
            code,
        }
    }

    /// Creates a [`IssueCode::Custom`] issue.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::new(IssueCode::Custom, message)
    }

    /// Sets the path of this issue.
    #[must_use]
    pub fn at<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} ({})", self.message, self.code)
        } else {
            write!(f, "{}: {} ({})", self.path.join("."), self.message, self.code)
        }
    }
}

/// The capability every schema exposes.
///
/// `validate` is pure: the same input always yields the same result. On
/// success it returns the parsed value, which may differ from the input
/// (the built-in [`Schema`] strips undeclared object properties, for example).
pub trait SchemaValidator: Send + Sync {
    /// Validates `value`, returning the parsed value or every issue found.
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>>;

    /// Top-level property names, when the schema describes an object.
    ///
    /// Used to check that path template parameters are covered by a
    /// path-params schema. `None` means "unknown", which skips that check.
    fn property_names(&self) -> Option<Vec<String>> {
        None
    }

    /// Top-level properties declared as arrays.
    ///
    /// The query normalizer promotes a single value for these keys into a
    /// one-element sequence.
    fn array_properties(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A validator shared between an operation and its in-flight requests.
pub type SharedSchema = Arc<dyn SchemaValidator>;

impl<V: SchemaValidator + ?Sized> SchemaValidator for Arc<V> {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        (**self).validate(value)
    }

    fn property_names(&self) -> Option<Vec<String>> {
        (**self).property_names()
    }

    fn array_properties(&self) -> Vec<String> {
        (**self).array_properties()
    }
}

/// A compiled regular expression used by string schemas.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compiles a pattern.
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Regex::new(source).map(Self)
    }

    /// The pattern source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Self::new(&source).map_err(serde::de::Error::custom)
    }
}

/// How an object schema treats properties it does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownKeys {
    /// Drop them from the parsed value.
    #[default]
    Strip,
    /// Report them as an issue.
    Strict,
    /// Keep them untouched.
    Passthrough,
}

/// The built-in structural schema.
///
/// Object properties are required unless wrapped with [`Schema::optional`].
///
/// ```
/// use covenant_core::{Schema, SchemaValidator};
/// use serde_json::json;
///
/// let schema = Schema::object()
///     .field("name", Schema::string().min_length(1))
///     .field("other", Schema::number())
///     .field("note", Schema::string().optional());
///
/// assert!(schema.validate(&json!({"name": "a", "other": 1})).is_ok());
///
/// let issues = schema.validate(&json!({"name": ""})).unwrap_err();
/// assert_eq!(issues.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schema {
    /// A string with optional length bounds and pattern.
    String {
        /// Minimum length in characters
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        /// Maximum length in characters
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
        /// Pattern the whole value must match somewhere
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<Pattern>,
    },

    /// A whole number.
    Integer {
        /// Inclusive lower bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        /// Inclusive upper bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },

    /// Any JSON number.
    Number {
        /// Inclusive lower bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        /// Inclusive upper bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },

    /// `true` or `false`.
    Boolean,

    /// Exactly this value.
    Literal {
        /// The only accepted value
        value: Value,
    },

    /// One of a fixed set of strings.
    Enum {
        /// Accepted values
        values: Vec<String>,
    },

    /// A sequence of items sharing one schema.
    Array {
        /// Schema applied to every element
        items: Box<Schema>,
        /// Minimum element count
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        /// Maximum element count
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },

    /// A mapping with declared properties, checked in declaration order.
    Object {
        /// Declared properties
        #[serde(default)]
        properties: IndexMap<String, Schema>,
        /// Treatment of undeclared properties
        #[serde(default)]
        unknown_keys: UnknownKeys,
    },

    /// Accepts an absent or null value, otherwise defers to `inner`.
    Optional {
        /// Schema for present values
        inner: Box<Schema>,
    },

    /// Accepts null, otherwise defers to `inner`.
    Nullable {
        /// Schema for non-null values
        inner: Box<Schema>,
    },

    /// Anything, including absence.
    Any,

    /// Only `null`.
    Null,
}

impl Schema {
    /// A string schema.
    #[must_use]
    pub fn string() -> Self {
        Self::String {
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    /// An integer schema.
    #[must_use]
    pub fn integer() -> Self {
        Self::Integer {
            minimum: None,
            maximum: None,
        }
    }

    /// A number schema.
    #[must_use]
    pub fn number() -> Self {
        Self::Number {
            minimum: None,
            maximum: None,
        }
    }

    /// A boolean schema.
    #[must_use]
    pub fn boolean() -> Self {
        Self::Boolean
    }

    /// A schema accepting exactly `value`.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    /// A schema accepting one of `values`.
    #[must_use]
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// An array whose elements follow `items`.
    #[must_use]
    pub fn array(items: Schema) -> Self {
        Self::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    /// An object with no declared properties yet.
    #[must_use]
    pub fn object() -> Self {
        Self::Object {
            properties: IndexMap::new(),
            unknown_keys: UnknownKeys::Strip,
        }
    }

    /// A schema accepting any value.
    #[must_use]
    pub fn any() -> Self {
        Self::Any
    }

    /// A schema accepting only `null`.
    #[must_use]
    pub fn null() -> Self {
        Self::Null
    }

    /// Declares a property on an object schema.
    ///
    /// Has no effect on other variants.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, schema: Schema) -> Self {
        if let Self::Object { properties, .. } = &mut self {
            properties.insert(name.into(), schema);
        }
        self
    }

    /// Rejects undeclared properties on an object schema.
    #[must_use]
    pub fn strict(self) -> Self {
        self.with_unknown_keys(UnknownKeys::Strict)
    }

    /// Keeps undeclared properties on an object schema.
    #[must_use]
    pub fn passthrough(self) -> Self {
        self.with_unknown_keys(UnknownKeys::Passthrough)
    }

    fn with_unknown_keys(mut self, mode: UnknownKeys) -> Self {
        if let Self::Object { unknown_keys, .. } = &mut self {
            *unknown_keys = mode;
        }
        self
    }

    /// Wraps this schema so absence and `null` are accepted.
    #[must_use]
    pub fn optional(self) -> Self {
        Self::Optional {
            inner: Box::new(self),
        }
    }

    /// Wraps this schema so `null` is accepted.
    #[must_use]
    pub fn nullable(self) -> Self {
        Self::Nullable {
            inner: Box::new(self),
        }
    }

    /// Sets the minimum length of a string schema.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        if let Self::String { min_length, .. } = &mut self {
            *min_length = Some(len);
        }
        self
    }

    /// Sets the maximum length of a string schema.
    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        if let Self::String { max_length, .. } = &mut self {
            *max_length = Some(len);
        }
        self
    }

    /// Sets the pattern of a string schema.
    #[must_use]
    pub fn pattern(mut self, compiled: Pattern) -> Self {
        if let Self::String { pattern, .. } = &mut self {
            *pattern = Some(compiled);
        }
        self
    }

    /// Sets the lower bound of an integer schema.
    #[must_use]
    pub fn minimum_int(mut self, bound: i64) -> Self {
        if let Self::Integer { minimum, .. } = &mut self {
            *minimum = Some(bound);
        }
        self
    }

    /// Sets the upper bound of an integer schema.
    #[must_use]
    pub fn maximum_int(mut self, bound: i64) -> Self {
        if let Self::Integer { maximum, .. } = &mut self {
            *maximum = Some(bound);
        }
        self
    }

    /// Sets the lower bound of a number schema.
    #[must_use]
    pub fn minimum_number(mut self, bound: f64) -> Self {
        if let Self::Number { minimum, .. } = &mut self {
            *minimum = Some(bound);
        }
        self
    }

    /// Sets the upper bound of a number schema.
    #[must_use]
    pub fn maximum_number(mut self, bound: f64) -> Self {
        if let Self::Number { maximum, .. } = &mut self {
            *maximum = Some(bound);
        }
        self
    }

    /// Sets the minimum element count of an array schema.
    #[must_use]
    pub fn min_items(mut self, count: usize) -> Self {
        if let Self::Array { min_items, .. } = &mut self {
            *min_items = Some(count);
        }
        self
    }

    /// Sets the maximum element count of an array schema.
    #[must_use]
    pub fn max_items(mut self, count: usize) -> Self {
        if let Self::Array { max_items, .. } = &mut self {
            *max_items = Some(count);
        }
        self
    }

    /// Strips `Optional` and `Nullable` wrappers.
    #[must_use]
    pub fn unwrapped(&self) -> &Schema {
        match self {
            Self::Optional { inner } | Self::Nullable { inner } => inner.unwrapped(),
            other => other,
        }
    }

    fn accepts_missing(&self) -> bool {
        match self {
            Self::Optional { .. } | Self::Any => true,
            Self::Nullable { inner } => inner.accepts_missing(),
            _ => false,
        }
    }

    fn check(&self, value: &Value, path: &mut Vec<String>, issues: &mut Vec<Issue>) -> Value {
        match self {
            Self::Any => value.clone(),

            Self::Optional { inner } | Self::Nullable { inner } => {
                if value.is_null() {
                    Value::Null
                } else {
                    inner.check(value, path, issues)
                }
            }

            Self::Null => {
                if !value.is_null() {
                    issues.push(type_issue("null", value, path));
                }
                Value::Null
            }

            Self::Boolean => {
                if !value.is_boolean() {
                    issues.push(type_issue("boolean", value, path));
                }
                value.clone()
            }

            Self::Literal { value: expected } => {
                if value != expected {
                    issues.push(
                        Issue::new(
                            IssueCode::InvalidLiteral,
                            format!("Invalid literal value, expected {expected}"),
                        )
                        .at(path.clone()),
                    );
                }
                value.clone()
            }

            Self::Enum { values } => {
                match value.as_str() {
                    None => issues.push(type_issue("string", value, path)),
                    Some(s) if !values.iter().any(|v| v == s) => {
                        let expected = values
                            .iter()
                            .map(|v| format!("'{v}'"))
                            .collect::<Vec<_>>()
                            .join(" | ");
                        issues.push(
                            Issue::new(
                                IssueCode::InvalidEnumValue,
                                format!("Invalid enum value. Expected {expected}, received '{s}'"),
                            )
                            .at(path.clone()),
                        );
                    }
                    Some(_) => {}
                }
                value.clone()
            }

            Self::String {
                min_length,
                max_length,
                pattern,
            } => {
                let Some(s) = value.as_str() else {
                    issues.push(type_issue("string", value, path));
                    return value.clone();
                };
                let len = s.chars().count();
                if let Some(min) = min_length.filter(|min| len < *min) {
                    issues.push(
                        Issue::new(
                            IssueCode::TooSmall,
                            format!("String must contain at least {min} character(s)"),
                        )
                        .at(path.clone()),
                    );
                }
                if let Some(max) = max_length.filter(|max| len > *max) {
                    issues.push(
                        Issue::new(
                            IssueCode::TooBig,
                            format!("String must contain at most {max} character(s)"),
                        )
                        .at(path.clone()),
                    );
                }
                if let Some(pattern) = pattern.as_ref().filter(|p| !p.is_match(s)) {
                    issues.push(
                        Issue::new(
                            IssueCode::InvalidString,
                            format!("String must match pattern {}", pattern.as_str()),
                        )
                        .at(path.clone()),
                    );
                }
                value.clone()
            }

            Self::Integer { minimum, maximum } => {
                let Some(n) = value.as_f64() else {
                    issues.push(type_issue("integer", value, path));
                    return value.clone();
                };
                if value.as_i64().is_none() && value.as_u64().is_none() {
                    issues.push(
                        Issue::new(IssueCode::InvalidType, "Expected integer, received float")
                            .at(path.clone()),
                    );
                    return value.clone();
                }
                check_bounds(n, minimum.map(|m| m as f64), maximum.map(|m| m as f64), path, issues);
                value.clone()
            }

            Self::Number { minimum, maximum } => {
                match value.as_f64() {
                    Some(n) => check_bounds(n, *minimum, *maximum, path, issues),
                    None => issues.push(type_issue("number", value, path)),
                }
                value.clone()
            }

            Self::Array {
                items,
                min_items,
                max_items,
            } => {
                let Some(elements) = value.as_array() else {
                    issues.push(type_issue("array", value, path));
                    return value.clone();
                };
                if let Some(min) = min_items.filter(|min| elements.len() < *min) {
                    issues.push(
                        Issue::new(
                            IssueCode::TooSmall,
                            format!("Array must contain at least {min} element(s)"),
                        )
                        .at(path.clone()),
                    );
                }
                if let Some(max) = max_items.filter(|max| elements.len() > *max) {
                    issues.push(
                        Issue::new(
                            IssueCode::TooBig,
                            format!("Array must contain at most {max} element(s)"),
                        )
                        .at(path.clone()),
                    );
                }
                let parsed = elements
                    .iter()
                    .enumerate()
                    .map(|(idx, element)| {
                        path.push(idx.to_string());
                        let out = items.check(element, path, issues);
                        path.pop();
                        out
                    })
                    .collect();
                Value::Array(parsed)
            }

            Self::Object {
                properties,
                unknown_keys,
            } => {
                let Some(object) = value.as_object() else {
                    issues.push(type_issue("object", value, path));
                    return value.clone();
                };
                let mut parsed = Map::new();
                for (key, schema) in properties {
                    path.push(key.clone());
                    match object.get(key) {
                        Some(present) => {
                            let out = schema.check(present, path, issues);
                            parsed.insert(key.clone(), out);
                        }
                        None if schema.accepts_missing() => {}
                        None => issues.push(
                            Issue::new(IssueCode::InvalidType, "Required").at(path.clone()),
                        ),
                    }
                    path.pop();
                }

                let unknown: Vec<&String> = object
                    .keys()
                    .filter(|key| !properties.contains_key(key.as_str()))
                    .collect();
                match unknown_keys {
                    UnknownKeys::Strip => {}
                    UnknownKeys::Passthrough => {
                        for key in unknown {
                            parsed.insert(key.clone(), object[key.as_str()].clone());
                        }
                    }
                    UnknownKeys::Strict if !unknown.is_empty() => {
                        let names = unknown
                            .iter()
                            .map(|k| format!("'{k}'"))
                            .collect::<Vec<_>>()
                            .join(", ");
                        issues.push(
                            Issue::new(
                                IssueCode::UnrecognizedKeys,
                                format!("Unrecognized key(s) in object: {names}"),
                            )
                            .at(path.clone()),
                        );
                    }
                    UnknownKeys::Strict => {}
                }
                Value::Object(parsed)
            }
        }
    }
}

impl SchemaValidator for Schema {
    fn validate(&self, value: &Value) -> Result<Value, Vec<Issue>> {
        let mut issues = Vec::new();
        let mut path = Vec::new();
        let parsed = self.check(value, &mut path, &mut issues);
        if issues.is_empty() {
            Ok(parsed)
        } else {
            Err(issues)
        }
    }

    fn property_names(&self) -> Option<Vec<String>> {
        match self.unwrapped() {
            Self::Object { properties, .. } => Some(properties.keys().cloned().collect()),
            _ => None,
        }
    }

    fn array_properties(&self) -> Vec<String> {
        match self.unwrapped() {
            Self::Object { properties, .. } => properties
                .iter()
                .filter(|(_, schema)| matches!(schema.unwrapped(), Self::Array { .. }))
                .map(|(key, _)| key.clone())
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_issue(expected: &str, value: &Value, path: &[String]) -> Issue {
    Issue::new(
        IssueCode::InvalidType,
        format!("Expected {expected}, received {}", type_name(value)),
    )
    .at(path.to_vec())
}

fn check_bounds(
    n: f64,
    minimum: Option<f64>,
    maximum: Option<f64>,
    path: &[String],
    issues: &mut Vec<Issue>,
) {
    if let Some(min) = minimum.filter(|min| n < *min) {
        issues.push(
            Issue::new(
                IssueCode::TooSmall,
                format!("Number must be greater than or equal to {min}"),
            )
            .at(path.to_vec()),
        );
    }
    if let Some(max) = maximum.filter(|max| n > *max) {
        issues.push(
            Issue::new(
                IssueCode::TooBig,
                format!("Number must be less than or equal to {max}"),
            )
            .at(path.to_vec()),
        );
    }
}
