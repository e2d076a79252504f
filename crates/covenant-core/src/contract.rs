//! Declarative API contracts.
//!
//! An [`Operation`] describes one endpoint: method, path template and the
//! schemas of its four input surfaces and of each response status. A
//! [`Contract`] is an ordered tree of named operations and nested contracts.
//! Nested contracts may carry a path prefix that applies to everything below
//! them.
//!
//! Both are immutable once built.
//!
//! ```
//! use covenant_core::{Contract, Operation, Schema};
//!
//! let things = Contract::builder()
//!     .path_prefix("/things")
//!     .operation("list", Operation::get("/").response(200, Schema::array(Schema::string())).build())
//!     .operation(
//!         "remove",
//!         Operation::delete("/:id")
//!             .path_params(Schema::object().field("id", Schema::string()))
//!             .response_empty(200)
//!             .build(),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let api = Contract::builder().router("things", things).build().unwrap();
//! let routes: Vec<_> = api
//!     .operations()
//!     .iter()
//!     .map(|entry| (entry.operation_id(), entry.path().to_string()))
//!     .collect();
//!
//! assert_eq!(
//!     routes,
//!     vec![
//!         ("things.list".to_string(), "/things".to_string()),
//!         ("things.remove".to_string(), "/things/:id".to_string()),
//!     ]
//! );
//! ```

use std::fmt;
use std::sync::Arc;

use covenant_router::SegmentKind;
use http::{Method, StatusCode};
use indexmap::IndexMap;

use crate::error::ContractError;
use crate::schema::{SchemaValidator, SharedSchema};

/// One endpoint of a contract.
#[derive(Clone)]
pub struct Operation {
    method: Method,
    path: String,
    summary: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    path_params: Option<SharedSchema>,
    query: Option<SharedSchema>,
    headers: Option<SharedSchema>,
    body: Option<SharedSchema>,
    responses: IndexMap<u16, Option<SharedSchema>>,
}

impl Operation {
    /// Starts an operation with an arbitrary method.
    pub fn builder(method: Method, path: impl Into<String>) -> OperationBuilder {
        OperationBuilder {
            operation: Self {
                method,
                path: path.into(),
                summary: None,
                description: None,
                tags: Vec::new(),
                path_params: None,
                query: None,
                headers: None,
                body: None,
                responses: IndexMap::new(),
            },
        }
    }

    /// Starts a `GET` operation.
    pub fn get(path: impl Into<String>) -> OperationBuilder {
        Self::builder(Method::GET, path)
    }

    /// Starts a `POST` operation.
    pub fn post(path: impl Into<String>) -> OperationBuilder {
        Self::builder(Method::POST, path)
    }

    /// Starts a `PUT` operation.
    pub fn put(path: impl Into<String>) -> OperationBuilder {
        Self::builder(Method::PUT, path)
    }

    /// Starts a `PATCH` operation.
    pub fn patch(path: impl Into<String>) -> OperationBuilder {
        Self::builder(Method::PATCH, path)
    }

    /// Starts a `DELETE` operation.
    pub fn delete(path: impl Into<String>) -> OperationBuilder {
        Self::builder(Method::DELETE, path)
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path template relative to any enclosing prefix.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Short summary.
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Long description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Path params schema.
    #[must_use]
    pub fn path_params_schema(&self) -> Option<&dyn SchemaValidator> {
        self.path_params.as_deref()
    }

    /// Query schema.
    #[must_use]
    pub fn query_schema(&self) -> Option<&dyn SchemaValidator> {
        self.query.as_deref()
    }

    /// Headers schema.
    #[must_use]
    pub fn headers_schema(&self) -> Option<&dyn SchemaValidator> {
        self.headers.as_deref()
    }

    /// Body schema.
    #[must_use]
    pub fn body_schema(&self) -> Option<&dyn SchemaValidator> {
        self.body.as_deref()
    }

    /// Declared response statuses in declaration order.
    pub fn response_statuses(&self) -> impl Iterator<Item = u16> + '_ {
        self.responses.keys().copied()
    }

    /// True when `status` appears in the response table.
    #[must_use]
    pub fn declares_status(&self, status: StatusCode) -> bool {
        self.responses.contains_key(&status.as_u16())
    }

    /// Body schema for `status`.
    ///
    /// `None` both when the status is undeclared and when it is declared
    /// without a body; neither case is validated.
    #[must_use]
    pub fn response_schema(&self, status: StatusCode) -> Option<&dyn SchemaValidator> {
        self.responses
            .get(&status.as_u16())
            .and_then(|schema| schema.as_deref())
    }

    /// Parameter names appearing in the path template.
    #[must_use]
    pub fn template_params(&self) -> Vec<String> {
        template_params(&self.path)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("summary", &self.summary)
            .field("path_params", &self.path_params.is_some())
            .field("query", &self.query.is_some())
            .field("headers", &self.headers.is_some())
            .field("body", &self.body.is_some())
            .field(
                "responses",
                &self
                    .responses
                    .iter()
                    .map(|(status, schema)| (*status, schema.is_some()))
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Builder for [`Operation`].
#[must_use]
pub struct OperationBuilder {
    operation: Operation,
}

impl OperationBuilder {
    /// Sets the summary.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.operation.summary = Some(summary.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.operation.description = Some(description.into());
        self
    }

    /// Adds a tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.operation.tags.push(tag.into());
        self
    }

    /// Validates path params against `schema`.
    pub fn path_params(mut self, schema: impl SchemaValidator + 'static) -> Self {
        self.operation.path_params = Some(Arc::new(schema) as SharedSchema);
        self
    }

    /// Validates the query against `schema`.
    pub fn query(mut self, schema: impl SchemaValidator + 'static) -> Self {
        self.operation.query = Some(Arc::new(schema) as SharedSchema);
        self
    }

    /// Validates headers against `schema`. Header names are lower case.
    pub fn headers(mut self, schema: impl SchemaValidator + 'static) -> Self {
        self.operation.headers = Some(Arc::new(schema) as SharedSchema);
        self
    }

    /// Validates the body against `schema`.
    pub fn body(mut self, schema: impl SchemaValidator + 'static) -> Self {
        self.operation.body = Some(Arc::new(schema) as SharedSchema);
        self
    }

    /// Declares `status` with a body schema.
    pub fn response(mut self, status: u16, schema: impl SchemaValidator + 'static) -> Self {
        self.operation
            .responses
            .insert(status, Some(Arc::new(schema) as SharedSchema));
        self
    }

    /// Declares `status` with no body.
    pub fn response_empty(mut self, status: u16) -> Self {
        self.operation.responses.insert(status, None);
        self
    }

    /// Finishes the operation.
    #[must_use]
    pub fn build(self) -> Operation {
        self.operation
    }
}

/// An entry of a contract level.
#[derive(Debug, Clone)]
pub enum ContractNode {
    /// A leaf operation.
    Operation(Operation),
    /// A nested contract.
    Router(Contract),
}

impl ContractNode {
    pub(crate) const fn kind(&self) -> &'static str {
        match self {
            Self::Operation(_) => "an operation",
            Self::Router(_) => "a router",
        }
    }
}

/// An ordered, possibly nested set of named operations.
#[derive(Debug, Clone, Default)]
pub struct Contract {
    path_prefix: String,
    entries: IndexMap<String, ContractNode>,
}

/// A leaf operation located within a contract tree.
#[derive(Debug, Clone)]
pub struct OperationEntry<'a> {
    key: Vec<&'a str>,
    path: String,
    operation: &'a Operation,
}

impl<'a> OperationEntry<'a> {
    /// Names from the root to this operation.
    #[must_use]
    pub fn key(&self) -> &[&'a str] {
        &self.key
    }

    /// Dotted name, e.g. `things.getThing`.
    #[must_use]
    pub fn operation_id(&self) -> String {
        self.key.join(".")
    }

    /// Full path template including every enclosing prefix.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The operation.
    #[must_use]
    pub fn operation(&self) -> &'a Operation {
        self.operation
    }
}

impl Contract {
    /// Starts building a contract.
    pub fn builder() -> ContractBuilder {
        ContractBuilder {
            path_prefix: String::new(),
            entries: Vec::new(),
        }
    }

    /// Prefix applied to every path below this level.
    #[must_use]
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    /// Entries of this level in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ContractNode)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Looks up an entry of this level.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&ContractNode> {
        self.entries.get(name)
    }

    /// Number of entries at this level.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when this level has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every leaf operation in declaration order, depth first.
    #[must_use]
    pub fn operations(&self) -> Vec<OperationEntry<'_>> {
        let mut out = Vec::new();
        self.collect("", &mut Vec::new(), &mut out);
        out
    }

    /// Finds a leaf by dotted operation id.
    #[must_use]
    pub fn find(&self, operation_id: &str) -> Option<&Operation> {
        let mut level = self;
        let mut names = operation_id.split('.').peekable();
        while let Some(name) = names.next() {
            match (level.entries.get(name)?, names.peek()) {
                (ContractNode::Operation(op), None) => return Some(op),
                (ContractNode::Router(nested), Some(_)) => level = nested,
                _ => return None,
            }
        }
        None
    }

    fn collect<'a>(&'a self, prefix: &str, key: &mut Vec<&'a str>, out: &mut Vec<OperationEntry<'a>>) {
        let prefix = join_paths(prefix, &self.path_prefix);
        for (name, node) in &self.entries {
            key.push(name);
            match node {
                ContractNode::Operation(operation) => out.push(OperationEntry {
                    key: key.clone(),
                    path: join_paths(&prefix, &operation.path),
                    operation,
                }),
                ContractNode::Router(nested) => nested.collect(&prefix, key, out),
            }
            key.pop();
        }
    }

    fn check(&self) -> Result<(), ContractError> {
        for entry in self.operations() {
            let operation = entry.operation();
            for status in operation.response_statuses() {
                if StatusCode::from_u16(status).is_err() {
                    return Err(ContractError::InvalidStatus {
                        operation: entry.operation_id(),
                        status,
                    });
                }
            }
            let declared = operation
                .path_params
                .as_ref()
                .and_then(|schema| schema.property_names());
            if let Some(declared) = declared {
                if let Some(param) = template_params(entry.path())
                    .into_iter()
                    .find(|param| !declared.contains(param))
                {
                    return Err(ContractError::UndeclaredPathParam {
                        operation: entry.operation_id(),
                        param,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`Contract`].
#[must_use]
pub struct ContractBuilder {
    path_prefix: String,
    entries: Vec<(String, ContractNode)>,
}

impl ContractBuilder {
    /// Prefix for every path in this contract.
    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    /// Adds an operation.
    pub fn operation(mut self, name: impl Into<String>, operation: Operation) -> Self {
        self.entries
            .push((name.into(), ContractNode::Operation(operation)));
        self
    }

    /// Adds a nested contract.
    pub fn router(mut self, name: impl Into<String>, contract: Contract) -> Self {
        self.entries.push((name.into(), ContractNode::Router(contract)));
        self
    }

    /// Finishes the contract.
    ///
    /// # Errors
    ///
    /// Fails on a repeated name within this level, on a response status
    /// outside the HTTP range, and on a template parameter that a declared
    /// path-params schema does not list.
    pub fn build(self) -> Result<Contract, ContractError> {
        let mut entries = IndexMap::with_capacity(self.entries.len());
        for (name, node) in self.entries {
            if entries.contains_key(&name) {
                return Err(ContractError::DuplicateName {
                    path_prefix: self.path_prefix.clone(),
                    name,
                });
            }
            entries.insert(name, node);
        }
        let contract = Contract {
            path_prefix: self.path_prefix,
            entries,
        };
        contract.check()?;
        Ok(contract)
    }
}

fn template_params(path: &str) -> Vec<String> {
    path.split('/')
        .filter_map(|segment| match SegmentKind::parse(segment) {
            SegmentKind::Param(name) | SegmentKind::Wildcard(name) => Some(name),
            SegmentKind::Static => None,
        })
        .collect()
}

fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{path}"),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}/{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn get_thing() -> Operation {
        Operation::get("/things/:id")
            .summary("Get a thing")
            .path_params(Schema::object().field("id", Schema::string()))
            .response(200, Schema::object().field("id", Schema::string()))
            .build()
    }

    // ==================== Operation Tests ====================

    #[test]
    fn test_operation_accessors() {
        let op = get_thing();
        assert_eq!(op.method(), Method::GET);
        assert_eq!(op.path(), "/things/:id");
        assert_eq!(op.summary(), Some("Get a thing"));
        assert!(op.path_params_schema().is_some());
        assert!(op.query_schema().is_none());
        assert_eq!(op.template_params(), vec!["id"]);
    }

    #[test]
    fn test_response_schema_lookup_merges_missing_and_empty() {
        let op = Operation::delete("/things/:id")
            .response_empty(200)
            .response(404, Schema::object().field("message", Schema::string()))
            .build();
        assert!(op.declares_status(StatusCode::OK));
        assert!(op.response_schema(StatusCode::OK).is_none());
        assert!(!op.declares_status(StatusCode::CREATED));
        assert!(op.response_schema(StatusCode::CREATED).is_none());
        assert!(op.response_schema(StatusCode::NOT_FOUND).is_some());
        assert_eq!(op.response_statuses().collect::<Vec<_>>(), vec![200, 404]);
    }

    // ==================== Contract Tests ====================

    #[test]
    fn test_operations_in_declaration_order() {
        let contract = Contract::builder()
            .operation("b", Operation::get("/b").build())
            .operation("a", Operation::get("/a").build())
            .build()
            .unwrap();
        let ids: Vec<_> = contract.operations().iter().map(OperationEntry::operation_id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_nested_prefixes_concatenate() {
        let inner = Contract::builder()
            .path_prefix("/v1/")
            .operation("getThing", get_thing())
            .build()
            .unwrap();
        let contract = Contract::builder()
            .path_prefix("/api")
            .router("v1", inner)
            .build()
            .unwrap();
        let ops = contract.operations();
        assert_eq!(ops[0].path(), "/api/v1/things/:id");
        assert_eq!(ops[0].key(), ["v1", "getThing"]);
        assert!(contract.find("v1.getThing").is_some());
        assert!(contract.find("v1").is_none());
        assert!(contract.find("getThing").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Contract::builder()
            .operation("getThing", get_thing())
            .operation("getThing", get_thing())
            .build()
            .unwrap_err();
        assert!(matches!(err, ContractError::DuplicateName { name, .. } if name == "getThing"));
    }

    #[test]
    fn test_duplicate_name_reports_path_prefix() {
        let err = Contract::builder()
            .path_prefix("/v1")
            .operation("getThing", get_thing())
            .router("getThing", Contract::builder().build().unwrap())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ContractError::DuplicateName {
                path_prefix: "/v1".to_string(),
                name: "getThing".to_string(),
            }
        );
        assert_eq!(
            err.to_string(),
            "duplicate contract entry `getThing` under path prefix `/v1`"
        );
    }

    #[test]
    fn test_undeclared_path_param_rejected() {
        let err = Contract::builder()
            .operation(
                "getThing",
                Operation::get("/things/:id")
                    .path_params(Schema::object().field("thingId", Schema::string()))
                    .build(),
            )
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ContractError::UndeclaredPathParam {
                operation: "getThing".into(),
                param: "id".into(),
            }
        );
    }

    #[test]
    fn test_prefix_params_checked_at_parent() {
        let inner = Contract::builder()
            .operation(
                "get",
                Operation::get("/things/:id")
                    .path_params(Schema::object().field("id", Schema::string()))
                    .build(),
            )
            .build()
            .unwrap();
        let err = Contract::builder()
            .path_prefix("/orgs/:org")
            .router("things", inner)
            .build()
            .unwrap_err();
        assert!(matches!(err, ContractError::UndeclaredPathParam { param, .. } if param == "org"));
    }

    #[test]
    fn test_params_unchecked_without_schema() {
        let contract = Contract::builder()
            .operation("get", Operation::get("/things/:id").build())
            .build();
        assert!(contract.is_ok());
    }

    #[test]
    fn test_invalid_status_rejected() {
        let err = Contract::builder()
            .operation("get", Operation::get("/x").response_empty(42).build())
            .build()
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidStatus { status: 42, .. }));
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("", ""), "/");
        assert_eq!(join_paths("", "/sync"), "/sync");
        assert_eq!(join_paths("/things/", "/"), "/things");
        assert_eq!(join_paths("/api", "things"), "/api/things");
    }
}
