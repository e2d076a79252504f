//! # Covenant Router
//!
//! Radix tree (compressed trie) path matcher backing the covenant host
//! router. Each registered template maps HTTP methods to an arbitrary value,
//! typically an index into a table of endpoint callbacks.
//!
//! ## Features
//!
//! - **Template syntax**: `:param` and `{param}` segments, trailing `*rest` wildcards
//! - **Priority**: static segments win over params, params win over wildcards
//! - **Conflict detection**: duplicate method/path pairs and clashing param
//!   names are reported as [`RouteError`] instead of silently overwritten
//! - **Decoded params**: percent-encoded segment values are decoded on match
//!
//! ## Example
//!
//! ```rust
//! use covenant_router::Router;
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.route(Method::GET, "/things/:id", "getThing").unwrap();
//! router.route(Method::DELETE, "/things/:id", "deleteThing").unwrap();
//!
//! let found = router.match_route(&Method::GET, "/things/42").unwrap();
//! assert_eq!(*found.value, "getThing");
//! assert_eq!(found.params.get("id"), Some("42"));
//! ```
//!
//! ## Layout
//!
//! ```text
//!              (root)
//!                │
//!            "things"
//!          [POST create]
//!                │
//!              ":id"
//!      [GET get, DELETE delete]
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod method_router;
mod node;
mod params;
mod router;

pub use error::RouteError;
pub use method_router::MethodRouter;
pub use node::{Node, SegmentKind};
pub use params::Params;
pub use router::{Lookup, Router};

/// A matched route: the registered value and the extracted path parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a, T> {
    /// Value registered for the matched method and template
    pub value: &'a T,
    /// Extracted, percent-decoded path parameters
    pub params: Params,
}

impl<'a, T> RouteMatch<'a, T> {
    /// Creates a new route match.
    #[must_use]
    pub fn new(value: &'a T, params: Params) -> Self {
        Self { value, params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_colon_and_brace_templates_are_equivalent() {
        let mut router = Router::new();
        router.route(Method::GET, "/things/:id", 1).unwrap();
        router.route(Method::PUT, "/things/{id}", 2).unwrap();

        let get = router.match_route(&Method::GET, "/things/7").unwrap();
        assert_eq!(*get.value, 1);
        let put = router.match_route(&Method::PUT, "/things/7").unwrap();
        assert_eq!(*put.value, 2);
        assert_eq!(put.params.get("id"), Some("7"));
    }

    #[test]
    fn test_method_not_registered() {
        let mut router = Router::new();
        router.route(Method::POST, "/things", "createThing").unwrap();

        assert!(router.match_route(&Method::GET, "/things").is_none());
        assert!(router.match_route(&Method::POST, "/things").is_some());
    }

    #[test]
    fn test_nested_prefix_params() {
        let mut router = Router::new();
        router
            .route(Method::GET, "/orgs/:org/things/:id", "getOrgThing")
            .unwrap();

        let m = router.match_route(&Method::GET, "/orgs/acme/things/9").unwrap();
        assert_eq!(m.params.get("org"), Some("acme"));
        assert_eq!(m.params.get("id"), Some("9"));
    }
}
