//! Router facade over the radix tree.

use http::Method;

use crate::error::RouteError;
use crate::node::Node;
use crate::RouteMatch;

/// Result of looking up a method and path.
#[derive(Debug)]
pub enum Lookup<'a, T> {
    /// A registration exists for the method and path.
    Found(RouteMatch<'a, T>),
    /// The path exists but not for this method.
    MethodNotAllowed(Vec<Method>),
    /// No template matches the path.
    NotFound,
}

/// A radix tree router mapping `(method, template)` pairs to values.
///
/// Match priority is static, then parameter, then wildcard, so `/things/latest`
/// beats `/things/:id` regardless of registration order.
#[derive(Debug, Clone)]
pub struct Router<T> {
    root: Node<T>,
    route_count: usize,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            route_count: 0,
        }
    }

    /// Registers `value` under `method` and `path`.
    ///
    /// # Errors
    ///
    /// Fails when the pair is already registered, when a parameter name
    /// clashes with an existing template at the same position, or when the
    /// template is malformed.
    pub fn route(&mut self, method: Method, path: &str, value: T) -> Result<(), RouteError> {
        self.root.insert(path, method, value)?;
        self.route_count += 1;
        Ok(())
    }

    /// Matches a method and path, returning the value and params.
    #[must_use]
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, T>> {
        let (methods, params) = self.root.match_path(path)?;
        let value = methods.get(method)?;
        Some(RouteMatch::new(value, params))
    }

    /// Matches a method and path, distinguishing 404 from 405.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Lookup<'_, T> {
        match self.root.match_path(path) {
            None => Lookup::NotFound,
            Some((methods, params)) => match methods.get(method) {
                Some(value) => Lookup::Found(RouteMatch::new(value, params)),
                None => Lookup::MethodNotAllowed(methods.allowed_methods()),
            },
        }
    }

    /// Number of registered `(method, template)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}
