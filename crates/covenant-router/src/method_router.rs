//! Per-template method table.

use http::Method;
use smallvec::SmallVec;

/// Maps HTTP methods to registered values for a single path template.
///
/// Unlike a fixed set of fields this table accepts extension methods too, and
/// keeps insertion order so [`MethodRouter::allowed_methods`] is stable.
///
/// # Example
///
/// ```rust
/// use covenant_router::MethodRouter;
/// use http::Method;
///
/// let mut methods = MethodRouter::new();
/// assert!(methods.insert(Method::GET, "getThing").is_none());
/// assert!(methods.insert(Method::DELETE, "deleteThing").is_none());
///
/// assert_eq!(methods.get(&Method::GET), Some(&"getThing"));
/// assert_eq!(methods.allowed_methods(), vec![Method::GET, Method::DELETE]);
/// ```
#[derive(Debug, Clone)]
pub struct MethodRouter<T> {
    entries: SmallVec<[(Method, T); 4]>,
}

impl<T> Default for MethodRouter<T> {
    fn default() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }
}

impl<T> MethodRouter<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` for `method`.
    ///
    /// Returns the rejected value when the method is already taken; the
    /// existing registration is left untouched.
    pub fn insert(&mut self, method: Method, value: T) -> Option<T> {
        if self.contains(&method) {
            return Some(value);
        }
        self.entries.push((method, value));
        None
    }

    /// Returns the value registered for `method`.
    ///
    /// A `HEAD` request falls back to the `GET` registration when no explicit
    /// `HEAD` route exists.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&T> {
        self.find(method).or_else(|| {
            if *method == Method::HEAD {
                self.find(&Method::GET)
            } else {
                None
            }
        })
    }

    /// Returns true if `method` has an explicit registration.
    #[must_use]
    pub fn contains(&self, method: &Method) -> bool {
        self.find(method).is_some()
    }

    /// Methods registered on this template, in registration order.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.entries.iter().map(|(m, _)| m.clone()).collect()
    }

    /// Number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no method is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, method: &Method) -> Option<&T> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, v)| v)
    }
}
