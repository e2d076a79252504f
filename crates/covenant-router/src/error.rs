//! Route registration errors.

use http::Method;
use thiserror::Error;

/// Errors raised while inserting a route template.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    /// The same method is already registered for an equivalent template.
    #[error("route {method} {path} is already registered")]
    Conflict {
        /// Method of the clashing registration
        method: Method,
        /// Template of the clashing registration
        path: String,
    },

    /// Two templates use different parameter names at the same position.
    #[error("parameter `{new}` in {path} clashes with existing parameter `{existing}`")]
    ParamNameClash {
        /// Template being inserted
        path: String,
        /// Name already present in the tree
        existing: String,
        /// Name requested by the new template
        new: String,
    },

    /// The template itself is malformed.
    #[error("invalid route template {path}: {reason}")]
    InvalidTemplate {
        /// Offending template
        path: String,
        /// What is wrong with it
        reason: &'static str,
    },
}
