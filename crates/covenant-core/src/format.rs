//! Client-facing rendering of validation issues.
//!
//! [`format_issues`] folds a flat issue list into a tree that follows the
//! shape of the validated value. Each leaf is the list of messages reported
//! at that path:
//!
//! ```
//! use covenant_core::{format_issues, Issue, IssueCode};
//! use serde_json::json;
//!
//! let issues = vec![
//!     Issue::new(IssueCode::InvalidType, "Required").at(["data", "0", "name"]),
//!     Issue::new(IssueCode::InvalidType, "Expected number, received string").at(["data", "0", "other"]),
//! ];
//!
//! let tree = serde_json::to_value(format_issues(&issues)).unwrap();
//! assert_eq!(
//!     tree,
//!     json!({"data": {"0": {"name": ["Required"], "other": ["Expected number, received string"]}}})
//! );
//! ```

use indexmap::IndexMap;
use serde::Serialize;

use crate::schema::Issue;

/// Key holding the messages of a node that also has children.
pub const NODE_ERRORS_KEY: &str = "_errors";

/// A formatted issue tree.
///
/// Serializes as a JSON array for [`FormattedIssues::Messages`] and as a JSON
/// object for [`FormattedIssues::Nested`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormattedIssues {
    /// Messages reported at a leaf path, in report order.
    Messages(Vec<String>),
    /// Child nodes keyed by path segment, in first-occurrence order.
    Nested(IndexMap<String, FormattedIssues>),
}

impl FormattedIssues {
    /// Looks up the subtree at `path`.
    #[must_use]
    pub fn get(&self, path: &[&str]) -> Option<&FormattedIssues> {
        let Some((head, rest)) = path.split_first() else {
            return Some(self);
        };
        match self {
            Self::Nested(children) => children.get(*head)?.get(rest),
            Self::Messages(_) => None,
        }
    }

    /// Messages stored directly at this node.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        match self {
            Self::Messages(messages) => messages,
            Self::Nested(children) => match children.get(NODE_ERRORS_KEY) {
                Some(Self::Messages(messages)) => messages,
                _ => &[],
            },
        }
    }

    /// Converts into a JSON value.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Self::Messages(messages) => serde_json::Value::from(messages.clone()),
            Self::Nested(children) => serde_json::Value::Object(
                children
                    .iter()
                    .map(|(key, child)| (key.clone(), child.to_value()))
                    .collect(),
            ),
        }
    }
}

#[derive(Default)]
struct Node {
    messages: Vec<String>,
    children: IndexMap<String, Node>,
}

impl Node {
    fn insert(&mut self, path: &[String], message: &str) {
        match path.split_first() {
            None => self.messages.push(message.to_string()),
            Some((head, rest)) => self
                .children
                .entry(head.clone())
                .or_default()
                .insert(rest, message),
        }
    }

    fn finish(self) -> FormattedIssues {
        if self.children.is_empty() {
            return FormattedIssues::Messages(self.messages);
        }
        let mut nested = IndexMap::with_capacity(self.children.len() + 1);
        if !self.messages.is_empty() {
            nested.insert(
                NODE_ERRORS_KEY.to_string(),
                FormattedIssues::Messages(self.messages),
            );
        }
        for (key, child) in self.children {
            nested.insert(key, child.finish());
        }
        FormattedIssues::Nested(nested)
    }
}

/// Builds the issue tree for `issues`.
///
/// Identical input always yields an identical tree. An empty list yields an
/// empty object.
#[must_use]
pub fn format_issues(issues: &[Issue]) -> FormattedIssues {
    if issues.is_empty() {
        return FormattedIssues::Nested(IndexMap::new());
    }
    let mut root = Node::default();
    for issue in issues {
        root.insert(&issue.path, &issue.message);
    }
    root.finish()
}
