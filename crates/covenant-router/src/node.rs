//! Radix tree nodes.

use http::Method;

use crate::error::RouteError;
use crate::method_router::MethodRouter;
use crate::params::Params;

/// Kind of a template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Literal segment such as `things`
    Static,
    /// Named parameter written `:id` or `{id}`
    Param(String),
    /// Trailing catch-all written `*rest`
    Wildcard(String),
}

impl SegmentKind {
    /// Classifies one template segment.
    #[must_use]
    pub fn parse(segment: &str) -> Self {
        if let Some(name) = segment.strip_prefix(':') {
            Self::Param(name.to_string())
        } else if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Self::Param(name.to_string())
        } else if let Some(name) = segment.strip_prefix('*') {
            Self::Wildcard(name.to_string())
        } else {
            Self::Static
        }
    }
}

/// A node in the radix tree.
///
/// Static children are kept sorted for binary search. Each node has at most
/// one parameter child and one wildcard child.
#[derive(Debug, Clone)]
pub struct Node<T> {
    segment: String,
    kind: SegmentKind,
    methods: Option<MethodRouter<T>>,
    static_children: Vec<Node<T>>,
    param_child: Option<Box<Node<T>>>,
    wildcard_child: Option<Box<Node<T>>>,
}

impl<T> Node<T> {
    fn new(segment: impl Into<String>, kind: SegmentKind) -> Self {
        Self {
            segment: segment.into(),
            kind,
            methods: None,
            static_children: Vec::new(),
            param_child: None,
            wildcard_child: None,
        }
    }

    /// Creates the root of an empty tree.
    #[must_use]
    pub fn root() -> Self {
        Self::new("", SegmentKind::Static)
    }

    /// The literal segment text for this node.
    #[must_use]
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// The segment kind.
    #[must_use]
    pub fn kind(&self) -> &SegmentKind {
        &self.kind
    }

    /// Inserts `value` for `method` at `path`.
    pub fn insert(&mut self, path: &str, method: Method, value: T) -> Result<(), RouteError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if let Some(pos) = segments.iter().position(|s| s.starts_with('*')) {
            if pos + 1 != segments.len() {
                return Err(RouteError::InvalidTemplate {
                    path: path.to_string(),
                    reason: "wildcard must be the last segment",
                });
            }
        }
        if segments.iter().any(|s| *s == ":" || *s == "{}" || *s == "*") {
            return Err(RouteError::InvalidTemplate {
                path: path.to_string(),
                reason: "parameter segments need a name",
            });
        }

        let leaf = self.descend(path, &segments)?;
        let methods = leaf.methods.get_or_insert_with(MethodRouter::new);
        match methods.insert(method.clone(), value) {
            None => Ok(()),
            Some(_) => Err(RouteError::Conflict {
                method,
                path: path.to_string(),
            }),
        }
    }

    fn descend(&mut self, path: &str, segments: &[&str]) -> Result<&mut Self, RouteError> {
        let Some((segment, rest)) = segments.split_first() else {
            return Ok(self);
        };

        let child = match SegmentKind::parse(segment) {
            SegmentKind::Static => {
                let idx = match self
                    .static_children
                    .binary_search_by(|c| c.segment.as_str().cmp(segment))
                {
                    Ok(idx) => idx,
                    Err(idx) => {
                        self.static_children
                            .insert(idx, Self::new(*segment, SegmentKind::Static));
                        idx
                    }
                };
                &mut self.static_children[idx]
            }
            SegmentKind::Param(name) => {
                let child = self
                    .param_child
                    .get_or_insert_with(|| Box::new(Self::new(*segment, SegmentKind::Param(name.clone()))));
                check_name(path, &child.kind, &name)?;
                child.as_mut()
            }
            SegmentKind::Wildcard(name) => {
                let child = self.wildcard_child.get_or_insert_with(|| {
                    Box::new(Self::new(*segment, SegmentKind::Wildcard(name.clone())))
                });
                check_name(path, &child.kind, &name)?;
                child.as_mut()
            }
        };
        child.descend(path, rest)
    }

    /// Matches a concrete request path.
    ///
    /// Returns the method table of the matched template together with the
    /// extracted parameters.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodRouter<T>, Params)> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Params::new();
        let methods = self.match_segments(&segments, &mut params)?;
        Some((methods, params))
    }

    fn match_segments(&self, segments: &[&str], params: &mut Params) -> Option<&MethodRouter<T>> {
        let Some((segment, rest)) = segments.split_first() else {
            return self.methods.as_ref();
        };

        if let Ok(idx) = self
            .static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment))
        {
            if let Some(found) = self.static_children[idx].match_segments(rest, params) {
                return Some(found);
            }
        }

        if let Some(child) = &self.param_child {
            if let SegmentKind::Param(name) = &child.kind {
                let mark = params.len();
                params.push_encoded(name.clone(), segment);
                if let Some(found) = child.match_segments(rest, params) {
                    return Some(found);
                }
                params.truncate(mark);
            }
        }

        if let Some(child) = &self.wildcard_child {
            if let SegmentKind::Wildcard(name) = &child.kind {
                if let Some(methods) = &child.methods {
                    params.push_encoded(name.clone(), &segments.join("/"));
                    return Some(methods);
                }
            }
        }

        None
    }
}

fn check_name(path: &str, existing: &SegmentKind, requested: &str) -> Result<(), RouteError> {
    let existing = match existing {
        SegmentKind::Param(n) | SegmentKind::Wildcard(n) => n,
        SegmentKind::Static => return Ok(()),
    };
    if existing == requested {
        Ok(())
    } else {
        Err(RouteError::ParamNameClash {
            path: path.to_string(),
            existing: existing.clone(),
            new: requested.to_string(),
        })
    }
}
