//! Update propagation - which paths must recompute after a mutation.

use std::collections::BTreeSet;

use crate::path;

/// What a mutation touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateRequest {
    /// Everything is dirty (schema swap, reset, prop change).
    All,
    Paths(Vec<String>),
}

impl From<&str> for UpdateRequest {
    fn from(name: &str) -> Self {
        UpdateRequest::Paths(vec![name.to_string()])
    }
}

impl From<Vec<String>> for UpdateRequest {
    fn from(names: Vec<String>) -> Self {
        UpdateRequest::Paths(names)
    }
}

/// Paths whose rendered output must be recomputed.
///
/// Superseded by the next mutation's set, never accumulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirtySet {
    All,
    Paths(BTreeSet<String>),
}

impl Default for DirtySet {
    fn default() -> Self {
        DirtySet::Paths(BTreeSet::new())
    }
}

impl DirtySet {
    pub fn is_all(&self) -> bool {
        matches!(self, DirtySet::All)
    }

    /// Exact membership of a concrete path.
    pub fn contains(&self, name: &str) -> bool {
        match self {
            DirtySet::All => true,
            DirtySet::Paths(paths) => paths.contains(name),
        }
    }

    /// Membership of the wildcard form, for consumers keyed by schema path
    /// (`"tags[].label"`) rather than by concrete item.
    pub fn touches_schema_path(&self, wildcard: &str) -> bool {
        match self {
            DirtySet::All => true,
            DirtySet::Paths(paths) => paths.contains(wildcard),
        }
    }

    /// Number of explicit paths; `None` for `All`.
    pub fn len(&self) -> Option<usize> {
        match self {
            DirtySet::All => None,
            DirtySet::Paths(paths) => Some(paths.len()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DirtySet::Paths(p) if p.is_empty())
    }
}

/// Expand changed paths into a dirty set.
///
/// Each path contributes itself, every strict ancestor (aggregate widgets
/// display counts of their children), and for paths under array items the
/// wildcard form of each of those.
pub fn expand(request: impl Into<UpdateRequest>) -> DirtySet {
    let names = match request.into() {
        UpdateRequest::All => return DirtySet::All,
        UpdateRequest::Paths(names) => names,
    };
    let mut out = BTreeSet::new();
    for name in names {
        let mut chain = vec![name.clone()];
        chain.extend(path::ancestors(&name));
        for p in chain {
            if path::has_index(&p) {
                out.insert(path::wildcard(&p));
            }
            out.insert(p);
        }
    }
    DirtySet::Paths(out)
}
