//! Dot-path addressing shared by every state tree.
//!
//! Field names are dot-separated (`"address.lines.0"`). Numeric segments
//! address array items. The *wildcard* form replaces every item index with a
//! `[]` suffix on the owning segment (`"address.lines[]"`), which is how the
//! required index names array items independently of their position.

use serde_json::{Map, Value};

/// Suffix marking "any item" of an array in wildcard paths.
pub const WILDCARD: &str = "[]";

/// One step of a parsed dot-path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        // Leading zeros ("01") stay keys so they round-trip.
        match raw.parse::<usize>() {
            Ok(i) if i.to_string() == raw => Segment::Index(i),
            _ => Segment::Key(raw.to_string()),
        }
    }
}

/// Split a field name into segments. The root name `""` has none.
pub fn to_path(name: &str) -> Vec<Segment> {
    if name.is_empty() {
        return Vec::new();
    }
    name.split('.').map(Segment::parse).collect()
}

/// Join segments back into a field name.
pub fn from_path(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| match s {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => i.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Child name of `parent`, handling the root.
pub fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// Last segment of a field name (`""` for the root).
pub fn last(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or("")
}

/// Every strict ancestor of `name`, nearest first, excluding the root.
pub fn ancestors(name: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = name;
    while let Some(idx) = current.rfind('.') {
        current = &current[..idx];
        out.push(current.to_string());
    }
    out
}

/// Wildcard form of a field name: `"a.0.b"` becomes `"a[].b"`.
pub fn wildcard(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for seg in to_path(name) {
        match seg {
            Segment::Index(_) => out.push_str(WILDCARD),
            Segment::Key(k) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(&k);
            }
        }
    }
    out
}

/// True if the name crosses at least one array index.
pub fn has_index(name: &str) -> bool {
    to_path(name).iter().any(|s| matches!(s, Segment::Index(_)))
}

/// Read the node at `name` inside a JSON tree.
pub fn get<'a>(root: &'a Value, name: &str) -> Option<&'a Value> {
    let mut current = root;
    for seg in to_path(name) {
        current = match (&seg, current) {
            (Segment::Key(k), Value::Object(map)) => map.get(k)?,
            (Segment::Index(i), Value::Array(arr)) => arr.get(*i)?,
            (Segment::Index(i), Value::Object(map)) => map.get(&i.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}

/// Whether [`set`] can write `name` into `root`: every index segment is at
/// most one past the end of the array it addresses.
pub fn settable(root: &Value, name: &str) -> bool {
    let mut current = Some(root);
    for seg in to_path(name) {
        current = match (seg, current) {
            (Segment::Key(k), Some(Value::Object(map))) => map.get(&k),
            (Segment::Key(_), _) => None,
            (Segment::Index(i), Some(Value::Object(map))) => map.get(&i.to_string()),
            (Segment::Index(i), Some(Value::Array(arr))) => {
                if i > arr.len() {
                    return false;
                }
                arr.get(i)
            }
            (Segment::Index(i), _) => {
                if i > 0 {
                    return false;
                }
                None
            }
        };
    }
    true
}

/// Write `value` at `name`, creating intermediate containers as needed.
///
/// Index segments create arrays and may append one item; key segments
/// create objects. A scalar in the way is replaced. Returns `false`, leaving
/// `root` untouched, when an index lies past the end of its array.
pub fn set(root: &mut Value, name: &str, value: Value) -> bool {
    if !settable(root, name) {
        return false;
    }
    set_in(root, &to_path(name), value);
    true
}

fn set_in(node: &mut Value, segments: &[Segment], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    match first {
        Segment::Key(k) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            if let Value::Object(map) = node {
                set_in(map.entry(k.clone()).or_insert(Value::Null), rest, value);
            }
        }
        Segment::Index(i) => {
            // Objects keyed by digits stay objects.
            if node.is_object() {
                if let Value::Object(map) = node {
                    set_in(map.entry(i.to_string()).or_insert(Value::Null), rest, value);
                }
                return;
            }
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            if let Value::Array(arr) = node {
                if arr.len() == *i {
                    arr.push(Value::Null);
                }
                if let Some(slot) = arr.get_mut(*i) {
                    set_in(slot, rest, value);
                }
            }
        }
    }
}

/// Concrete descendant names of `name` found in `value` (not including `name`).
pub fn descendants(name: &str, value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_descendants(name, value, &mut out);
    out
}

fn collect_descendants(name: &str, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let child = join(name, k);
                out.push(child.clone());
                collect_descendants(&child, v, out);
            }
        }
        Value::Array(arr) => {
            for (i, v) in arr.iter().enumerate() {
                let child = join(name, &i.to_string());
                out.push(child.clone());
                collect_descendants(&child, v, out);
            }
        }
        _ => {}
    }
}

/// Expand a wildcard path into the concrete names present in `root`.
///
/// `"tags[].label"` against `{"tags": [{..}, {..}]}` yields
/// `["tags.0.label", "tags.1.label"]`. An empty array yields nothing.
pub fn concretize(wildcard_path: &str, root: &Value) -> Vec<String> {
    let mut results = vec![(String::new(), Some(root))];
    for part in wildcard_path.split('.').filter(|p| !p.is_empty()) {
        let (key, depth) = split_wildcards(part);
        let mut next = Vec::new();
        for (prefix, node) in results {
            let name = join(&prefix, key);
            let child = node.and_then(|n| n.get(key));
            let mut level = vec![(name, child)];
            for _ in 0..depth {
                let mut expanded = Vec::new();
                for (n, v) in level {
                    if let Some(Value::Array(items)) = v {
                        for (i, item) in items.iter().enumerate() {
                            expanded.push((join(&n, &i.to_string()), Some(item)));
                        }
                    }
                }
                level = expanded;
            }
            next.extend(level);
        }
        results = next;
    }
    results.into_iter().map(|(n, _)| n).collect()
}

fn split_wildcards(part: &str) -> (&str, usize) {
    let mut key = part;
    let mut depth = 0;
    while let Some(stripped) = key.strip_suffix(WILDCARD) {
        key = stripped;
        depth += 1;
    }
    (key, depth)
}
