//! State tree projection - reshapes raw values, errors and metas onto a schema.
//!
//! Projection always deep-copies: the returned trees never alias the
//! caller's input. Missing or malformed parts are synthesized instead of
//! failing, and projecting an already-conformant tree is a no-op.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::path::{self, Segment};
use crate::resolver::{NodeKind, SchemaNode, UiNode};
use crate::types::{UI_DISABLED, UI_PREFIX};

/// Validation errors, shaped like the schema.
///
/// Each node carries its own messages plus two display annotations:
/// `hidden` suppresses display without discarding the messages, and
/// `last_value` records the field value when the error was first shown.
/// Array items are children keyed by their index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorTree {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_value: Option<Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, ErrorTree>,
}

impl ErrorTree {
    /// A leaf holding the given messages.
    pub fn with_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ErrorTree {
            messages: messages.into_iter().map(Into::into).collect(),
            ..ErrorTree::default()
        }
    }

    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }

    /// Total number of messages in this subtree.
    pub fn count(&self) -> usize {
        self.messages.len() + self.children.values().map(ErrorTree::count).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn get(&self, name: &str) -> Option<&ErrorTree> {
        let mut current = self;
        for seg in path::to_path(name) {
            current = current.children.get(&segment_key(&seg))?;
        }
        Some(current)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ErrorTree> {
        let mut current = self;
        for seg in path::to_path(name) {
            current = current.children.get_mut(&segment_key(&seg))?;
        }
        Some(current)
    }

    /// Replace the subtree at `name`, creating empty parents on the way.
    pub fn set(&mut self, name: &str, subtree: ErrorTree) {
        let mut current = self;
        for seg in path::to_path(name) {
            current = current.children.entry(segment_key(&seg)).or_default();
        }
        *current = subtree;
    }

    /// Drop item `index` and shift later items down (array nodes).
    pub fn remove_item(&mut self, index: usize) {
        let mut shifted = BTreeMap::new();
        for (key, child) in std::mem::take(&mut self.children) {
            match key.parse::<usize>() {
                Ok(i) if i == index => {}
                Ok(i) if i > index => {
                    shifted.insert((i - 1).to_string(), child);
                }
                _ => {
                    shifted.insert(key, child);
                }
            }
        }
        self.children = shifted;
    }

    /// Every path in this subtree that has messages, in path order.
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_paths("", &mut out);
        out
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
        if self.has_messages() {
            out.push(prefix.to_string());
        }
        for (k, child) in &self.children {
            child.collect_paths(&path::join(prefix, k), out);
        }
    }
}

fn segment_key(seg: &Segment) -> String {
    match seg {
        Segment::Key(k) => k.clone(),
        Segment::Index(i) => i.to_string(),
    }
}

/// Project raw form data onto the schema shape.
///
/// Missing leaves become the schema `default` or `""`, missing objects `{}`
/// (with their properties synthesized), missing arrays `[]`. Keys the
/// schema does not describe are dropped.
pub fn project_values(raw: &Value, schema: &SchemaNode) -> Value {
    match &schema.kind {
        NodeKind::Object { properties, .. } => {
            let source = raw.as_object();
            let mut out = Map::new();
            for (name, child) in properties {
                let child_raw = source.and_then(|m| m.get(name)).unwrap_or(&Value::Null);
                out.insert(name.clone(), project_values(child_raw, child));
            }
            Value::Object(out)
        }
        NodeKind::Array { items } => match raw {
            Value::Array(arr) => Value::Array(arr.iter().map(|v| project_values(v, items)).collect()),
            _ => match &schema.default {
                Some(Value::Array(arr)) => {
                    Value::Array(arr.iter().map(|v| project_values(v, items)).collect())
                }
                _ => Value::Array(Vec::new()),
            },
        },
        NodeKind::Scalar { .. } => match raw {
            Value::Null => schema
                .default
                .clone()
                .unwrap_or_else(|| Value::String(String::new())),
            other => other.clone(),
        },
    }
}

/// The value a fresh, empty node of this schema holds.
pub fn empty_value(schema: &SchemaNode) -> Value {
    project_values(&Value::Null, schema)
}

/// Project a raw error document onto the schema shape.
///
/// Raw leaves are arrays of messages (a bare string is one message).
/// Raw arrays for array nodes mix messages (strings) with item errors
/// at the item's index; raw objects may also key items by index.
pub fn project_errors(raw: &Value, schema: &SchemaNode) -> ErrorTree {
    let mut tree = ErrorTree {
        messages: messages_of(raw),
        ..ErrorTree::default()
    };
    match &schema.kind {
        NodeKind::Object { properties, .. } => {
            let source = raw.as_object();
            for (name, child) in properties {
                let child_raw = source.and_then(|m| m.get(name)).unwrap_or(&Value::Null);
                tree.children
                    .insert(name.clone(), project_errors(child_raw, child));
            }
        }
        NodeKind::Array { items } => match raw {
            Value::Array(arr) => {
                for (i, item) in arr.iter().enumerate() {
                    if !item.is_string() && !item.is_null() {
                        tree.children.insert(i.to_string(), project_errors(item, items));
                    }
                }
            }
            Value::Object(map) => {
                for (key, item) in map {
                    if let Ok(i) = key.parse::<usize>() {
                        tree.children.insert(i.to_string(), project_errors(item, items));
                    }
                }
            }
            _ => {}
        },
        NodeKind::Scalar { .. } => {}
    }
    tree
}

fn messages_of(raw: &Value) -> Vec<String> {
    match raw {
        Value::String(s) => vec![s.clone()],
        Value::Array(arr) => arr
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Messages in a raw error document whose keys the schema does not know.
///
/// A generic failure arrives as `{"Error": ["..."]}`; since no field is
/// called `Error`, its message surfaces here instead of being lost.
pub fn collect_exceptions(raw: &Value, schema: &SchemaNode) -> BTreeMap<String, Vec<String>> {
    let mut out = BTreeMap::new();
    collect_exceptions_at(raw, schema, "", &mut out);
    out
}

fn collect_exceptions_at(
    raw: &Value,
    schema: &SchemaNode,
    prefix: &str,
    out: &mut BTreeMap<String, Vec<String>>,
) {
    let Value::Object(map) = raw else {
        return;
    };
    for (key, value) in map {
        let name = path::join(prefix, key);
        match &schema.kind {
            NodeKind::Object { .. } => match schema.property(key) {
                Some(child) => collect_exceptions_at(value, child, &name, out),
                None => {
                    let messages = flatten_messages(value);
                    if !messages.is_empty() {
                        out.insert(name, messages);
                    }
                }
            },
            NodeKind::Array { items } if key.parse::<usize>().is_ok() => {
                collect_exceptions_at(value, items, &name, out)
            }
            _ => {
                let messages = flatten_messages(value);
                if !messages.is_empty() {
                    out.insert(name, messages);
                }
            }
        }
    }
}

fn flatten_messages(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(arr) => arr.iter().flat_map(flatten_messages).collect(),
        Value::Object(map) => map.values().flat_map(flatten_messages).collect(),
        _ => Vec::new(),
    }
}

/// Project a raw meta document onto the schema shape.
///
/// Leaves become flag maps (anything that is not an object becomes `{}`),
/// objects keep their `ui:*` flags next to their children, and a
/// `ui:disabled` directive in the ui-schema seeds the flag when the raw
/// meta does not set it.
pub fn project_metas(raw: &Value, schema: &SchemaNode, ui: &UiNode) -> Value {
    let empty_ui = UiNode::default();
    let mut out = match &schema.kind {
        NodeKind::Object { properties, .. } => {
            let source = raw.as_object();
            let mut out: Map<String, Value> = source
                .map(|m| {
                    m.iter()
                        .filter(|(k, _)| k.starts_with(UI_PREFIX))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default();
            for (name, child) in properties {
                let child_raw = source.and_then(|m| m.get(name)).unwrap_or(&Value::Null);
                let child_ui = ui.child(name).unwrap_or(&empty_ui);
                out.insert(name.clone(), project_metas(child_raw, child, child_ui));
            }
            Value::Object(out)
        }
        NodeKind::Array { items } => {
            let items_ui = ui.child("items").unwrap_or(&empty_ui);
            match raw {
                Value::Array(arr) => Value::Array(
                    arr.iter()
                        .map(|v| project_metas(v, items, items_ui))
                        .collect(),
                ),
                _ => Value::Array(Vec::new()),
            }
        }
        NodeKind::Scalar { .. } => match raw {
            Value::Object(m) => Value::Object(m.clone()),
            _ => Value::Object(Map::new()),
        },
    };
    if let (Value::Object(map), Some(disabled)) = (&mut out, ui.directive(UI_DISABLED)) {
        map.entry(UI_DISABLED).or_insert_with(|| disabled.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use serde_json::json;

    fn schema() -> SchemaNode {
        resolve(
            &json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "age": { "type": "integer", "default": 18 },
                    "address": {
                        "type": "object",
                        "properties": { "city": { "type": "string" } }
                    },
                    "tags": { "type": "array", "items": { "type": "string" } }
                }
            }),
            &json!({}),
        )
        .unwrap()
        .schema
    }

    // === Values ===

    #[test]
    fn values_synthesize_missing_nodes() {
        let v = project_values(&json!({}), &schema());
        assert_eq!(
            v,
            json!({"name": "", "age": 18, "address": {"city": ""}, "tags": []})
        );
    }

    #[test]
    fn values_keep_present_and_drop_unknown() {
        let v = project_values(
            &json!({"name": "Ann", "tags": ["x"], "extra": true}),
            &schema(),
        );
        assert_eq!(v["name"], json!("Ann"));
        assert_eq!(v["tags"], json!(["x"]));
        assert!(v.get("extra").is_none());
    }

    #[test]
    fn values_recover_wrong_shapes() {
        let v = project_values(&json!({"address": "oops", "tags": 4}), &schema());
        assert_eq!(v["address"], json!({"city": ""}));
        assert_eq!(v["tags"], json!([]));
    }

    #[test]
    fn values_projection_idempotent() {
        let s = schema();
        let once = project_values(&json!({"name": "Bo", "tags": ["a", null]}), &s);
        let twice = project_values(&once, &s);
        assert_eq!(once, twice);
    }

    #[test]
    fn values_do_not_alias_input() {
        let s = schema();
        let mut raw = json!({"name": "Ann"});
        let projected = project_values(&raw, &s);
        raw["name"] = json!("Changed");
        assert_eq!(projected["name"], json!("Ann"));
    }

    // === Errors ===

    #[test]
    fn errors_attach_messages_to_leaves() {
        let e = project_errors(
            &json!({"name": ["required"], "address": {"city": "bad city"}}),
            &schema(),
        );
        let name = e.get("name").unwrap();
        assert_eq!(name.messages, vec!["required"]);
        assert!(!name.hidden);
        assert!(name.last_value.is_none());
        assert_eq!(e.get("address.city").unwrap().messages, vec!["bad city"]);
        assert!(e.get("age").unwrap().messages.is_empty());
        assert_eq!(e.count(), 2);
    }

    #[test]
    fn errors_array_mixes_messages_and_items() {
        let e = project_errors(&json!({"tags": ["too few", ["bad tag"]]}), &schema());
        let tags = e.get("tags").unwrap();
        assert_eq!(tags.messages, vec!["too few"]);
        assert_eq!(e.get("tags.1").unwrap().messages, vec!["bad tag"]);
    }

    #[test]
    fn errors_set_and_remove_item() {
        let mut e = project_errors(
            &json!({"tags": {"0": ["a"], "1": ["b"], "2": ["c"]}}),
            &schema(),
        );
        e.get_mut("tags").unwrap().remove_item(1);
        assert_eq!(e.get("tags.0").unwrap().messages, vec!["a"]);
        assert_eq!(e.get("tags.1").unwrap().messages, vec!["c"]);
        assert!(e.get("tags.2").is_none());

        e.set("address.city", ErrorTree::with_messages(["nope"]));
        assert_eq!(e.paths(), vec!["address.city", "tags.0", "tags.1"]);
    }

    #[test]
    fn exceptions_collect_unknown_keys() {
        let ex = collect_exceptions(
            &json!({"Error": ["server exploded"], "name": ["fine"], "address": {"zip": "x"}}),
            &schema(),
        );
        assert_eq!(ex.get("Error").unwrap(), &vec!["server exploded".to_string()]);
        assert_eq!(ex.get("address.zip").unwrap(), &vec!["x".to_string()]);
        assert!(!ex.contains_key("name"));
    }

    // === Metas ===

    #[test]
    fn metas_default_to_values_shape() {
        let s = schema();
        let values = project_values(&json!({"tags": ["a", "b"]}), &s);
        let m = project_metas(&values, &s, &UiNode::default());
        assert_eq!(
            m,
            json!({"name": {}, "age": {}, "address": {"city": {}}, "tags": [{}, {}]})
        );
    }

    #[test]
    fn metas_keep_flags_and_seed_from_ui() {
        let structure = resolve(
            &json!({"type": "object", "properties": {"a": {"type": "string"}, "b": {"type": "string"}}}),
            &json!({"b": {"ui:disabled": true}}),
        )
        .unwrap();
        let m = project_metas(
            &json!({"a": {"ui:disabled": true, "note": 1}}),
            &structure.schema,
            &structure.ui_schema,
        );
        assert_eq!(m["a"], json!({"ui:disabled": true, "note": 1}));
        assert_eq!(m["b"], json!({"ui:disabled": true}));
    }
}
