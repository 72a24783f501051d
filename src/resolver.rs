//! Structure resolution - normalizes a schema/ui-schema pair into canonical form.
//!
//! The canonical schema is free of `$ref`, `allOf`, `oneOf`/`anyOf` and
//! `if`/`then`/`else`: every node is a concrete object, array or scalar.
//! The canonical ui-schema has a node for every object/array in the schema,
//! so field code can always descend without checking for absence.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::SchemaResolutionError;
use crate::loader::navigate_fragment;
use crate::path::{self, Segment, WILDCARD};
use crate::types::{json_type_name, UI_BRANCH, UI_PREFIX, UI_WIDGET, WIDGET_HIDDEN};

/// Scalar kinds a leaf field can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl ScalarType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(ScalarType::String),
            "number" => Some(ScalarType::Number),
            "integer" => Some(ScalarType::Integer),
            "boolean" => Some(ScalarType::Boolean),
            "null" => Some(ScalarType::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Number => "number",
            ScalarType::Integer => "integer",
            ScalarType::Boolean => "boolean",
            ScalarType::Null => "null",
        }
    }
}

/// Shape of a canonical schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Object {
        /// Properties in declaration order.
        properties: Vec<(String, SchemaNode)>,
        /// Names of mandatory properties.
        required: Vec<String>,
    },
    Array {
        items: Box<SchemaNode>,
    },
    Scalar {
        ty: ScalarType,
        format: Option<String>,
        enum_values: Option<Vec<Value>>,
    },
}

/// A resolved schema node.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: NodeKind,
    pub title: Option<String>,
    pub description: Option<String>,
    pub default: Option<Value>,
}

impl SchemaNode {
    /// A bare string leaf.
    pub fn string() -> Self {
        SchemaNode {
            kind: NodeKind::Scalar {
                ty: ScalarType::String,
                format: None,
                enum_values: None,
            },
            title: None,
            description: None,
            default: None,
        }
    }

    /// The JSON Schema type name of this node.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Object { .. } => "object",
            NodeKind::Array { .. } => "array",
            NodeKind::Scalar { ty, .. } => ty.as_str(),
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, NodeKind::Object { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, NodeKind::Array { .. })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar { .. })
    }

    pub fn format(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { format, .. } => format.as_deref(),
            _ => None,
        }
    }

    /// Child property by name (objects only).
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        match &self.kind {
            NodeKind::Object { properties, .. } => {
                properties.iter().find(|(k, _)| k == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Item schema (arrays only).
    pub fn items(&self) -> Option<&SchemaNode> {
        match &self.kind {
            NodeKind::Array { items } => Some(items),
            _ => None,
        }
    }

    /// Descend along a dot-path. Index and `[]` segments step into items.
    pub fn at(&self, name: &str) -> Option<&SchemaNode> {
        let mut current = self;
        for part in wildcard_segments(name) {
            current = match part {
                PathStep::Key(k) => current.property(k)?,
                PathStep::Item => current.items()?,
            };
        }
        Some(current)
    }

    /// Render back to plain JSON Schema.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".into(), Value::String(self.type_name().into()));
        match &self.kind {
            NodeKind::Object {
                properties,
                required,
            } => {
                let props: Map<String, Value> = properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect();
                map.insert("properties".into(), Value::Object(props));
                if !required.is_empty() {
                    map.insert(
                        "required".into(),
                        Value::Array(required.iter().cloned().map(Value::String).collect()),
                    );
                }
            }
            NodeKind::Array { items } => {
                map.insert("items".into(), items.to_value());
            }
            NodeKind::Scalar {
                format,
                enum_values,
                ..
            } => {
                if let Some(f) = format {
                    map.insert("format".into(), Value::String(f.clone()));
                }
                if let Some(e) = enum_values {
                    map.insert("enum".into(), Value::Array(e.clone()));
                }
            }
        }
        if let Some(t) = &self.title {
            map.insert("title".into(), Value::String(t.clone()));
        }
        if let Some(d) = &self.description {
            map.insert("description".into(), Value::String(d.clone()));
        }
        if let Some(d) = &self.default {
            map.insert("default".into(), d.clone());
        }
        Value::Object(map)
    }
}

/// A resolved ui-schema node: `ui:*` directives plus per-child nodes.
///
/// Array item directives live under the `items` child.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiNode {
    pub directives: Map<String, Value>,
    pub children: BTreeMap<String, UiNode>,
}

impl UiNode {
    pub fn directive(&self, key: &str) -> Option<&Value> {
        self.directives.get(key)
    }

    /// True when the directive is present and truthy.
    pub fn flag(&self, key: &str) -> bool {
        match self.directives.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) | None => false,
            Some(_) => true,
        }
    }

    pub fn widget(&self) -> Option<&str> {
        self.directives.get(UI_WIDGET).and_then(Value::as_str)
    }

    pub fn is_hidden(&self) -> bool {
        self.widget() == Some(WIDGET_HIDDEN)
    }

    pub fn child(&self, key: &str) -> Option<&UiNode> {
        self.children.get(key)
    }

    /// Descend along a dot-path. Index and `[]` segments step into `items`.
    pub fn at(&self, name: &str) -> Option<&UiNode> {
        let mut current = self;
        for part in wildcard_segments(name) {
            current = match part {
                PathStep::Key(k) => current.child(k)?,
                PathStep::Item => current.child("items")?,
            };
        }
        Some(current)
    }

    /// True if this node or any node on the way to `name` is hidden.
    pub fn hides(&self, name: &str) -> bool {
        let mut current = self;
        for part in wildcard_segments(name) {
            let next = match part {
                PathStep::Key(k) => current.child(k),
                PathStep::Item => current.child("items"),
            };
            match next {
                Some(n) if n.is_hidden() => return true,
                Some(n) => current = n,
                None => return false,
            }
        }
        false
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.directives.clone();
        for (k, v) in &self.children {
            map.insert(k.clone(), v.to_value());
        }
        Value::Object(map)
    }
}

enum PathStep<'a> {
    Key(&'a str),
    Item,
}

fn wildcard_segments(name: &str) -> Vec<PathStep<'_>> {
    let mut out = Vec::new();
    for part in name.split('.').filter(|p| !p.is_empty()) {
        let mut key = part;
        let mut items = 0;
        while let Some(stripped) = key.strip_suffix(WILDCARD) {
            key = stripped;
            items += 1;
        }
        if !key.is_empty() {
            match path::to_path(key).first() {
                Some(Segment::Index(_)) => out.push(PathStep::Item),
                _ => out.push(PathStep::Key(key)),
            }
        }
        for _ in 0..items {
            out.push(PathStep::Item);
        }
    }
    out
}

/// Flat set of mandatory paths. Array items appear as `name[]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredPaths(BTreeSet<String>);

impl RequiredPaths {
    pub fn insert(&mut self, path: impl Into<String>) {
        self.0.insert(path.into());
    }

    /// Wildcard-aware membership: `"tags.3.label"` matches `"tags[].label"`.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name) || self.0.contains(&path::wildcard(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RequiredPaths {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        RequiredPaths(iter.into_iter().map(Into::into).collect())
    }
}

/// Canonical form of a schema/ui-schema pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub schema: SchemaNode,
    pub ui_schema: UiNode,
    pub required: RequiredPaths,
}

impl Structure {
    /// Required paths whose ui-schema does not hide them.
    pub fn required_and_visible(&self) -> Vec<String> {
        self.required
            .iter()
            .filter(|p| !self.ui_schema.hides(p))
            .cloned()
            .collect()
    }
}

/// Resolve a schema/ui-schema pair into canonical form.
///
/// # Errors
///
/// Returns `SchemaResolutionError` naming the JSON pointer of the first
/// construct that cannot be expanded.
pub fn resolve(schema: &Value, ui_schema: &Value) -> Result<Structure, SchemaResolutionError> {
    let mut ctx = Context {
        root: schema,
        active_refs: Vec::new(),
    };
    let (schema, ui_schema) = resolve_node(schema, ui_schema, "", &mut ctx)?;
    let mut required = RequiredPaths::default();
    collect_required(&schema, "", &mut required);
    debug!(required = required.len(), "resolved form structure");
    Ok(Structure {
        schema,
        ui_schema,
        required,
    })
}

// --- Internal implementation ---

struct Context<'a> {
    root: &'a Value,
    active_refs: Vec<String>,
}

fn resolve_node(
    raw: &Value,
    ui: &Value,
    ptr: &str,
    ctx: &mut Context<'_>,
) -> Result<(SchemaNode, UiNode), SchemaResolutionError> {
    let map = match raw {
        Value::Object(map) => map.clone(),
        // `true` accepts anything; treat it as an unconstrained leaf
        Value::Bool(true) => Map::new(),
        other => {
            return Err(SchemaResolutionError::NotAnObject {
                path: ptr.to_string(),
                actual: json_type_name(other).to_string(),
            })
        }
    };

    let depth = ctx.active_refs.len();
    let expanded = expand(map, ui, ptr, ctx);
    let result = expanded.and_then(|map| build_node(&map, ui, ptr, ctx));
    ctx.active_refs.truncate(depth);
    result
}

fn build_node(
    map: &Map<String, Value>,
    ui: &Value,
    ptr: &str,
    ctx: &mut Context<'_>,
) -> Result<(SchemaNode, UiNode), SchemaResolutionError> {
    let mut ui_node = UiNode {
        directives: ui_directives(ui),
        children: BTreeMap::new(),
    };

    let kind = match node_type(map, ptr)? {
        NodeType::Object => {
            let mut required: Vec<String> = map
                .get("required")
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();
            let mut properties = Vec::new();
            if let Some(props) = map.get("properties").and_then(Value::as_object) {
                for (name, prop) in props {
                    let prop_ptr = format!("{}/properties/{}", ptr, name);
                    let child_ui = ui.get(name).unwrap_or(&Value::Null);
                    let (node, child) = resolve_node(prop, child_ui, &prop_ptr, ctx)?;
                    // draft-3 style `"required": true` on the property itself
                    if prop.get("required") == Some(&Value::Bool(true))
                        && !required.contains(name)
                    {
                        required.push(name.clone());
                    }
                    ui_node.children.insert(name.clone(), child);
                    properties.push((name.clone(), node));
                }
            }
            required.retain(|r| properties.iter().any(|(k, _)| k == r));
            NodeKind::Object {
                properties,
                required,
            }
        }
        NodeType::Array => {
            let items_raw = match map.get("items") {
                Some(Value::Array(tuple)) => tuple.first().cloned().unwrap_or(Value::Bool(true)),
                Some(items) => items.clone(),
                None => Value::Bool(true),
            };
            let items_ui = ui.get("items").unwrap_or(&Value::Null);
            let (items, child) =
                resolve_node(&items_raw, items_ui, &format!("{}/items", ptr), ctx)?;
            ui_node.children.insert("items".into(), child);
            NodeKind::Array {
                items: Box::new(items),
            }
        }
        NodeType::Scalar(ty) => NodeKind::Scalar {
            ty,
            format: map.get("format").and_then(Value::as_str).map(String::from),
            enum_values: map.get("enum").and_then(Value::as_array).cloned(),
        },
    };

    Ok((
        SchemaNode {
            kind,
            title: map.get("title").and_then(Value::as_str).map(String::from),
            description: map
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
            default: map.get("default").cloned(),
        },
        ui_node,
    ))
}

enum NodeType {
    Object,
    Array,
    Scalar(ScalarType),
}

fn node_type(map: &Map<String, Value>, ptr: &str) -> Result<NodeType, SchemaResolutionError> {
    let declared = match map.get("type") {
        Some(Value::String(s)) => Some(s.clone()),
        // ["string", "null"] - the first non-null member wins
        Some(Value::Array(types)) => {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            names
                .iter()
                .find(|t| **t != "null")
                .or(names.first())
                .map(|s| s.to_string())
        }
        Some(other) => {
            return Err(SchemaResolutionError::UnknownType {
                path: format!("{}/type", ptr),
                value: other.to_string(),
            })
        }
        None => None,
    };

    match declared.as_deref() {
        Some("object") => Ok(NodeType::Object),
        Some("array") => Ok(NodeType::Array),
        Some(other) => ScalarType::parse(other)
            .map(NodeType::Scalar)
            .ok_or_else(|| SchemaResolutionError::UnknownType {
                path: format!("{}/type", ptr),
                value: other.to_string(),
            }),
        None if map.contains_key("properties") => Ok(NodeType::Object),
        None if map.contains_key("items") => Ok(NodeType::Array),
        None => Ok(NodeType::Scalar(ScalarType::String)),
    }
}

fn ui_directives(ui: &Value) -> Map<String, Value> {
    ui.as_object()
        .map(|m| {
            m.iter()
                .filter(|(k, _)| k.starts_with(UI_PREFIX))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Flatten `$ref`, `allOf`, `oneOf`/`anyOf` and `if` at this node.
///
/// Repeats until none of those keywords remain, since an inlined branch
/// may itself carry them.
fn expand(
    mut map: Map<String, Value>,
    ui: &Value,
    ptr: &str,
    ctx: &mut Context<'_>,
) -> Result<Map<String, Value>, SchemaResolutionError> {
    loop {
        if let Some(reference) = map.remove("$ref") {
            map = inline_ref(map, &reference, ptr, ctx)?;
            continue;
        }
        if let Some(branches) = map.remove("allOf") {
            let branches = composition_branches(&branches, "allOf", ptr)?;
            for (i, branch) in branches.iter().enumerate() {
                let branch_ptr = format!("{}/allOf/{}", ptr, i);
                let branch = expand(as_schema_map(branch, &branch_ptr)?, ui, &branch_ptr, ctx)?;
                merge_into(&mut map, branch);
            }
            continue;
        }
        if let Some(keyword) = ["oneOf", "anyOf"].into_iter().find(|k| map.contains_key(*k)) {
            let branches = map.remove(keyword).unwrap_or(Value::Null);
            let branch = choose_branch(&map, &branches, keyword, ui, ptr, ctx)?;
            merge_into(&mut map, branch);
            continue;
        }
        if let Some(condition) = map.remove("if") {
            let then_branch = map.remove("then");
            let else_branch = map.remove("else");
            let chosen = if evaluate_condition(&map, &condition, ptr)? {
                then_branch.map(|b| (b, "then"))
            } else {
                else_branch.map(|b| (b, "else"))
            };
            if let Some((branch, keyword)) = chosen {
                let branch_ptr = format!("{}/{}", ptr, keyword);
                let branch = expand(as_schema_map(&branch, &branch_ptr)?, ui, &branch_ptr, ctx)?;
                merge_into(&mut map, branch);
            }
            continue;
        }
        return Ok(map);
    }
}

fn inline_ref(
    mut map: Map<String, Value>,
    reference: &Value,
    ptr: &str,
    ctx: &mut Context<'_>,
) -> Result<Map<String, Value>, SchemaResolutionError> {
    let ref_ptr = format!("{}/$ref", ptr);
    let Some(reference) = reference.as_str() else {
        return Err(SchemaResolutionError::UnresolvedRef {
            path: ref_ptr,
            reference: reference.to_string(),
        });
    };
    if !reference.starts_with('#') {
        return Err(SchemaResolutionError::UnresolvedRef {
            path: ref_ptr,
            reference: reference.to_string(),
        });
    }
    if ctx.active_refs.iter().any(|r| r == reference) {
        return Err(SchemaResolutionError::CircularRef {
            path: ref_ptr,
            reference: reference.to_string(),
        });
    }
    let target =
        navigate_fragment(ctx.root, reference).map_err(|_| SchemaResolutionError::UnresolvedRef {
            path: ref_ptr.clone(),
            reference: reference.to_string(),
        })?;
    let Value::Object(target) = target else {
        return Err(SchemaResolutionError::NotAnObject {
            path: ref_ptr,
            actual: json_type_name(&target).to_string(),
        });
    };
    ctx.active_refs.push(reference.to_string());
    // Sibling keywords next to $ref take precedence over the target.
    for (k, v) in target {
        map.entry(k).or_insert(v);
    }
    Ok(map)
}

fn composition_branches<'v>(
    value: &'v Value,
    keyword: &str,
    ptr: &str,
) -> Result<&'v Vec<Value>, SchemaResolutionError> {
    match value {
        Value::Array(arr) if !arr.is_empty() => Ok(arr),
        Value::Array(_) => Err(SchemaResolutionError::InvalidComposition {
            path: format!("{}/{}", ptr, keyword),
            keyword: keyword.to_string(),
            message: "no branches".into(),
        }),
        other => Err(SchemaResolutionError::InvalidComposition {
            path: format!("{}/{}", ptr, keyword),
            keyword: keyword.to_string(),
            message: format!("expected array, got {}", json_type_name(other)),
        }),
    }
}

fn as_schema_map(value: &Value, ptr: &str) -> Result<Map<String, Value>, SchemaResolutionError> {
    match value {
        Value::Object(m) => Ok(m.clone()),
        Value::Bool(true) => Ok(Map::new()),
        other => Err(SchemaResolutionError::NotAnObject {
            path: ptr.to_string(),
            actual: json_type_name(other).to_string(),
        }),
    }
}

/// Pick one branch of a union.
///
/// Order: explicit `ui:branch` index, then the first branch accepting the
/// node's default, then the first branch.
fn choose_branch(
    map: &Map<String, Value>,
    branches: &Value,
    keyword: &str,
    ui: &Value,
    ptr: &str,
    ctx: &mut Context<'_>,
) -> Result<Map<String, Value>, SchemaResolutionError> {
    let list = composition_branches(branches, keyword, ptr)?;

    if let Some(selector) = ui.get(UI_BRANCH) {
        let index = selector
            .as_u64()
            .map(|i| i as usize)
            .filter(|i| *i < list.len())
            .ok_or_else(|| SchemaResolutionError::InvalidComposition {
                path: format!("{}/{}", ptr, keyword),
                keyword: keyword.to_string(),
                message: format!("{} {} does not select one of {} branches", UI_BRANCH, selector, list.len()),
            })?;
        let branch_ptr = format!("{}/{}/{}", ptr, keyword, index);
        return expand(as_schema_map(&list[index], &branch_ptr)?, ui, &branch_ptr, ctx);
    }

    // Refs pulled in by a branch stay active only if that branch wins.
    let depth = ctx.active_refs.len();
    let mut expanded = Vec::with_capacity(list.len());
    for (i, branch) in list.iter().enumerate() {
        let branch_ptr = format!("{}/{}/{}", ptr, keyword, i);
        let map = expand(as_schema_map(branch, &branch_ptr)?, ui, &branch_ptr, ctx)?;
        let refs = ctx.active_refs.split_off(depth);
        expanded.push((map, refs));
    }

    let chosen = map
        .get("default")
        .and_then(|default| {
            expanded
                .iter()
                .position(|(branch, _)| accepts(&Value::Object(branch.clone()), default))
        })
        .unwrap_or(0);
    if chosen > 0 {
        debug!(path = ptr, keyword, branch = chosen, "union branch selected by default");
    }
    let (branch, refs) = expanded.swap_remove(chosen);
    ctx.active_refs.extend(refs);
    Ok(branch)
}

fn accepts(schema: &Value, instance: &Value) -> bool {
    match jsonschema::validator_for(schema) {
        Ok(validator) => validator.is_valid(instance),
        Err(e) => {
            debug!(error = %e, "branch schema not checkable, skipping");
            false
        }
    }
}

fn evaluate_condition(
    map: &Map<String, Value>,
    condition: &Value,
    ptr: &str,
) -> Result<bool, SchemaResolutionError> {
    let validator =
        jsonschema::validator_for(condition).map_err(|e| SchemaResolutionError::InvalidCondition {
            path: format!("{}/if", ptr),
            message: e.to_string(),
        })?;
    Ok(validator.is_valid(&default_instance(map)))
}

/// The value a condition is evaluated against: the node default, or an
/// object assembled from property defaults.
fn default_instance(map: &Map<String, Value>) -> Value {
    if let Some(default) = map.get("default") {
        return default.clone();
    }
    let defaults: Map<String, Value> = map
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .filter_map(|(k, p)| p.get("default").map(|d| (k.clone(), d.clone())))
                .collect()
        })
        .unwrap_or_default();
    Value::Object(defaults)
}

/// Merge a branch into the base map.
///
/// Properties are merged per key, `required` is united, and any other
/// keyword is taken from the branch only when the base lacks it.
fn merge_into(base: &mut Map<String, Value>, branch: Map<String, Value>) {
    for (key, value) in branch {
        match key.as_str() {
            "properties" => {
                let Value::Object(branch_props) = value else {
                    continue;
                };
                let entry = base
                    .entry("properties")
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(props) = entry {
                    for (name, prop) in branch_props {
                        match (props.get_mut(&name), prop) {
                            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                                merge_into(existing, incoming)
                            }
                            (Some(_), _) => {}
                            (None, prop) => {
                                props.insert(name, prop);
                            }
                        }
                    }
                }
            }
            "required" => {
                let Value::Array(names) = value else {
                    continue;
                };
                let entry = base
                    .entry("required")
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(existing) = entry {
                    for name in names {
                        if !existing.contains(&name) {
                            existing.push(name);
                        }
                    }
                }
            }
            _ => {
                base.entry(key).or_insert(value);
            }
        }
    }
}

fn collect_required(node: &SchemaNode, prefix: &str, out: &mut RequiredPaths) {
    match &node.kind {
        NodeKind::Object {
            properties,
            required,
        } => {
            for (name, child) in properties {
                let child_path = path::join(prefix, name);
                if required.contains(name) {
                    out.insert(child_path.clone());
                }
                collect_required(child, &child_path, out);
            }
        }
        NodeKind::Array { items } => {
            collect_required(items, &format!("{}{}", prefix, WILDCARD), out);
        }
        NodeKind::Scalar { .. } => {}
    }
}
