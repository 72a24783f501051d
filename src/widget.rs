//! Widget registry - maps ui-schema widget names to renderer capabilities.

use std::collections::HashMap;
use std::fmt::Debug;
use std::rc::Rc;

use crate::resolver::{NodeKind, ScalarType, SchemaNode};

/// What the engine needs to know about a widget to drive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetCapabilities {
    /// Errors may be auto-hidden while the user edits.
    pub hideable: bool,
    /// Supplied by the host rather than built in.
    pub custom: bool,
    /// Renders its own title, so the field shows none.
    pub owns_title: bool,
}

impl Default for WidgetCapabilities {
    fn default() -> Self {
        Self {
            hideable: true,
            custom: false,
            owns_title: false,
        }
    }
}

/// A renderer the engine can select for a field.
pub trait Widget: Debug {
    fn name(&self) -> &str;

    fn capabilities(&self) -> WidgetCapabilities {
        WidgetCapabilities::default()
    }
}

/// A widget known only by name and capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinWidget {
    name: String,
    capabilities: WidgetCapabilities,
}

impl BuiltinWidget {
    pub fn new(name: impl Into<String>, capabilities: WidgetCapabilities) -> Self {
        Self {
            name: name.into(),
            capabilities,
        }
    }
}

impl Widget for BuiltinWidget {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> WidgetCapabilities {
        self.capabilities
    }
}

const BUILTINS: &[&str] = &[
    "text", "textarea", "email", "password", "phone", "zip", "number", "integer", "select",
    "date", "file", "hidden", "checkbox", "object",
];

/// Lookup from normalized widget tag to widget.
///
/// Tags are case-insensitive and a trailing `Widget` is ignored, so
/// `"TextWidget"`, `"textWidget"` and `"text"` name the same entry.
#[derive(Debug, Clone)]
pub struct WidgetRegistry {
    widgets: HashMap<String, Rc<dyn Widget>>,
}

impl Default for WidgetRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl WidgetRegistry {
    /// A registry with no widgets at all.
    pub fn empty() -> Self {
        Self {
            widgets: HashMap::new(),
        }
    }

    /// The built-in widget set.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for name in BUILTINS {
            registry.register(BuiltinWidget::new(*name, WidgetCapabilities::default()));
        }
        registry.register(BuiltinWidget::new(
            "array",
            WidgetCapabilities {
                owns_title: true,
                ..WidgetCapabilities::default()
            },
        ));
        registry
    }

    /// Add or replace a widget under its normalized name.
    pub fn register(&mut self, widget: impl Widget + 'static) {
        let tag = normalize_tag(widget.name());
        self.widgets.insert(tag, Rc::new(widget));
    }

    pub fn get(&self, tag: &str) -> Option<Rc<dyn Widget>> {
        self.widgets.get(&normalize_tag(tag)).cloned()
    }

    /// Overlay `other` on top of this registry.
    pub fn merge(mut self, other: &WidgetRegistry) -> Self {
        for (tag, widget) in &other.widgets {
            self.widgets.insert(tag.clone(), Rc::clone(widget));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }
}

/// Lowercase a widget tag and strip a trailing `widget`.
pub fn normalize_tag(tag: &str) -> String {
    let lower = tag.to_ascii_lowercase();
    match lower.strip_suffix("widget") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => lower,
    }
}

/// Widget tag chosen by schema shape alone.
pub fn default_for(schema: &SchemaNode) -> &'static str {
    match &schema.kind {
        NodeKind::Object { .. } => "object",
        NodeKind::Array { .. } => "array",
        NodeKind::Scalar {
            ty,
            format,
            enum_values,
        } => match (format.as_deref(), enum_values, ty) {
            (Some("date" | "date-time"), _, _) => "date",
            (Some("email"), _, _) => "email",
            (_, Some(_), _) => "select",
            (_, _, ScalarType::Boolean) => "checkbox",
            (_, _, ScalarType::Number) => "number",
            (_, _, ScalarType::Integer) => "integer",
            _ => "text",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use serde_json::json;

    #[derive(Debug)]
    struct Signature;

    impl Widget for Signature {
        fn name(&self) -> &str {
            "SignatureWidget"
        }

        fn capabilities(&self) -> WidgetCapabilities {
            WidgetCapabilities {
                hideable: false,
                custom: true,
                owns_title: false,
            }
        }
    }

    fn leaf(schema: serde_json::Value) -> SchemaNode {
        resolve(&json!({"type": "object", "properties": {"f": schema}}), &json!({}))
            .unwrap()
            .schema
            .property("f")
            .unwrap()
            .clone()
    }

    #[test]
    fn tags_are_normalized() {
        assert_eq!(normalize_tag("TextWidget"), "text");
        assert_eq!(normalize_tag("textarea"), "textarea");
        assert_eq!(normalize_tag("Widget"), "widget");
        let registry = WidgetRegistry::builtin();
        assert!(registry.get("SelectWidget").is_some());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn builtin_array_owns_title() {
        let registry = WidgetRegistry::builtin();
        assert!(registry.get("array").unwrap().capabilities().owns_title);
        assert!(registry.get("text").unwrap().capabilities().hideable);
    }

    #[test]
    fn merge_overrides_builtins() {
        let mut custom = WidgetRegistry::empty();
        custom.register(Signature);
        let merged = WidgetRegistry::builtin().merge(&custom);
        let widget = merged.get("signature").unwrap();
        assert!(widget.capabilities().custom);
        assert!(!widget.capabilities().hideable);
        assert_eq!(merged.len(), WidgetRegistry::builtin().len() + 1);
    }

    #[test]
    fn defaults_follow_schema_shape() {
        assert_eq!(default_for(&leaf(json!({"type": "string"}))), "text");
        assert_eq!(default_for(&leaf(json!({"type": "string", "format": "date"}))), "date");
        assert_eq!(default_for(&leaf(json!({"type": "string", "format": "email"}))), "email");
        assert_eq!(default_for(&leaf(json!({"enum": ["a", "b"]}))), "select");
        assert_eq!(default_for(&leaf(json!({"type": "boolean"}))), "checkbox");
        assert_eq!(default_for(&leaf(json!({"type": "integer"}))), "integer");
        assert_eq!(default_for(&leaf(json!({"type": "array", "items": {}}))), "array");
        assert_eq!(default_for(&leaf(json!({"type": "object", "properties": {}}))), "object");
    }
}
