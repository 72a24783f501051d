//! Field controllers - per-field widget selection, titles and error display.
//!
//! A controller holds only presentation state (focus, the cached widget,
//! what it saw at its last evaluation). All data lives in the form; the
//! form hands it to the controller when evaluating.

use std::rc::Rc;

use serde_json::Value;

use crate::form::Form;
use crate::path;
use crate::propagation::DirtySet;
use crate::resolver::{SchemaNode, UiNode};
use crate::state::ErrorTree;
use crate::types::{is_empty_value, UI_NO_LABEL, UI_TITLE, UI_TOGGLEABLE};
use crate::widget::{default_for, BuiltinWidget, Widget, WidgetCapabilities, WidgetRegistry};

/// Form-wide inputs to the recompute decision.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub dirty: &'a DirtySet,
    pub clear_cache: bool,
    pub active_field: Option<&'a str>,
}

/// Per-field data a title or placeholder is computed from.
#[derive(Debug, Clone, Copy)]
pub struct FieldInfo<'a> {
    pub schema: &'a SchemaNode,
    pub ui: &'a UiNode,
    pub value: &'a Value,
    pub required: bool,
    pub capabilities: WidgetCapabilities,
}

#[derive(Debug, Clone, PartialEq)]
struct Seen {
    in_focus: bool,
    active_field: Option<String>,
}

/// Presentation state of one rendered field.
#[derive(Debug, Clone)]
pub struct FieldController {
    path: String,
    override_widget: Option<Rc<dyn Widget>>,
    cache: Option<Rc<dyn Widget>>,
    in_focus: bool,
    seen: Option<Seen>,
}

impl FieldController {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            override_widget: None,
            cache: None,
            in_focus: false,
            seen: None,
        }
    }

    /// Use this widget regardless of the ui-schema.
    pub fn with_widget(mut self, widget: impl Widget + 'static) -> Self {
        self.override_widget = Some(Rc::new(widget));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn in_focus(&self) -> bool {
        self.in_focus
    }

    /// Whether the field must be recomputed for this render.
    ///
    /// A field never evaluated always computes.
    pub fn should_recompute(&self, ctx: &RenderContext<'_>) -> bool {
        let Some(seen) = &self.seen else {
            return true;
        };
        self.path.is_empty()
            || ctx.clear_cache
            || ctx.dirty.contains(&self.path)
            || seen.in_focus != self.in_focus
            || seen.active_field.as_deref() != ctx.active_field
    }

    /// Record what this evaluation saw.
    pub fn mark_evaluated(&mut self, ctx: &RenderContext<'_>) {
        self.seen = Some(Seen {
            in_focus: self.in_focus,
            active_field: ctx.active_field.map(String::from),
        });
    }

    /// Drop the cached widget.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Widget for this field: override, then `ui:widget`, then the type default.
    pub fn resolve_widget(
        &mut self,
        schema: &SchemaNode,
        ui: &UiNode,
        registry: &WidgetRegistry,
    ) -> Rc<dyn Widget> {
        if let Some(widget) = &self.cache {
            return Rc::clone(widget);
        }
        let fallback = default_for(schema);
        let widget = self
            .override_widget
            .clone()
            .or_else(|| ui.widget().and_then(|tag| registry.get(tag)))
            .or_else(|| registry.get(fallback))
            .unwrap_or_else(|| Rc::new(BuiltinWidget::new(fallback, WidgetCapabilities::default())));
        self.cache = Some(Rc::clone(&widget));
        widget
    }

    /// Take focus and make this field the form's active field.
    pub fn on_focus(&mut self, form: &Form) {
        self.in_focus = true;
        form.set_field(&self.path);
    }

    pub fn on_blur(&mut self) {
        self.in_focus = false;
    }

    /// The label shown above the field, if any.
    ///
    /// Empty unfocused fields show their text as a placeholder instead.
    pub fn compute_title(&self, info: &FieldInfo<'_>) -> Option<String> {
        if !self.in_focus && is_empty_value(info.value) {
            return None;
        }
        let label_less = info.ui.flag(UI_NO_LABEL) || title_disabled(info);
        if label_less && !info.ui.flag(UI_TOGGLEABLE) {
            return None;
        }
        Some(self.title_text(info))
    }

    /// Placeholder text: the title while the field is empty and unfocused.
    pub fn compute_placeholder(&self, info: &FieldInfo<'_>) -> String {
        if self.in_focus || !is_empty_value(info.value) {
            return String::new();
        }
        if title_disabled(info) && !info.ui.flag(UI_TOGGLEABLE) {
            return String::new();
        }
        self.title_text(info)
    }

    /// Whether errors are displayed for this field.
    ///
    /// The first time errors show, the current value is recorded so a
    /// later edit can tell whether the user changed it.
    pub fn compute_has_error(
        &self,
        schema: &SchemaNode,
        errors: Option<&mut ErrorTree>,
        value: &Value,
        capabilities: WidgetCapabilities,
    ) -> bool {
        let Some(errors) = errors else {
            return false;
        };
        let shown = !schema.is_object()
            && (!schema.is_array() || !capabilities.hideable)
            && errors.has_messages()
            && (!errors.hidden || !capabilities.hideable);
        if shown && errors.last_value.is_none() {
            errors.last_value = Some(value.clone());
        }
        shown
    }

    fn title_text(&self, info: &FieldInfo<'_>) -> String {
        let key = path::last(&self.path);
        let template = info
            .ui
            .directive(UI_TITLE)
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| info.schema.title.clone())
            .unwrap_or_else(|| humanize(key));
        let value = match info.value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        let mut title = template
            .replace("%key%", key)
            .replace("%name%", &self.path)
            .replace("%value%", &value);
        if info.required {
            title.push('*');
        }
        title
    }
}

fn title_disabled(info: &FieldInfo<'_>) -> bool {
    info.ui.directive(UI_TITLE) == Some(&Value::Bool(false))
        || info.schema.is_object()
        || info.capabilities.owns_title
}

/// `"firstName"` and `"first_name"` both become `"First name"`.
pub fn humanize(key: &str) -> String {
    let mut words = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for c in key.chars() {
        if c == '_' || c == '-' {
            words.push(' ');
            prev_lower = false;
        } else if c.is_uppercase() && prev_lower {
            words.push(' ');
            words.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            words.extend(c.to_lowercase());
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    let mut chars = words.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
