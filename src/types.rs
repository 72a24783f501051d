//! Core types and configuration for the form engine.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde_json::{json, Value};

use crate::widget::WidgetRegistry;

/// Prefix shared by every ui-schema directive.
pub const UI_PREFIX: &str = "ui:";
pub const UI_WIDGET: &str = "ui:widget";
pub const UI_TITLE: &str = "ui:title";
pub const UI_NO_LABEL: &str = "ui:noLabel";
pub const UI_TOGGLEABLE: &str = "ui:toggleable";
pub const UI_DISABLED: &str = "ui:disabled";
pub const UI_READONLY: &str = "ui:readonly";
pub const UI_OPTIONS: &str = "ui:options";
/// Selects a `oneOf`/`anyOf` branch by index.
pub const UI_BRANCH: &str = "ui:branch";

/// Widget name that hides a field (and exempts it from required checks).
pub const WIDGET_HIDDEN: &str = "hidden";

/// Delay before submit evaluates required fields, letting a pending blur settle.
pub const DEFAULT_SUBMIT_GRACE: Duration = Duration::from_millis(50);

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// True for `null`, `""`, `[]` and `{}`.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Comparable form of a value: `null` and `""` coincide, and `5` equals `"5"`.
pub fn normalized(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Visibility and label of a form button.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ButtonConfig {
    /// Shown with its default label.
    #[default]
    Default,
    Hidden,
    Label(String),
}

impl ButtonConfig {
    /// The label to show, or `None` when hidden.
    pub fn label(&self, fallback: &str) -> Option<String> {
        match self {
            ButtonConfig::Default => Some(fallback.to_string()),
            ButtonConfig::Hidden => None,
            ButtonConfig::Label(l) => Some(l.clone()),
        }
    }
}

/// Inputs compared by identity: a new `Arc` means a new input.
#[derive(Debug, Clone)]
pub struct FormProps {
    pub schema: Arc<Value>,
    pub ui_schema: Arc<Value>,
    pub form_data: Arc<Value>,
    pub error_schema: Arc<Value>,
    /// Falls back to the shape of `form_data` when absent.
    pub meta_schema: Option<Arc<Value>>,
}

impl Default for FormProps {
    fn default() -> Self {
        FormProps {
            schema: Arc::new(json!({ "type": "object", "properties": {} })),
            ui_schema: Arc::new(json!({})),
            form_data: Arc::new(json!({})),
            error_schema: Arc::new(json!({})),
            meta_schema: None,
        }
    }
}

impl FormProps {
    /// Props that differ from `self` only in the given form data.
    pub fn with_form_data(&self, form_data: impl Into<Arc<Value>>) -> Self {
        FormProps {
            form_data: form_data.into(),
            ..self.clone()
        }
    }
}

/// Construction options for a form.
#[derive(Clone)]
pub struct FormOptions {
    pub name: Option<String>,
    pub props: FormProps,
    /// Merged over the built-in widgets.
    pub widgets: WidgetRegistry,
    /// Strip empty leaves (except required ones) from submitted values.
    pub filter_empty_values: bool,
    pub submit_button: ButtonConfig,
    pub cancel_button: ButtonConfig,
    /// Pointer targets matching this pattern count as inside the form.
    /// Defaults to `^{form id}-field`.
    pub inside_click_pattern: Option<Regex>,
    pub submit_grace: Duration,
}

impl FormOptions {
    /// Create options for a schema with everything else defaulted.
    pub fn new(schema: impl Into<Arc<Value>>) -> Self {
        Self {
            name: None,
            props: FormProps {
                schema: schema.into(),
                ..FormProps::default()
            },
            widgets: WidgetRegistry::default(),
            filter_empty_values: false,
            submit_button: ButtonConfig::Default,
            cancel_button: ButtonConfig::Default,
            inside_click_pattern: None,
            submit_grace: DEFAULT_SUBMIT_GRACE,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn ui_schema(mut self, ui_schema: impl Into<Arc<Value>>) -> Self {
        self.props.ui_schema = ui_schema.into();
        self
    }

    pub fn form_data(mut self, form_data: impl Into<Arc<Value>>) -> Self {
        self.props.form_data = form_data.into();
        self
    }

    pub fn error_schema(mut self, error_schema: impl Into<Arc<Value>>) -> Self {
        self.props.error_schema = error_schema.into();
        self
    }

    pub fn meta_schema(mut self, meta_schema: impl Into<Arc<Value>>) -> Self {
        self.props.meta_schema = Some(meta_schema.into());
        self
    }

    pub fn widgets(mut self, widgets: WidgetRegistry) -> Self {
        self.widgets = widgets;
        self
    }

    pub fn filter_empty_values(mut self, filter: bool) -> Self {
        self.filter_empty_values = filter;
        self
    }

    pub fn submit_button(mut self, button: ButtonConfig) -> Self {
        self.submit_button = button;
        self
    }

    pub fn cancel_button(mut self, button: ButtonConfig) -> Self {
        self.cancel_button = button;
        self
    }

    pub fn inside_click_pattern(mut self, pattern: Regex) -> Self {
        self.inside_click_pattern = Some(pattern);
        self
    }

    pub fn submit_grace(mut self, grace: Duration) -> Self {
        self.submit_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values() {
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!([])));
        assert!(is_empty_value(&json!({})));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
        assert!(!is_empty_value(&json!("x")));
    }

    #[test]
    fn normalized_coerces_scalars() {
        assert_eq!(normalized(None), "");
        assert_eq!(normalized(Some(&json!(null))), "");
        assert_eq!(normalized(Some(&json!(5))), normalized(Some(&json!("5"))));
        assert_ne!(normalized(Some(&json!(5))), normalized(Some(&json!(6))));
    }

    #[test]
    fn button_labels() {
        assert_eq!(ButtonConfig::Default.label("Submit"), Some("Submit".into()));
        assert_eq!(ButtonConfig::Hidden.label("Submit"), None);
        assert_eq!(
            ButtonConfig::Label("Send".into()).label("Submit"),
            Some("Send".into())
        );
    }

    #[test]
    fn options_builder_sets_props() {
        let opts = FormOptions::new(json!({"type": "object"}))
            .form_data(json!({"a": 1}))
            .filter_empty_values(true)
            .submit_grace(Duration::ZERO);
        assert_eq!(*opts.props.form_data, json!({"a": 1}));
        assert!(opts.filter_empty_values);
        assert!(opts.props.meta_schema.is_none());
        assert_eq!(opts.submit_grace, Duration::ZERO);
    }

    #[test]
    fn with_form_data_keeps_other_identities() {
        let props = FormProps::default();
        let next = props.with_form_data(json!({"x": 1}));
        assert!(Arc::ptr_eq(&props.schema, &next.schema));
        assert!(!Arc::ptr_eq(&props.form_data, &next.form_data));
    }
}
