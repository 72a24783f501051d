//! Schema Form
//!
//! A headless engine for forms described by JSON Schema plus a ui-schema.
//!
//! The engine normalizes the schema pair into a canonical structure, keeps
//! values, errors and metas shaped like that structure, routes every
//! mutation through a cancelable [`FormEvent`], and tracks which field
//! paths changed so renderers only recompute what is dirty.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use futures::executor::block_on;
//! use schema_form::{ChangeOptions, Form, FormHandlers, FormOptions, SubmitOutcome};
//! use serde_json::json;
//!
//! let options = FormOptions::new(json!({
//!     "type": "object",
//!     "required": ["name"],
//!     "properties": { "name": { "type": "string" } }
//! }))
//! .submit_grace(Duration::ZERO);
//!
//! let form = Form::new(options, FormHandlers::new()).unwrap();
//! form.attach();
//!
//! // "name" is required and still empty
//! let outcome = block_on(form.submit()).unwrap();
//! assert!(matches!(outcome, SubmitOutcome::Rejected { .. }));
//!
//! block_on(form.on_change(json!("Ann"), "name", ChangeOptions::default())).unwrap();
//! let outcome = block_on(form.submit()).unwrap();
//! assert!(matches!(
//!     outcome,
//!     SubmitOutcome::Submitted { ref values, .. } if *values == json!({"name": "Ann"})
//! ));
//! ```
//!
//! # Paths
//!
//! | Form | Example | Used by |
//! |------|---------|---------|
//! | concrete | `"tags.0.label"` | values, errors, metas, dirty set |
//! | wildcard | `"tags[].label"` | required index |
//! | root | `""` | the whole form |

mod error;
mod event;
mod field;
mod form;
mod loader;
pub mod path;
mod propagation;
mod resolver;
mod state;
mod submit;
mod types;
mod widget;

pub use error::{FormError, LoadError, SchemaResolutionError};
pub use event::{
    dispatch, passthrough, run, run_or_else, CancelParams, ChangeParams, Deferred, ErrorParams,
    EventKind, Flow, FormEvent, Handler, HandlerFailure, Outcome, SubmitParams, SuccessParams,
};
pub use field::{humanize, FieldController, FieldInfo, RenderContext};
pub use form::{
    Buttons, ChangeOptions, ChangeOutcome, FieldView, Form, FormHandlers, FormState, NextErrors,
    SubmitOutcome, SubmitState, MAX_MINIMUM_ITEMS,
};
pub use loader::{is_url, load_json, load_json_auto, load_json_str, navigate_fragment};
pub use propagation::{expand, DirtySet, UpdateRequest};
pub use resolver::{resolve, NodeKind, RequiredPaths, ScalarType, SchemaNode, Structure, UiNode};
pub use state::{
    collect_exceptions, empty_value, project_errors, project_metas, project_values, ErrorTree,
};
pub use submit::{filter_disabled, filter_empty, is_disabled, missing_required};
pub use types::{
    is_empty_value, json_type_name, normalized, ButtonConfig, FormOptions, FormProps,
    DEFAULT_SUBMIT_GRACE, UI_DISABLED, UI_NO_LABEL, UI_OPTIONS, UI_READONLY, UI_TITLE,
    UI_TOGGLEABLE, UI_WIDGET, WIDGET_HIDDEN,
};
pub use widget::{
    default_for, normalize_tag, BuiltinWidget, Widget, WidgetCapabilities, WidgetRegistry,
};

#[cfg(feature = "remote")]
pub use loader::load_json_url;
