//! The form engine: state trees, transitions and commit ordering.
//!
//! A [`Form`] is a cheap `Clone` handle. All transitions that involve a host
//! handler are `async`: the engine builds the event, releases its state,
//! awaits the handler and only then reads the (possibly edited) params and
//! commits. Other transitions may run while a handler is pending.
//!
//! Commits replace values, errors and metas together. While the form is
//! detached they are queued and later ones build on earlier ones;
//! [`Form::attach`] flushes them in order.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::FormError;
use crate::event::{
    self, dispatch, passthrough, CancelParams, ChangeParams, Deferred, ErrorParams, EventKind,
    Flow, FormEvent, Handler, HandlerFailure, SubmitParams, SuccessParams,
};
use crate::field::{FieldController, FieldInfo, RenderContext};
use crate::path;
use crate::propagation::{expand, DirtySet, UpdateRequest};
use crate::resolver::{resolve, SchemaNode, Structure, UiNode};
use crate::state::{
    collect_exceptions, empty_value, project_errors, project_metas, project_values, ErrorTree,
};
use crate::submit::{filter_disabled, filter_empty, is_disabled, missing_required};
use crate::types::{normalized, FormOptions, FormProps, UI_OPTIONS, UI_READONLY};
use crate::widget::{Widget, WidgetRegistry};

/// Values, errors and metas, replaced together on every commit.
#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    pub values: Value,
    pub errors: ErrorTree,
    pub metas: Value,
}

impl FormState {
    fn project(props: &FormProps, structure: &Structure) -> Self {
        let values = project_values(&props.form_data, &structure.schema);
        let errors = project_errors(&props.error_schema, &structure.schema);
        let metas = project_metas(
            props.meta_schema.as_deref().unwrap_or(&values),
            &structure.schema,
            &structure.ui_schema,
        );
        FormState {
            values,
            errors,
            metas,
        }
    }
}

/// Where the submit pipeline currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitState {
    #[default]
    Idle,
    Validating,
    Submitting,
    /// A required field was empty; cleared by the next change or submit.
    Rejected,
}

/// Host callbacks. Unset handlers let every event through.
#[derive(Clone)]
pub struct FormHandlers {
    on_change: Handler<ChangeParams>,
    on_submit: Handler<SubmitParams>,
    on_cancel: Handler<CancelParams>,
    on_success: Handler<SuccessParams>,
    on_error: Handler<ErrorParams>,
    on_init: Option<Rc<dyn Fn(&Value)>>,
}

impl Default for FormHandlers {
    fn default() -> Self {
        Self {
            on_change: passthrough(),
            on_submit: passthrough(),
            on_cancel: passthrough(),
            on_success: passthrough(),
            on_error: passthrough(),
            on_init: None,
        }
    }
}

impl FormHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_change(
        mut self,
        handler: impl Fn(FormEvent<ChangeParams>) -> Deferred<ChangeParams> + 'static,
    ) -> Self {
        self.on_change = Rc::new(handler);
        self
    }

    pub fn on_submit(
        mut self,
        handler: impl Fn(FormEvent<SubmitParams>) -> Deferred<SubmitParams> + 'static,
    ) -> Self {
        self.on_submit = Rc::new(handler);
        self
    }

    pub fn on_cancel(
        mut self,
        handler: impl Fn(FormEvent<CancelParams>) -> Deferred<CancelParams> + 'static,
    ) -> Self {
        self.on_cancel = Rc::new(handler);
        self
    }

    pub fn on_success(
        mut self,
        handler: impl Fn(FormEvent<SuccessParams>) -> Deferred<SuccessParams> + 'static,
    ) -> Self {
        self.on_success = Rc::new(handler);
        self
    }

    pub fn on_error(
        mut self,
        handler: impl Fn(FormEvent<ErrorParams>) -> Deferred<ErrorParams> + 'static,
    ) -> Self {
        self.on_error = Rc::new(handler);
        self
    }

    /// Called once at construction with the projected values.
    pub fn on_init(mut self, handler: impl Fn(&Value) + 'static) -> Self {
        self.on_init = Some(Rc::new(handler));
        self
    }
}

/// Replacement errors for a changed field.
#[derive(Debug, Clone, PartialEq)]
pub enum NextErrors {
    /// A raw error document, projected onto the field's schema.
    Raw(Value),
    Tree(ErrorTree),
}

/// Extras for [`Form::on_change`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeOptions {
    pub next_meta: Option<Value>,
    pub next_errors: Option<NextErrors>,
    /// Apply without consulting the `on_change` handler.
    pub silent: bool,
    /// Additional paths to mark dirty.
    pub update: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    Applied,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Required fields were empty; no submit event was raised.
    Rejected { missing: Vec<String> },
    Submitted {
        values: Value,
        response: Option<Value>,
    },
    /// The submit handler prevented the default action.
    Cancelled,
    /// The submit handler failed; its errors were routed to the error event.
    Failed {
        errors: ErrorTree,
        exceptions: BTreeMap<String, Vec<String>>,
    },
}

/// Labels of the form buttons; `None` when hidden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buttons {
    pub submit: Option<String>,
    pub cancel: Option<String>,
}

/// Everything a renderer needs for one field.
#[derive(Debug, Clone)]
pub struct FieldView {
    pub path: String,
    pub value: Value,
    pub errors: ErrorTree,
    pub meta: Value,
    pub schema: SchemaNode,
    pub ui: UiNode,
    pub widget: Rc<dyn Widget>,
    pub title: Option<String>,
    pub placeholder: String,
    pub has_error: bool,
    pub disabled: bool,
    pub readonly: bool,
    /// Focused and the form's active field.
    pub in_focus: bool,
    pub required: bool,
    pub active_field: Option<String>,
}

struct Commit {
    state: FormState,
    dirty: DirtySet,
    clear_cache: bool,
}

struct FormInner {
    id: String,
    props: FormProps,
    structure: Structure,
    widgets: WidgetRegistry,
    filter_empty_values: bool,
    submit_grace: Duration,
    buttons: Buttons,
    inside_click: Regex,
    current: FormState,
    pending: VecDeque<Commit>,
    attached: bool,
    dirty: DirtySet,
    clear_cache: bool,
    active_field: Option<String>,
    submit_error: bool,
    submit_state: SubmitState,
}

impl FormInner {
    /// The state the next commit builds on.
    fn staged(&self) -> &FormState {
        self.pending.back().map_or(&self.current, |c| &c.state)
    }

    fn commit(&mut self, state: FormState, dirty: DirtySet, clear_cache: bool) {
        let commit = Commit {
            state,
            dirty,
            clear_cache,
        };
        if self.attached {
            self.apply(commit);
        } else {
            debug!(form = %self.id, queued = self.pending.len() + 1, "form detached, commit queued");
            self.pending.push_back(commit);
        }
    }

    fn apply(&mut self, commit: Commit) {
        debug!(form = %self.id, dirty = ?commit.dirty.len(), "commit");
        self.current = commit.state;
        self.dirty = commit.dirty;
        self.clear_cache |= commit.clear_cache;
    }
}

/// Handle to a form engine instance.
#[derive(Clone)]
pub struct Form {
    inner: Rc<RefCell<FormInner>>,
    handlers: Rc<FormHandlers>,
}

impl Form {
    /// Resolve the structure, project the initial trees and call `on_init`.
    ///
    /// The form starts detached; call [`Form::attach`] once it is displayed.
    ///
    /// # Errors
    ///
    /// Fails when the schema cannot be resolved or the inside-click pattern
    /// does not compile.
    pub fn new(options: FormOptions, handlers: FormHandlers) -> Result<Self, FormError> {
        let structure = resolve(&options.props.schema, &options.props.ui_schema)?;
        let state = FormState::project(&options.props, &structure);

        let suffix = match &options.name {
            Some(name) => name.clone(),
            None => Uuid::new_v4().simple().to_string()[..9].to_string(),
        };
        let id = format!("Form__{}", suffix);
        let inside_click = match options.inside_click_pattern {
            Some(pattern) => pattern,
            None => Regex::new(&format!("^{}-field", regex::escape(&id)))?,
        };

        if let Some(on_init) = &handlers.on_init {
            on_init(&state.values);
        }
        debug!(form = %id, required = structure.required.len(), "form created");

        let inner = FormInner {
            id,
            props: options.props,
            structure,
            widgets: WidgetRegistry::builtin().merge(&options.widgets),
            filter_empty_values: options.filter_empty_values,
            submit_grace: options.submit_grace,
            buttons: Buttons {
                submit: options.submit_button.label("Submit"),
                cancel: options.cancel_button.label("Cancel"),
            },
            inside_click,
            current: state,
            pending: VecDeque::new(),
            attached: false,
            dirty: DirtySet::All,
            clear_cache: false,
            active_field: None,
            submit_error: false,
            submit_state: SubmitState::Idle,
        };
        Ok(Form {
            inner: Rc::new(RefCell::new(inner)),
            handlers: Rc::new(handlers),
        })
    }

    // --- Accessors ---

    pub fn id(&self) -> String {
        self.inner.borrow().id.clone()
    }

    /// The committed state (queued commits excluded).
    pub fn state(&self) -> FormState {
        self.inner.borrow().current.clone()
    }

    pub fn values(&self) -> Value {
        self.inner.borrow().current.values.clone()
    }

    pub fn errors(&self) -> ErrorTree {
        self.inner.borrow().current.errors.clone()
    }

    pub fn metas(&self) -> Value {
        self.inner.borrow().current.metas.clone()
    }

    pub fn structure(&self) -> Structure {
        self.inner.borrow().structure.clone()
    }

    pub fn dirty(&self) -> DirtySet {
        self.inner.borrow().dirty.clone()
    }

    pub fn clear_cache(&self) -> bool {
        self.inner.borrow().clear_cache
    }

    pub fn active_field(&self) -> Option<String> {
        self.inner.borrow().active_field.clone()
    }

    /// Set when a submit was rejected for missing required fields.
    pub fn submit_error(&self) -> bool {
        self.inner.borrow().submit_error
    }

    pub fn submit_state(&self) -> SubmitState {
        self.inner.borrow().submit_state
    }

    pub fn buttons(&self) -> Buttons {
        self.inner.borrow().buttons.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.borrow().attached
    }

    pub fn pending_commits(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    // --- Mounting ---

    /// Mark the form displayed and flush queued commits in order.
    pub fn attach(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.attached = true;
        while let Some(commit) = inner.pending.pop_front() {
            inner.apply(commit);
        }
    }

    /// Stop applying commits; later ones queue until the next attach.
    pub fn detach(&self) {
        self.inner.borrow_mut().attached = false;
    }

    // --- Focus ---

    /// Make `name` the active field. An empty name clears it.
    pub fn set_field(&self, name: &str) {
        let mut inner = self.inner.borrow_mut();
        inner.active_field = (!name.is_empty()).then(|| name.to_string());
    }

    /// Pointer pressed on `target_id`; targets outside the form clear focus.
    pub fn on_pointer_down(&self, target_id: &str) {
        let mut inner = self.inner.borrow_mut();
        if !inner.inside_click.is_match(target_id) {
            inner.active_field = None;
        }
    }

    // --- Transitions ---

    /// Apply an edit of the field at `name`.
    ///
    /// # Errors
    ///
    /// Returns `FormError::UnhandledRejection` when the `on_change`
    /// handler fails.
    pub async fn on_change(
        &self,
        value: Value,
        name: &str,
        options: ChangeOptions,
    ) -> Result<ChangeOutcome, FormError> {
        let params = {
            let mut inner = self.inner.borrow_mut();
            if !path::settable(&inner.staged().values, name) {
                warn!(form = %inner.id, name, "change addresses an index past the end of its array");
                return Ok(ChangeOutcome::Cancelled);
            }
            inner.submit_error = false;
            if inner.submit_state == SubmitState::Rejected {
                inner.submit_state = SubmitState::Idle;
            }
            let next_errors = options.next_errors.map(|next| match next {
                NextErrors::Tree(tree) => tree,
                NextErrors::Raw(raw) => match inner.structure.schema.at(name) {
                    Some(node) => project_errors(&raw, node),
                    None => project_errors(&raw, &SchemaNode::string()),
                },
            });
            let staged = inner.staged();
            let mut update = vec![name.to_string()];
            update.extend(options.update);
            ChangeParams {
                name: name.to_string(),
                value,
                values: staged.values.clone(),
                metas: staged.metas.clone(),
                next_meta: options.next_meta,
                next_errors,
                silent: options.silent,
                update,
            }
        };
        let snapshot = (params.values.clone(), params.metas.clone());

        let deferred = if params.silent {
            Deferred::from(FormEvent::new(EventKind::Change, params))
        } else {
            dispatch(&self.handlers.on_change, EventKind::Change, params)
        };
        event::run(EventKind::Change, deferred, |flow| match flow {
            Flow::Continue(params) => self.apply_change(params, snapshot),
            Flow::Cancelled => ChangeOutcome::Cancelled,
        })
        .await
    }

    fn apply_change(&self, params: ChangeParams, snapshot: (Value, Value)) -> ChangeOutcome {
        let mut inner = self.inner.borrow_mut();
        let staged = inner.staged().clone();
        // Trees the handler left alone build on whatever committed meanwhile.
        let mut values = if params.values != snapshot.0 {
            params.values
        } else {
            staged.values
        };
        let mut metas = if params.metas != snapshot.1 {
            params.metas
        } else {
            staged.metas
        };
        let mut errors = staged.errors;

        // The array may have shrunk while the handler was pending.
        if !path::set(&mut values, &params.name, params.value.clone()) {
            warn!(form = %inner.id, name = %params.name, "change target no longer exists");
            return ChangeOutcome::Cancelled;
        }
        if let Some(meta) = params.next_meta {
            path::set(&mut metas, &params.name, meta);
        }
        if let Some(tree) = params.next_errors {
            errors.set(&params.name, tree);
        }
        if let Some(error) = errors.get_mut(&params.name) {
            if error.has_messages() {
                error.hidden =
                    normalized(error.last_value.as_ref()) != normalized(Some(&params.value));
            }
        }

        let mut update = params.update;
        update.extend(path::descendants(&params.name, &params.value));
        let dirty = expand(update);
        inner.commit(
            FormState {
                values,
                errors,
                metas,
            },
            dirty,
            false,
        );
        ChangeOutcome::Applied
    }

    /// Append an item to the array at `name`.
    ///
    /// An array shorter than `ui:options.minimumNumberOfItems` (default 1)
    /// is padded to one past the minimum, which is capped at
    /// [`MAX_MINIMUM_ITEMS`].
    pub async fn add_item(&self, name: &str) -> Result<ChangeOutcome, FormError> {
        let change = {
            let inner = self.inner.borrow();
            let Some(items) = inner.structure.schema.at(name).and_then(SchemaNode::items) else {
                warn!(name, "add_item on a field that is not an array");
                return Ok(ChangeOutcome::Cancelled);
            };
            let ui = inner.structure.ui_schema.at(name);
            let requested = ui
                .and_then(|u| u.directive(UI_OPTIONS))
                .and_then(|o| o.get("minimumNumberOfItems"))
                .and_then(Value::as_u64)
                .unwrap_or(1);
            if requested > MAX_MINIMUM_ITEMS as u64 {
                warn!(name, requested, cap = MAX_MINIMUM_ITEMS, "minimumNumberOfItems capped");
            }
            let minimum = requested.min(MAX_MINIMUM_ITEMS as u64) as usize;
            let empty_ui = UiNode::default();
            let items_ui = ui.and_then(|u| u.child("items")).unwrap_or(&empty_ui);

            let staged = inner.staged();
            let mut value = array_at(&staged.values, name);
            let mut meta = array_at(&staged.metas, name);
            let count = if value.len() < minimum {
                minimum - value.len() + 1
            } else {
                1
            };
            for _ in 0..count {
                let item = empty_value(items);
                meta.push(project_metas(&item, items, items_ui));
                value.push(item);
            }
            (Value::Array(value), Value::Array(meta))
        };
        let (value, meta) = change;
        self.on_change(
            value,
            name,
            ChangeOptions {
                next_meta: Some(meta),
                ..ChangeOptions::default()
            },
        )
        .await
    }

    /// Remove item `index` from the array at `name`, keeping metas and
    /// errors of later items aligned.
    pub async fn remove_item(&self, name: &str, index: usize) -> Result<ChangeOutcome, FormError> {
        let (value, meta, errors) = {
            let inner = self.inner.borrow();
            let staged = inner.staged();
            let mut value = array_at(&staged.values, name);
            if index >= value.len() {
                return Ok(ChangeOutcome::Cancelled);
            }
            value.remove(index);
            let mut meta = array_at(&staged.metas, name);
            if index < meta.len() {
                meta.remove(index);
            }
            let mut errors = staged.errors.get(name).cloned().unwrap_or_default();
            errors.remove_item(index);
            (Value::Array(value), Value::Array(meta), errors)
        };
        self.on_change(
            value,
            name,
            ChangeOptions {
                next_meta: Some(meta),
                next_errors: Some(NextErrors::Tree(errors)),
                ..ChangeOptions::default()
            },
        )
        .await
    }

    /// Validate required fields and run the submit pipeline.
    ///
    /// # Errors
    ///
    /// A failing submit handler is routed to the error event; only a failing
    /// success or error handler surfaces as `FormError::UnhandledRejection`.
    pub async fn submit(&self) -> Result<SubmitOutcome, FormError> {
        let grace = {
            let mut inner = self.inner.borrow_mut();
            inner.active_field = None;
            inner.submit_error = false;
            inner.submit_state = SubmitState::Validating;
            inner.submit_grace
        };
        if !grace.is_zero() {
            smol::Timer::after(grace).await;
        }

        let values = {
            let mut inner = self.inner.borrow_mut();
            let staged = inner.staged().clone();
            let missing = missing_required(&inner.structure, &staged.values, &staged.metas);
            if !missing.is_empty() {
                debug!(form = %inner.id, ?missing, "submit rejected");
                inner.submit_error = true;
                inner.submit_state = SubmitState::Rejected;
                return Ok(SubmitOutcome::Rejected { missing });
            }
            let mut values = filter_disabled(&staged.values, &staged.metas);
            if inner.filter_empty_values {
                values = filter_empty(&values, &inner.structure.required);
            }
            inner.submit_state = SubmitState::Submitting;
            values
        };

        let result = self.run_submit(values).await;
        self.inner.borrow_mut().submit_state = SubmitState::Idle;
        result
    }

    async fn run_submit(&self, values: Value) -> Result<SubmitOutcome, FormError> {
        enum Next {
            Success(SubmitParams),
            Cancelled,
            Failed(HandlerFailure),
        }

        let deferred = dispatch(
            &self.handlers.on_submit,
            EventKind::Submit,
            SubmitParams {
                values,
                response: None,
            },
        );
        let next = event::run_or_else(
            deferred,
            |flow| match flow {
                Flow::Continue(params) => Next::Success(params),
                Flow::Cancelled => Next::Cancelled,
            },
            Next::Failed,
        )
        .await;

        match next {
            Next::Success(params) => {
                self.on_success(params.response.clone()).await?;
                Ok(SubmitOutcome::Submitted {
                    values: params.values,
                    response: params.response,
                })
            }
            Next::Cancelled => Ok(SubmitOutcome::Cancelled),
            Next::Failed(failure) if failure.is_prevented() => {
                debug!(%failure, "submit failed after prevent_default, error event skipped");
                Ok(SubmitOutcome::Cancelled)
            }
            Next::Failed(failure) => {
                let (errors, exceptions) = self.on_error(failure).await?;
                Ok(SubmitOutcome::Failed { errors, exceptions })
            }
        }
    }

    async fn on_success(&self, response: Option<Value>) -> Result<(), FormError> {
        let values = self.inner.borrow().staged().values.clone();
        let deferred = dispatch(
            &self.handlers.on_success,
            EventKind::Success,
            SuccessParams {
                values,
                response,
                update: UpdateRequest::All,
            },
        );
        event::run(EventKind::Success, deferred, |flow| {
            if let Flow::Continue(params) = flow {
                let mut inner = self.inner.borrow_mut();
                let schema = &inner.structure.schema;
                let values = project_values(&params.values, schema);
                let errors = project_errors(&json!({}), schema);
                let metas = inner.staged().metas.clone();
                inner.commit(
                    FormState {
                        values,
                        errors,
                        metas,
                    },
                    expand(params.update),
                    false,
                );
            }
        })
        .await
    }

    async fn on_error(
        &self,
        failure: HandlerFailure,
    ) -> Result<(ErrorTree, BTreeMap<String, Vec<String>>), FormError> {
        let raw = failure.into_error_schema();
        let (errors, exceptions) = {
            let inner = self.inner.borrow();
            let schema = &inner.structure.schema;
            (project_errors(&raw, schema), collect_exceptions(&raw, schema))
        };
        debug!(errors = errors.count(), exceptions = exceptions.len(), "submit failed");
        let deferred = dispatch(
            &self.handlers.on_error,
            EventKind::Error,
            ErrorParams {
                errors: errors.clone(),
                exceptions: exceptions.clone(),
                update: UpdateRequest::All,
            },
        );
        event::run(EventKind::Error, deferred, |flow| match flow {
            Flow::Continue(params) => {
                let mut inner = self.inner.borrow_mut();
                let staged = inner.staged();
                let state = FormState {
                    values: staged.values.clone(),
                    errors: params.errors.clone(),
                    metas: staged.metas.clone(),
                };
                inner.commit(state, expand(params.update), false);
                (params.errors, params.exceptions)
            }
            Flow::Cancelled => (errors, exceptions),
        })
        .await
    }

    /// Raise the cancel event. Returns `false` when the handler prevented it.
    pub async fn cancel(&self) -> Result<bool, FormError> {
        let values = self.inner.borrow().staged().values.clone();
        let deferred = dispatch(&self.handlers.on_cancel, EventKind::Cancel, CancelParams { values });
        event::run(EventKind::Cancel, deferred, |flow| {
            matches!(flow, Flow::Continue(_))
        })
        .await
    }

    /// Re-project values from the most recently received `form_data`.
    pub fn reset(&self) {
        let mut inner = self.inner.borrow_mut();
        let form_data = Arc::clone(&inner.props.form_data);
        Self::replace_values(&mut inner, &form_data);
    }

    /// Re-project values from empty form data.
    pub fn clear_all(&self) {
        let mut inner = self.inner.borrow_mut();
        Self::replace_values(&mut inner, &json!({}));
    }

    fn replace_values(inner: &mut FormInner, raw: &Value) {
        let values = project_values(raw, &inner.structure.schema);
        let staged = inner.staged();
        let state = FormState {
            values,
            errors: staged.errors.clone(),
            metas: staged.metas.clone(),
        };
        inner.commit(state, DirtySet::All, false);
    }

    /// Take new inputs. Each one is compared by identity with the last.
    ///
    /// # Errors
    ///
    /// A new schema or ui-schema that cannot be resolved leaves the form
    /// untouched.
    pub fn update_props(&self, props: FormProps) -> Result<(), FormError> {
        let mut inner = self.inner.borrow_mut();
        let old = &inner.props;
        let structure_changed = !Arc::ptr_eq(&old.schema, &props.schema)
            || !Arc::ptr_eq(&old.ui_schema, &props.ui_schema);
        let data_changed = structure_changed || !Arc::ptr_eq(&old.form_data, &props.form_data);
        let errors_changed =
            structure_changed || !Arc::ptr_eq(&old.error_schema, &props.error_schema);
        let metas_changed = structure_changed
            || match (&old.meta_schema, &props.meta_schema) {
                (Some(a), Some(b)) => !Arc::ptr_eq(a, b),
                (None, None) => false,
                _ => true,
            };
        if !(data_changed || errors_changed || metas_changed) {
            return Ok(());
        }

        if structure_changed {
            let structure = resolve(&props.schema, &props.ui_schema)?;
            inner.structure = structure;
        }
        let schema = &inner.structure.schema;
        let staged = inner.staged();
        let values = if data_changed {
            project_values(&props.form_data, schema)
        } else {
            staged.values.clone()
        };
        let errors = if errors_changed {
            project_errors(&props.error_schema, schema)
        } else {
            staged.errors.clone()
        };
        let metas = if metas_changed {
            project_metas(
                props.meta_schema.as_deref().unwrap_or(&values),
                schema,
                &inner.structure.ui_schema,
            )
        } else {
            staged.metas.clone()
        };
        debug!(
            form = %inner.id,
            structure_changed, data_changed, errors_changed, metas_changed,
            "props updated"
        );
        inner.props = props;
        inner.commit(
            FormState {
                values,
                errors,
                metas,
            },
            DirtySet::All,
            structure_changed,
        );
        Ok(())
    }

    // --- Rendering ---

    /// Compute the view of one field, or `None` when it need not recompute
    /// (or names nothing in the schema).
    pub fn evaluate(&self, field: &mut FieldController) -> Option<FieldView> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let ctx = RenderContext {
            dirty: &inner.dirty,
            clear_cache: inner.clear_cache,
            active_field: inner.active_field.as_deref(),
        };
        if !field.should_recompute(&ctx) {
            return None;
        }
        if ctx.clear_cache {
            field.invalidate();
        }
        let name = field.path().to_string();
        let schema = inner.structure.schema.at(&name)?;
        let empty_ui = UiNode::default();
        let ui = inner.structure.ui_schema.at(&name).unwrap_or(&empty_ui);
        let widget = field.resolve_widget(schema, ui, &inner.widgets);
        let capabilities = widget.capabilities();

        let value = path::get(&inner.current.values, &name)
            .cloned()
            .unwrap_or(Value::Null);
        let meta = path::get(&inner.current.metas, &name)
            .cloned()
            .unwrap_or_else(|| json!({}));
        let required = inner.structure.required.contains(&name);
        let info = FieldInfo {
            schema,
            ui,
            value: &value,
            required,
            capabilities,
        };
        let title = field.compute_title(&info);
        let placeholder = field.compute_placeholder(&info);
        let has_error = field.compute_has_error(
            schema,
            inner.current.errors.get_mut(&name),
            &value,
            capabilities,
        );
        let errors = inner.current.errors.get(&name).cloned().unwrap_or_default();
        if let Some(seen) = &errors.last_value {
            // Queued commits replace `current` on attach; carry the first display over.
            for commit in inner.pending.iter_mut() {
                if let Some(queued) = commit.state.errors.get_mut(&name) {
                    if queued.last_value.is_none() && queued.has_messages() {
                        queued.last_value = Some(seen.clone());
                    }
                }
            }
        }
        let disabled = is_disabled(&inner.current.metas, &name);
        let in_focus = field.in_focus() && ctx.active_field == Some(name.as_str());
        field.mark_evaluated(&ctx);

        Some(FieldView {
            value,
            errors,
            meta,
            schema: schema.clone(),
            readonly: ui.flag(UI_READONLY),
            ui: ui.clone(),
            widget,
            title,
            placeholder,
            has_error,
            disabled,
            in_focus,
            required,
            active_field: ctx.active_field.map(String::from),
            path: name,
        })
    }

    /// Evaluate every field, then drop the one-shot cache-clear flag.
    pub fn render(&self, fields: &mut [FieldController]) -> Vec<FieldView> {
        let views: Vec<FieldView> = fields.iter_mut().filter_map(|f| self.evaluate(f)).collect();
        self.inner.borrow_mut().clear_cache = false;
        views
    }
}

/// Upper bound for `ui:options.minimumNumberOfItems`.
pub const MAX_MINIMUM_ITEMS: usize = 100;

fn array_at(tree: &Value, name: &str) -> Vec<Value> {
    path::get(tree, name)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
