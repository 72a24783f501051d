//! Form events - cancelable, default-preventable transitions.
//!
//! Every externally observable transition is wrapped in a [`FormEvent`]
//! carrying a typed snapshot of the state it concerns. Host handlers get
//! the event, may edit its params or call [`FormEvent::prevent_default`],
//! and hand back a [`Deferred`] that is either ready or still pending.
//! The engine reads the params only after the handler has settled.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::FormError;
use crate::propagation::UpdateRequest;
use crate::state::ErrorTree;

/// Transition kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Change,
    Cancel,
    Submit,
    Success,
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Change => "change",
            EventKind::Cancel => "cancel",
            EventKind::Submit => "submit",
            EventKind::Success => "success",
            EventKind::Error => "error",
        };
        f.write_str(name)
    }
}

/// One transition in flight.
#[derive(Debug, Clone)]
pub struct FormEvent<P> {
    kind: EventKind,
    pub params: P,
    prevented: bool,
}

impl<P> FormEvent<P> {
    pub fn new(kind: EventKind, params: P) -> Self {
        Self {
            kind,
            params,
            prevented: false,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Suppress the engine's default follow-up action.
    pub fn prevent_default(&mut self) {
        self.prevented = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.prevented
    }

    /// Fail this event. A failure raised after [`prevent_default`](Self::prevent_default)
    /// remembers it, and the engine then skips the error follow-up.
    pub fn reject(self, failure: impl Into<HandlerFailure>) -> HandlerFailure {
        let failure = failure.into();
        if self.prevented && !failure.is_prevented() {
            HandlerFailure::Prevented(Box::new(failure))
        } else {
            failure
        }
    }

    pub fn into_flow(self) -> Flow<P> {
        if self.prevented {
            Flow::Cancelled
        } else {
            Flow::Continue(self.params)
        }
    }
}

/// Result of a handler stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow<P> {
    /// Run the default action with these (possibly edited) params.
    Continue(P),
    /// Skip the default action.
    Cancelled,
}

/// A handler failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerFailure {
    /// A generic failure; surfaces as a single `Error` message.
    #[error("{0}")]
    Message(String),
    /// A caller-supplied raw error document, shaped like the schema.
    #[error("{}", summarize(.0))]
    Errors(Value),
    /// A failure raised by a handler that also prevented the default.
    #[error("{0}")]
    Prevented(Box<HandlerFailure>),
}

fn summarize(errors: &Value) -> String {
    format!("error document with {} top-level entries", errors.as_object().map_or(0, |m| m.len()))
}

impl HandlerFailure {
    pub fn message(msg: impl fmt::Display) -> Self {
        HandlerFailure::Message(msg.to_string())
    }

    pub fn errors(errors: Value) -> Self {
        HandlerFailure::Errors(errors)
    }

    pub fn is_prevented(&self) -> bool {
        matches!(self, HandlerFailure::Prevented(_))
    }

    /// The raw error document this failure contributes.
    pub fn into_error_schema(self) -> Value {
        match self {
            HandlerFailure::Message(msg) => json!({ "Error": [msg] }),
            HandlerFailure::Errors(errors) => errors,
            HandlerFailure::Prevented(inner) => (*inner).into_error_schema(),
        }
    }
}

impl From<String> for HandlerFailure {
    fn from(msg: String) -> Self {
        HandlerFailure::Message(msg)
    }
}

impl From<&str> for HandlerFailure {
    fn from(msg: &str) -> Self {
        HandlerFailure::Message(msg.to_string())
    }
}

pub type Outcome<P> = Result<Flow<P>, HandlerFailure>;

/// A handler result that is either available now or still pending.
pub enum Deferred<P> {
    Ready(Outcome<P>),
    Pending(LocalBoxFuture<'static, Outcome<P>>),
}

impl<P: 'static> Deferred<P> {
    pub fn pending(fut: impl Future<Output = Outcome<P>> + 'static) -> Self {
        Deferred::Pending(fut.boxed_local())
    }

    pub fn fail(failure: impl Into<HandlerFailure>) -> Self {
        Deferred::Ready(Err(failure.into()))
    }

    /// Wait for the outcome; ready results resolve without suspending.
    pub async fn settle(self) -> Outcome<P> {
        match self {
            Deferred::Ready(outcome) => outcome,
            Deferred::Pending(fut) => fut.await,
        }
    }
}

impl<P> From<FormEvent<P>> for Deferred<P> {
    fn from(event: FormEvent<P>) -> Self {
        Deferred::Ready(Ok(event.into_flow()))
    }
}

impl<P> From<Outcome<P>> for Deferred<P> {
    fn from(outcome: Outcome<P>) -> Self {
        Deferred::Ready(outcome)
    }
}

impl<P> fmt::Debug for Deferred<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Ready(_) => f.write_str("Deferred::Ready"),
            Deferred::Pending(_) => f.write_str("Deferred::Pending"),
        }
    }
}

/// A host callback for one event kind.
pub type Handler<P> = Rc<dyn Fn(FormEvent<P>) -> Deferred<P>>;

/// A handler that lets every event through unchanged.
pub fn passthrough<P: 'static>() -> Handler<P> {
    Rc::new(|event: FormEvent<P>| event.into())
}

/// Build an event and hand it to the host handler.
pub fn dispatch<P>(handler: &Handler<P>, kind: EventKind, params: P) -> Deferred<P> {
    debug!(%kind, "dispatching form event");
    handler(FormEvent::new(kind, params))
}

/// Settle a handler result and continue with `on_resolve`.
///
/// With no reject path, a failure is not swallowed: it comes back as
/// `FormError::UnhandledRejection`.
pub async fn run<P: 'static, R>(
    kind: EventKind,
    deferred: Deferred<P>,
    on_resolve: impl FnOnce(Flow<P>) -> R,
) -> Result<R, FormError> {
    match deferred.settle().await {
        Ok(flow) => Ok(on_resolve(flow)),
        Err(failure) => {
            warn!(%kind, %failure, "unhandled rejection");
            Err(FormError::UnhandledRejection { kind, failure })
        }
    }
}

/// Settle a handler result, routing failures to `on_reject`.
pub async fn run_or_else<P: 'static, R>(
    deferred: Deferred<P>,
    on_resolve: impl FnOnce(Flow<P>) -> R,
    on_reject: impl FnOnce(HandlerFailure) -> R,
) -> R {
    match deferred.settle().await {
        Ok(flow) => on_resolve(flow),
        Err(failure) => on_reject(failure),
    }
}

// --- Event payloads ---

/// A field edit.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeParams {
    pub name: String,
    pub value: Value,
    /// Snapshot of all values at dispatch time.
    pub values: Value,
    pub metas: Value,
    pub next_meta: Option<Value>,
    pub next_errors: Option<ErrorTree>,
    /// Skip the host handler and apply directly.
    pub silent: bool,
    /// Paths to mark dirty; starts with `name`.
    pub update: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelParams {
    pub values: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitParams {
    /// Values after disabled (and optionally empty) fields were filtered.
    pub values: Value,
    /// Set by the handler; forwarded to the success event.
    pub response: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuccessParams {
    pub values: Value,
    pub response: Option<Value>,
    pub update: UpdateRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorParams {
    pub errors: ErrorTree,
    /// Messages keyed by paths the schema does not describe.
    pub exceptions: BTreeMap<String, Vec<String>>,
    pub update: UpdateRequest,
}
