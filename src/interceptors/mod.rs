//! Interceptors: named triples of optional stage handlers.
//!
//! An [`Interceptor`] carries up to three stage handlers. `enter` runs during
//! the forward phase, `leave` during the unwind phase in reverse order, and
//! `error` during the unwind phase while an error is propagating. Handlers
//! are plain function values over the context, not a trait hierarchy, so an
//! interceptor may carry any subset of the three.
//!
//! The free constructors below cover the common shapes: [`before`]/[`after`]
//! for one-sided work, [`around`] for paired work, [`handler`] for
//! request-to-response endpoints, and [`middleware`]/[`on_request`]/
//! [`on_response`] for record transformations.

use std::fmt;
use std::sync::Arc;

use crate::chain::{Cause, Eventual, Stage, StageError};
use crate::context::Context;
use crate::http::{Request, Response};

/// An `enter` or `leave` stage handler.
pub type StageFn = Arc<dyn Fn(Context) -> Eventual + Send + Sync>;

/// An `error` stage handler; receives the context with the error removed,
/// plus the propagating error record.
pub type ErrorFn = Arc<dyn Fn(Context, StageError) -> Eventual + Send + Sync>;

/// A named triple of optional stage handlers.
#[derive(Clone)]
pub struct Interceptor {
    name: String,
    enter: Option<StageFn>,
    leave: Option<StageFn>,
    error: Option<ErrorFn>,
}

impl Interceptor {
    /// An interceptor with no stage handlers.
    ///
    /// The name must be non-empty; it is carried into error records and log
    /// events for diagnostics.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enter: None,
            leave: None,
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach an `enter` stage handler.
    pub fn on_enter<F, R>(mut self, f: F) -> Self
    where
        F: Fn(Context) -> R + Send + Sync + 'static,
        R: Into<Eventual>,
    {
        self.enter = Some(Arc::new(move |context| f(context).into()));
        self
    }

    /// Attach a `leave` stage handler.
    pub fn on_leave<F, R>(mut self, f: F) -> Self
    where
        F: Fn(Context) -> R + Send + Sync + 'static,
        R: Into<Eventual>,
    {
        self.leave = Some(Arc::new(move |context| f(context).into()));
        self
    }

    /// Attach an `error` stage handler.
    pub fn on_error<F, R>(mut self, f: F) -> Self
    where
        F: Fn(Context, StageError) -> R + Send + Sync + 'static,
        R: Into<Eventual>,
    {
        self.error = Some(Arc::new(move |context, error| f(context, error).into()));
        self
    }

    pub fn has_enter(&self) -> bool {
        self.enter.is_some()
    }

    pub fn has_leave(&self) -> bool {
        self.leave.is_some()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub(crate) fn stage_fn(&self, stage: Stage) -> Option<&StageFn> {
        match stage {
            Stage::Enter => self.enter.as_ref(),
            Stage::Leave => self.leave.as_ref(),
            Stage::Error => None,
        }
    }

    pub(crate) fn error_fn(&self) -> Option<&ErrorFn> {
        self.error.as_ref()
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("name", &self.name)
            .field("enter", &self.enter.is_some())
            .field("leave", &self.leave.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

/// An interceptor that calls `f` during the enter stage.
pub fn before<F, R>(name: impl Into<String>, f: F) -> Interceptor
where
    F: Fn(Context) -> R + Send + Sync + 'static,
    R: Into<Eventual>,
{
    Interceptor::named(name).on_enter(f)
}

/// An interceptor that calls `f` during the leave stage.
pub fn after<F, R>(name: impl Into<String>, f: F) -> Interceptor
where
    F: Fn(Context) -> R + Send + Sync + 'static,
    R: Into<Eventual>,
{
    Interceptor::named(name).on_leave(f)
}

/// An interceptor that calls `enter` during the enter stage and `leave`
/// during the leave stage.
pub fn around<F1, R1, F2, R2>(name: impl Into<String>, enter: F1, leave: F2) -> Interceptor
where
    F1: Fn(Context) -> R1 + Send + Sync + 'static,
    R1: Into<Eventual>,
    F2: Fn(Context) -> R2 + Send + Sync + 'static,
    R2: Into<Eventual>,
{
    Interceptor::named(name).on_enter(enter).on_leave(leave)
}

/// An interceptor that calls `f` during the error stage.
pub fn error_handler<F, R>(name: impl Into<String>, f: F) -> Interceptor
where
    F: Fn(Context, StageError) -> R + Send + Sync + 'static,
    R: Into<Eventual>,
{
    Interceptor::named(name).on_error(f)
}

/// An interceptor that calls `f` on the context's request and stores the
/// result as the context's response.
///
/// Fails the stage when no request is present.
pub fn handler<F>(name: impl Into<String>, f: F) -> Interceptor
where
    F: Fn(&Request) -> Response + Send + Sync + 'static,
{
    Interceptor::named(name).on_enter(move |context: Context| -> Result<Context, Cause> {
        let response = match context.request() {
            Some(request) => f(request),
            None => return Err(Cause::msg("no request in context")),
        };
        Ok(context.with_response(response))
    })
}

/// An interceptor that transforms the request on enter and the response on
/// leave.
pub fn middleware<F1, F2>(name: impl Into<String>, on_req: F1, on_resp: F2) -> Interceptor
where
    F1: Fn(Request) -> Request + Send + Sync + 'static,
    F2: Fn(Response) -> Response + Send + Sync + 'static,
{
    Interceptor::named(name)
        .on_enter(move |context: Context| context.map_request(&on_req))
        .on_leave(move |context: Context| context.map_response(&on_resp))
}

/// An interceptor that transforms the request during the enter stage.
pub fn on_request<F>(name: impl Into<String>, f: F) -> Interceptor
where
    F: Fn(Request) -> Request + Send + Sync + 'static,
{
    Interceptor::named(name).on_enter(move |context: Context| context.map_request(&f))
}

/// An interceptor that transforms the response during the leave stage.
pub fn on_response<F>(name: impl Into<String>, f: F) -> Interceptor
where
    F: Fn(Response) -> Response + Send + Sync + 'static,
{
    Interceptor::named(name).on_leave(move |context: Context| context.map_response(&f))
}
