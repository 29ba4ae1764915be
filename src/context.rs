//! The per-execution context threaded through an interceptor chain.
//!
//! A [`Context`] is a keyed record with functional update semantics: every
//! accessor that writes consumes `self` and returns the updated value. The
//! well-known keys (`request`, `response`, `route`, and the executor's
//! bookkeeping) are typed fields; everything else lives in an open
//! string-keyed map of JSON values.
//!
//! The executor clones a context before handing it to a stage handler, so a
//! handler that fails can never lose or corrupt the context it was given.
//! Cloning is kept cheap: interceptors and routes are shared through `Arc`,
//! bodies are `Bytes`.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::chain::{Cause, StageError};
use crate::http::{Request, Response};
use crate::interceptors::Interceptor;
use crate::routing::Route;

/// A predicate over a context, evaluated after each successful `enter` stage.
pub type Terminator = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// The keyed record carrying all per-request state through a chain execution.
#[derive(Clone, Default)]
pub struct Context {
    request: Option<Request>,
    response: Option<Response>,
    route: Option<Arc<Route>>,
    values: HashMap<String, Value>,
    pub(crate) queue: Option<VecDeque<Arc<Interceptor>>>,
    pub(crate) stack: Vec<Arc<Interceptor>>,
    pub(crate) execution_id: Option<Uuid>,
    pub(crate) error: Option<StageError>,
    pub(crate) suppressed: Vec<Cause>,
    pub(crate) terminators: Vec<Terminator>,
}

impl Context {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// The inbound request record, if one has been attached.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    /// Attach the inbound request record.
    pub fn with_request(mut self, request: Request) -> Self {
        self.request = Some(request);
        self
    }

    /// Transform the request in place, if present.
    pub fn map_request<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Request) -> Request,
    {
        if let Some(request) = self.request.take() {
            self.request = Some(f(request));
        }
        self
    }

    /// Fallibly transform the request in place, if present.
    pub fn try_map_request<F, E>(mut self, f: F) -> Result<Self, E>
    where
        F: FnOnce(Request) -> Result<Request, E>,
    {
        if let Some(request) = self.request.take() {
            self.request = Some(f(request)?);
        }
        Ok(self)
    }

    /// The outbound response record, if one has been produced.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Attach the outbound response record.
    pub fn with_response(mut self, response: Response) -> Self {
        self.response = Some(response);
        self
    }

    /// Transform the response in place, if present.
    pub fn map_response<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Response) -> Response,
    {
        if let Some(response) = self.response.take() {
            self.response = Some(f(response));
        }
        self
    }

    /// The route matched for this context, if any.
    pub fn route(&self) -> Option<&Route> {
        self.route.as_deref()
    }

    /// Record the matched route.
    pub fn with_route(mut self, route: Arc<Route>) -> Self {
        self.route = Some(route);
        self
    }

    /// Remove any previously matched route.
    pub fn without_route(mut self) -> Self {
        self.route = None;
        self
    }

    /// A user value by key.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set a user value.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Update a user value from its current state (absent values are `None`).
    pub fn update_value<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(Option<Value>) -> Value,
    {
        let key = key.into();
        let current = self.values.remove(&key);
        self.values.insert(key, f(current));
        self
    }

    /// Serialize and store a typed user value.
    pub fn insert<T: serde::Serialize>(
        self,
        key: impl Into<String>,
        value: T,
    ) -> crate::Result<Self> {
        let value = serde_json::to_value(value).map_err(crate::Error::from)?;
        Ok(self.with_value(key, value))
    }

    /// Deserialize a typed user value by key.
    ///
    /// Returns `None` when the key is absent or the stored value does not
    /// have the requested shape.
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// The unique token for the current chain execution.
    ///
    /// Present only while the executor is driving this context.
    pub fn execution_id(&self) -> Option<Uuid> {
        self.execution_id
    }

    /// Failures raised by `error` handlers that could not handle the error
    /// they were given.
    pub fn suppressed(&self) -> &[Cause] {
        &self.suppressed
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("route", &self.route.as_ref().map(|r| r.name()))
            .field("values", &self.values)
            .field("queue", &self.queue.as_ref().map(VecDeque::len))
            .field("stack", &self.stack.len())
            .field("execution_id", &self.execution_id)
            .field("error", &self.error)
            .field("suppressed", &self.suppressed)
            .field("terminators", &self.terminators.len())
            .finish()
    }
}
