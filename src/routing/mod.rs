//! Request routing expressed as an ordinary interceptor.
//!
//! A [`Route`] pairs a method and a Rails-style path pattern with the
//! interceptors to run when it matches. Path patterns are `/`-separated
//! sequences of literal segments, `:name` identifier segments (one path
//! component) and `*name` wildcard segments (the greedy remainder).
//!
//! The [`router`] factory compiles a set of routes into a single interceptor
//! whose `enter` stage matches the context's request and, on a match,
//! appends the route's interceptors to the live execution queue. Matching is
//! in descending priority order: identifiers weigh more than wildcards,
//! which weigh more than literals, so `/bar/:id` outranks `/bar/*rest` and
//! `/bar/:id/*rest` outranks both. Ties keep declaration order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::chain::{enqueue, Cause};
use crate::context::Context;
use crate::http::Request;
use crate::interceptors::Interceptor;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([*:])(.+)$").unwrap());

/// Request methods a route can match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    /// Matches any request method.
    Any,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Any => "ANY",
        }
    }

    /// Whether a request method satisfies this route method.
    pub fn matches(&self, request_method: &str) -> bool {
        matches!(self, Method::Any) || self.as_str() == request_method
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while building routes and routers, or by the router
/// interceptor at match time.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no interceptors specified")]
    NoInterceptors,

    #[error("route must be a rooted path: {path:?}")]
    NotRooted { path: String },

    #[error("non-unique route name: {name:?}")]
    DuplicateName { name: String },

    #[error("invalid route pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("no request in context")]
    MissingRequest,
}

/// A fully specified route: method and path predicates plus the interceptors
/// to enqueue on a match.
#[derive(Debug, Clone)]
pub struct Route {
    name: String,
    path: String,
    method: Method,
    interceptors: Vec<Arc<Interceptor>>,
    path_re: Regex,
    path_params: Vec<String>,
    priority: i64,
}

impl Route {
    /// Build a route, deriving its name from the last interceptor.
    pub fn new(
        path: &str,
        method: Method,
        interceptors: Vec<Interceptor>,
    ) -> Result<Self, RouteError> {
        Self::build(path, method, interceptors, None)
    }

    /// Build a route with an explicit name.
    pub fn named(
        path: &str,
        method: Method,
        interceptors: Vec<Interceptor>,
        name: impl Into<String>,
    ) -> Result<Self, RouteError> {
        Self::build(path, method, interceptors, Some(name.into()))
    }

    fn build(
        path: &str,
        method: Method,
        interceptors: Vec<Interceptor>,
        name: Option<String>,
    ) -> Result<Self, RouteError> {
        if interceptors.is_empty() {
            return Err(RouteError::NoInterceptors);
        }
        let name = match name {
            Some(name) => name,
            None => interceptors
                .last()
                .map(|i| i.name().to_string())
                .unwrap_or_default(),
        };
        let parsed = parse_path(path)?;
        Ok(Route {
            name,
            path: path.to_string(),
            method,
            interceptors: interceptors.into_iter().map(Arc::new).collect(),
            path_re: Regex::new(&parsed.pattern)?,
            path_params: parsed.params,
            priority: parsed.priority,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Computed specificity weight; higher wins.
    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn interceptors(&self) -> &[Arc<Interceptor>] {
        &self.interceptors
    }
}

struct ParsedPath {
    pattern: String,
    params: Vec<String>,
    priority: i64,
}

/// Parse a route path left-to-right, accumulating the match pattern, the
/// parameter names and the priority weight.
fn parse_path(path: &str) -> Result<ParsedPath, RouteError> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err(RouteError::NotRooted {
            path: path.to_string(),
        });
    };
    let mut pattern = String::from("^");
    let mut params = Vec::new();
    let mut priority = 0;
    for segment in rest.split('/') {
        pattern.push('/');
        match TOKEN_RE.captures(segment) {
            Some(token) => {
                // Identifiers are more specific than wildcards.
                let (constraint, weight) = if &token[1] == "*" {
                    ("(.*)", 2)
                } else {
                    ("([^/]+)", 3)
                };
                pattern.push_str(constraint);
                params.push(token[2].to_string());
                priority += weight;
            }
            None => {
                pattern.push_str(&regex::escape(segment));
                priority += 1;
            }
        }
    }
    Ok(ParsedPath {
        pattern,
        params,
        priority,
    })
}

/// The route declaration surface accepted by [`router`]: a [`Route`] value,
/// or one of the `(path, method, interceptors)` /
/// `(path, method, interceptors, name)` tuples.
pub trait RouteSpec {
    fn into_route(self) -> Result<Route, RouteError>;
}

impl RouteSpec for Route {
    fn into_route(self) -> Result<Route, RouteError> {
        Ok(self)
    }
}

impl RouteSpec for Result<Route, RouteError> {
    fn into_route(self) -> Result<Route, RouteError> {
        self
    }
}

impl<P: AsRef<str>> RouteSpec for (P, Method, Vec<Interceptor>) {
    fn into_route(self) -> Result<Route, RouteError> {
        Route::new(self.0.as_ref(), self.1, self.2)
    }
}

impl<P: AsRef<str>, N: Into<String>> RouteSpec for (P, Method, Vec<Interceptor>, N) {
    fn into_route(self) -> Result<Route, RouteError> {
        Route::named(self.0.as_ref(), self.1, self.2, self.3)
    }
}

/// A matched route together with its extracted path parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub path_params: HashMap<String, String>,
}

/// A router implementation: finds the route matching a request.
pub trait Router: Send + Sync {
    fn find_route(&self, request: &Request) -> Option<RouteMatch>;
}

/// Router implementation that finds a matching route via linear search.
///
/// Routes are expected in match order; [`router`] hands them over sorted by
/// descending priority.
#[derive(Debug, Clone)]
pub struct LinearSearchRouter {
    routes: Vec<Arc<Route>>,
}

impl LinearSearchRouter {
    pub fn new(routes: Vec<Route>) -> Self {
        Self {
            routes: routes.into_iter().map(Arc::new).collect(),
        }
    }
}

impl Router for LinearSearchRouter {
    fn find_route(&self, request: &Request) -> Option<RouteMatch> {
        self.routes.iter().find_map(|route| {
            if !route.method.matches(&request.request_method) {
                return None;
            }
            let captures = route.path_re.captures(&request.path_info)?;
            let mut path_params = HashMap::new();
            for (index, name) in route.path_params.iter().enumerate() {
                if let Some(capture) = captures.get(index + 1) {
                    path_params.insert(name.clone(), capture.as_str().to_string());
                }
            }
            Some(RouteMatch {
                route: Arc::clone(route),
                path_params,
            })
        })
    }
}

/// An interceptor that matches the context's request against route criteria,
/// enqueuing the interceptors of the matching route.
///
/// The matched route is stored on the context and the extracted path
/// parameters are merged into the request's `path_params`. On no match the
/// route key is removed and the context passes through unchanged; downstream
/// interceptors decide the 404 policy.
pub fn router<I>(routes: I) -> Result<Interceptor, RouteError>
where
    I: IntoIterator,
    I::Item: RouteSpec,
{
    router_with(LinearSearchRouter::new, routes)
}

/// [`router`] with a caller-supplied router implementation.
pub fn router_with<R, F, I>(implementation: F, routes: I) -> Result<Interceptor, RouteError>
where
    R: Router + 'static,
    F: FnOnce(Vec<Route>) -> R,
    I: IntoIterator,
    I::Item: RouteSpec,
{
    let mut conformed = Vec::new();
    let mut seen = HashSet::new();
    for spec in routes {
        let route = spec.into_route()?;
        if !seen.insert(route.name().to_string()) {
            return Err(RouteError::DuplicateName {
                name: route.name().to_string(),
            });
        }
        conformed.push(route);
    }
    // Stable sort: equal priorities keep declaration order.
    conformed.sort_by(|a, b| b.priority.cmp(&a.priority));
    let implementation = Arc::new(implementation(conformed));
    Ok(Interceptor::named("router")
        .on_enter(move |context: Context| route_enter(&*implementation, context)))
}

fn route_enter(router: &dyn Router, context: Context) -> Result<Context, Cause> {
    let found = match context.request() {
        Some(request) => router.find_route(request),
        None => return Err(Cause::new(RouteError::MissingRequest)),
    };
    match found {
        None => {
            tracing::debug!("no route matched");
            Ok(context.without_route())
        }
        Some(RouteMatch { route, path_params }) => {
            tracing::debug!(route = route.name(), "matched route");
            let interceptors = route.interceptors.clone();
            let context = context
                .map_request(move |mut request| {
                    request.path_params.extend(path_params);
                    request
                })
                .with_route(route);
            Ok(enqueue(context, interceptors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::execute_with;
    use crate::http::{Request, Response};
    use crate::interceptors::handler;

    fn respond(marker: &'static str) -> Vec<Interceptor> {
        vec![handler(marker, move |_req| Response::ok(marker))]
    }

    fn get(path: &str) -> Request {
        Request::builder().path(path).build().unwrap()
    }

    async fn dispatch(router: &Interceptor, request: Request) -> Context {
        execute_with(
            Context::new().with_request(request),
            vec![router.clone()],
        )
        .await
        .unwrap()
    }

    #[test]
    fn priority_accumulates_per_segment() {
        let weight = |path| Route::new(path, Method::Get, respond("x")).unwrap().priority();
        assert_eq!(weight("/foo"), 1);
        assert_eq!(weight("/bar/:id"), 4);
        assert_eq!(weight("/bar/*rest"), 3);
        assert_eq!(weight("/bar/:id/*rest"), 6);
    }

    #[test]
    fn empty_interceptors_rejected() {
        let result = Route::new("/foo", Method::Get, Vec::new());
        assert!(matches!(result, Err(RouteError::NoInterceptors)));
    }

    #[test]
    fn unrooted_path_rejected() {
        let result = Route::new("foo", Method::Get, respond("x"));
        assert!(matches!(result, Err(RouteError::NotRooted { .. })));
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = router(vec![
            Route::new("/a", Method::Get, respond("same")),
            Route::new("/b", Method::Get, respond("same")),
        ]);
        assert!(matches!(result, Err(RouteError::DuplicateName { .. })));
    }

    #[test]
    fn name_defaults_to_last_interceptor() {
        let route = Route::new(
            "/a",
            Method::Get,
            vec![
                handler("first", |_req| Response::ok("")),
                handler("second", |_req| Response::ok("")),
            ],
        )
        .unwrap();
        assert_eq!(route.name(), "second");
    }

    #[tokio::test]
    async fn most_specific_route_wins() {
        let router = router(vec![
            Route::new("/bar", Method::Any, respond("b")).unwrap(),
            Route::new("/bar/:id/*rest", Method::Any, respond("d")).unwrap(),
            Route::new("/foo", Method::Any, respond("a")).unwrap(),
            Route::new("/bar/:id", Method::Any, respond("c")).unwrap(),
        ])
        .unwrap();

        for (path, expected) in [
            ("/foo", "a"),
            ("/bar", "b"),
            ("/bar/1", "c"),
            ("/bar/1/pa/th", "d"),
        ] {
            let context = dispatch(&router, get(path)).await;
            let body = context.response().map(|r| r.body.clone());
            assert_eq!(body, Some(bytes::Bytes::from(expected)), "path {path}");
        }
    }

    #[tokio::test]
    async fn path_params_extracted() {
        let router = router(vec![
            Route::new("/foo/:a/*rest", Method::Any, respond("x")).unwrap()
        ])
        .unwrap();
        let context = dispatch(&router, get("/foo/1/2/bar")).await;
        let request = context.request().unwrap();
        assert_eq!(request.path_params.get("a"), Some(&"1".to_string()));
        assert_eq!(request.path_params.get("rest"), Some(&"2/bar".to_string()));
        assert_eq!(context.route().map(|r| r.name()), Some("x"));
    }

    #[tokio::test]
    async fn method_predicate_enforced() {
        let router = router(vec![
            Route::new("/only-post", Method::Post, respond("p")).unwrap()
        ])
        .unwrap();

        let context = dispatch(&router, get("/only-post")).await;
        assert!(context.response().is_none());

        let request = Request::builder().method("POST").path("/only-post").build().unwrap();
        let context = dispatch(&router, request).await;
        assert_eq!(context.response().map(|r| r.status), Some(200));
    }

    #[tokio::test]
    async fn no_match_clears_route() {
        let stale = Arc::new(Route::new("/old", Method::Any, respond("old")).unwrap());
        let router = router(vec![
            Route::new("/known", Method::Any, respond("k")).unwrap()
        ])
        .unwrap();
        let context = execute_with(
            Context::new().with_request(get("/missing")).with_route(stale),
            vec![router],
        )
        .await
        .unwrap();
        assert!(context.route().is_none());
        assert!(context.response().is_none());
    }

    #[tokio::test]
    async fn tuple_declaration_surface() {
        let router = router(vec![
            ("/t/:id", Method::Get, respond("t"), "tuple-route"),
        ])
        .unwrap();
        let context = dispatch(&router, get("/t/9")).await;
        assert_eq!(context.route().map(|r| r.name()), Some("tuple-route"));
        assert_eq!(
            context.request().unwrap().path_params.get("id"),
            Some(&"9".to_string())
        );
    }

    #[tokio::test]
    async fn matched_interceptors_run_within_the_same_execution() {
        use serde_json::{json, Value};

        fn push(context: Context, entry: String) -> Context {
            context.update_value("order", |current| {
                let mut items = current
                    .and_then(|v| v.as_array().cloned())
                    .unwrap_or_default();
                items.push(Value::String(entry));
                Value::Array(items)
            })
        }

        fn mark(marker: &'static str) -> Interceptor {
            crate::interceptors::around(
                marker,
                move |context: Context| push(context, format!("enter {marker}")),
                move |context: Context| push(context, format!("leave {marker}")),
            )
        }

        let router = router(vec![
            Route::named("/r", Method::Any, vec![mark("inner")], "r").unwrap()
        ])
        .unwrap();
        let context = execute_with(
            Context::new().with_request(get("/r")),
            vec![mark("outer"), router],
        )
        .await
        .unwrap();
        assert_eq!(
            context.value("order"),
            Some(&json!([
                "enter outer",
                "enter inner",
                "leave inner",
                "leave outer"
            ]))
        );
    }

    #[tokio::test]
    async fn missing_request_fails_stage() {
        let router = router(vec![
            Route::new("/x", Method::Any, respond("x")).unwrap()
        ])
        .unwrap();
        let result = execute_with(Context::new(), vec![router]).await;
        let cause = result.unwrap_err();
        assert!(cause.is::<RouteError>());
    }
}
