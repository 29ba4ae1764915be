//! # ostinato
//!
//! An HTTP request-processing framework built around a single abstraction:
//! the interceptor chain. Request handling, middleware, error recovery and
//! routing all compose through named triples of `enter`/`leave`/`error`
//! stage handlers, driven by a re-entrant asynchronous executor.
//!
//! The executor threads a [`Context`] through a queue of [`Interceptor`]s:
//! `enter` stages run in order, then `leave` stages run in reverse, and a
//! stage failure unwinds the stack through `error` stages until some
//! interceptor handles it. Any stage may suspend by returning a deferred
//! [`Eventual`]. Interceptors can reshape the execution from inside a stage
//! — the bundled [`routing::router`] is an ordinary interceptor that splices
//! the matched route's interceptors into the live queue.
//!
//! ```
//! use ostinato::{execute_with, Context, Interceptor};
//!
//! let chain = vec![
//!     Interceptor::named("greeter").on_enter(|ctx: Context| ctx.with_value("greeting", "hello")),
//! ];
//! let context = futures::executor::block_on(execute_with(Context::new(), chain)).unwrap();
//! assert_eq!(context.value("greeting"), Some(&serde_json::json!("hello")));
//! ```

pub mod adapters;
pub mod chain;
pub mod context;
pub mod http;
pub mod interceptors;
pub mod routing;

// Re-export main types for convenience
pub use chain::{
    enqueue, execute, execute_with, terminate, terminate_when, Cause, Eventual, Stage, StageError,
};
pub use context::Context;
pub use http::{Request, Response};
pub use interceptors::{
    after, around, before, error_handler, handler, middleware, on_request, on_response, Interceptor,
};
pub use routing::{router, router_with, Method, Route, RouteError, RouteSpec};

/// Error type for the library
pub mod error;
pub use error::{Error, Result};
