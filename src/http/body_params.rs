//! Body parameter extraction interceptors.
//!
//! [`body_params`] parses a request body during the enter stage, dispatching
//! on the request's media type: `application/json` lands in the request's
//! `json_params`, `application/x-www-form-urlencoded` in `form_params`.
//! Unknown media types pass through untouched. Parse failures are ordinary
//! stage failures and unwind the chain.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::chain::Cause;
use crate::context::Context;
use crate::http::{media_type, Request};
use crate::interceptors::Interceptor;

/// A body parser: transforms the request, typically filling one of its
/// parameter fields from the body.
pub type BodyParser = Arc<dyn Fn(Request) -> Result<Request, Cause> + Send + Sync>;

/// The default parser set, keyed by media type.
pub fn default_parsers() -> Vec<(String, BodyParser)> {
    vec![
        (
            "application/json".to_string(),
            Arc::new(parse_json) as BodyParser,
        ),
        (
            "application/x-www-form-urlencoded".to_string(),
            Arc::new(parse_form) as BodyParser,
        ),
    ]
}

/// An interceptor that parses request body parameters with the default
/// parser set.
pub fn body_params() -> Interceptor {
    body_params_with(default_parsers())
}

/// [`body_params`] with a caller-supplied parser set.
pub fn body_params_with(parsers: Vec<(String, BodyParser)>) -> Interceptor {
    Interceptor::named("body_params").on_enter(move |context: Context| -> Result<Context, Cause> {
        let parser = context.request().and_then(|request| {
            let media = media_type(&request.content_type).to_ascii_lowercase();
            parsers
                .iter()
                .find(|(expr, _)| *expr == media)
                .map(|(_, parser)| Arc::clone(parser))
        });
        match parser {
            None => Ok(context),
            Some(parser) => context.try_map_request(|request| parser(request)),
        }
    })
}

fn parse_json(mut request: Request) -> Result<Request, Cause> {
    let value: Value = serde_json::from_slice(&request.body).map_err(Cause::new)?;
    request.json_params = Some(value);
    Ok(request)
}

fn parse_form(mut request: Request) -> Result<Request, Cause> {
    let mut collected: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(&request.body) {
        collected
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    let object: serde_json::Map<String, Value> = collected
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                Value::String(values.remove(0))
            } else {
                Value::Array(values.into_iter().map(Value::String).collect())
            };
            (key, value)
        })
        .collect();
    request.form_params = Some(Value::Object(object));
    Ok(request)
}
