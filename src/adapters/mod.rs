//! Transport adapters bridging native HTTP types to the interceptor chain.
//!
//! [`handle`] is the boundary for `http`-crate based servers: it converts an
//! `http::Request` into the framework's request record, executes the chain,
//! and converts the resulting response record back. A chain that finishes
//! without producing a response, or fails outright, yields a 500.

use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request as HttpRequest, Response as HttpResponse, StatusCode};
use url::Url;

use crate::chain::execute_with;
use crate::context::Context;
use crate::http::{charset, default_port, Headers, HttpError, Request, DEFAULT_CONTENT_TYPE};
use crate::interceptors::Interceptor;

/// Execute `interceptors` against a native request and render the outcome as
/// a native response.
pub async fn handle<I>(
    request: HttpRequest<Bytes>,
    remote_addr: impl Into<String>,
    interceptors: I,
) -> HttpResponse<Bytes>
where
    I: IntoIterator,
    I::Item: Into<Arc<Interceptor>>,
{
    let record = match request_record(request, remote_addr.into()) {
        Ok(record) => record,
        Err(error) => {
            tracing::error!(%error, "failed to convert native request");
            return error_response("Internal server error: exception");
        }
    };
    let context = Context::new().with_request(record);
    match execute_with(context, interceptors).await {
        Ok(context) => match context.response() {
            Some(response) => native_response(response),
            None => error_response("Internal server error: no response"),
        },
        Err(cause) => {
            tracing::error!(error = %cause, "request chain failed");
            error_response("Internal server error: exception")
        }
    }
}

/// Convert a native request into the framework's request record.
fn request_record(request: HttpRequest<Bytes>, remote_addr: String) -> Result<Request, HttpError> {
    let (parts, body) = request.into_parts();

    let mut headers = Headers::new();
    for (name, value) in &parts.headers {
        headers
            .entry(name.as_str().to_ascii_lowercase())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    let scheme = parts.uri.scheme_str().unwrap_or("http").to_string();
    let (server_name, server_port) = host_and_port(&parts.uri, &scheme, &headers);
    let content_type = headers
        .get("content-type")
        .and_then(|values| values.first())
        .cloned()
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    let content_length = headers
        .get("content-length")
        .and_then(|values| values.first())
        .and_then(|value| value.parse().ok());
    let character_encoding = charset(&content_type);
    let path_info = parts.uri.path().to_string();
    let uri = match parts.uri.query() {
        Some(query) => Url::parse(&format!(
            "{scheme}://{server_name}:{server_port}{path_info}?{query}"
        ))?,
        None => Url::parse(&format!("{scheme}://{server_name}:{server_port}{path_info}"))?,
    };

    Ok(Request {
        request_method: parts.method.as_str().to_ascii_uppercase(),
        scheme,
        server_name,
        server_port,
        remote_addr,
        uri,
        path_info,
        headers,
        content_type,
        content_length,
        character_encoding,
        body,
        path_params: Default::default(),
        json_params: None,
        form_params: None,
    })
}

/// Server name and port: the URI authority when present, otherwise the
/// `Host` header, falling back to the scheme default port.
fn host_and_port(uri: &http::Uri, scheme: &str, headers: &Headers) -> (String, u16) {
    if let Some(authority) = uri.authority() {
        let port = authority
            .port_u16()
            .unwrap_or_else(|| default_port(scheme));
        return (authority.host().to_string(), port);
    }
    let host = headers
        .get("host")
        .and_then(|values| values.first())
        .map(String::as_str)
        .unwrap_or("localhost");
    match host.rsplit_once(':') {
        Some((name, port)) => match port.parse() {
            Ok(port) => (name.to_string(), port),
            Err(_) => (host.to_string(), default_port(scheme)),
        },
        None => (host.to_string(), default_port(scheme)),
    }
}

fn native_response(response: &crate::http::Response) -> HttpResponse<Bytes> {
    let mut builder = HttpResponse::builder()
        .status(StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
    for (name, values) in &response.headers {
        for value in values {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }
    match builder.body(response.body.clone()) {
        Ok(native) => native,
        Err(error) => {
            tracing::error!(%error, "failed to render response");
            error_response("Internal server error: exception")
        }
    }
}

fn error_response(message: &str) -> HttpResponse<Bytes> {
    let mut response = HttpResponse::new(Bytes::copy_from_slice(message.as_bytes()));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
