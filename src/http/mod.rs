//! HTTP request and response records.
//!
//! These are the interface records exchanged with transport adapters:
//! adapters produce a [`Request`] from the native inbound object, handlers
//! produce a [`Response`], and adapters write it back out. Header names are
//! lowercase; each name maps to every value seen for it.

pub mod body_params;

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Header multimap: lowercase name to all values.
pub type Headers = HashMap<String, Vec<String>>;

/// Content type assumed when a request carries none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors raised while assembling HTTP records.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid request uri: {0}")]
    InvalidUri(#[from] url::ParseError),
}

/// The parsed inbound request record.
#[derive(Debug, Clone)]
pub struct Request {
    /// Uppercase request method, e.g. `GET`.
    pub request_method: String,
    /// `http` or `https`.
    pub scheme: String,
    /// Host name, from the `Host` header.
    pub server_name: String,
    /// Port, from the `Host` header or the scheme default.
    pub server_port: u16,
    /// Client address.
    pub remote_addr: String,
    /// The parsed request URL.
    pub uri: Url,
    /// URL path, leading `/` when rooted.
    pub path_info: String,
    pub headers: Headers,
    /// `Content-Type` header, or [`DEFAULT_CONTENT_TYPE`].
    pub content_type: String,
    pub content_length: Option<u64>,
    /// Charset parsed from `Content-Type`, lowercase.
    pub character_encoding: Option<String>,
    pub body: Bytes,
    /// Parameters extracted from the path by the router.
    pub path_params: HashMap<String, String>,
    /// Parsed JSON body, set by the body-params interceptor.
    pub json_params: Option<Value>,
    /// Parsed urlencoded form body, set by the body-params interceptor.
    pub form_params: Option<Value>,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    /// First value of a header, by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Builder for [`Request`] records, used by adapters and tests.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: String,
    scheme: String,
    server_name: String,
    server_port: Option<u16>,
    remote_addr: String,
    path: String,
    headers: Headers,
    content_type: Option<String>,
    content_length: Option<u64>,
    body: Bytes,
}

impl RequestBuilder {
    fn new() -> Self {
        Self {
            method: "GET".to_string(),
            scheme: "http".to_string(),
            server_name: "localhost".to_string(),
            server_port: None,
            remote_addr: "127.0.0.1".to_string(),
            path: "/".to_string(),
            headers: Headers::new(),
            content_type: None,
            content_length: None,
            body: Bytes::new(),
        }
    }

    pub fn method(mut self, method: impl AsRef<str>) -> Self {
        self.method = method.as_ref().to_ascii_uppercase();
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    pub fn server_port(mut self, port: u16) -> Self {
        self.server_port = Some(port);
        self
    }

    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = addr.into();
        self
    }

    /// Request path, optionally with a query string.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Append a header value.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.as_ref().to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> crate::Result<Request> {
        let server_port = self
            .server_port
            .unwrap_or_else(|| default_port(&self.scheme));
        let uri = Url::parse(&format!(
            "{}://{}:{}{}",
            self.scheme, self.server_name, server_port, self.path
        ))
        .map_err(HttpError::from)?;
        let path_info = uri.path().to_string();
        let content_type = self
            .content_type
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let character_encoding = charset(&content_type);
        let content_length = self
            .content_length
            .or_else(|| (!self.body.is_empty()).then_some(self.body.len() as u64));
        Ok(Request {
            request_method: self.method,
            scheme: self.scheme,
            server_name: self.server_name,
            server_port,
            remote_addr: self.remote_addr,
            uri,
            path_info,
            headers: self.headers,
            content_type,
            content_length,
            character_encoding,
            body: self.body,
            path_params: HashMap::new(),
            json_params: None,
            form_params: None,
        })
    }
}

/// The outbound response record.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// A `200 OK` response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200).with_body(body)
    }

    /// Append a header value.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.as_ref().to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Default port for a scheme.
pub(crate) fn default_port(scheme: &str) -> u16 {
    if scheme.eq_ignore_ascii_case("https") {
        443
    } else {
        80
    }
}

/// The media type of a `Content-Type` value, without parameters.
pub fn media_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or("")
}

/// The charset parameter of a `Content-Type` value, lowercase.
pub fn charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_ascii_lowercase())
        } else {
            None
        }
    })
}
