//! The HTTP seam between a [`Connection`](crate::Connection) and the network.
//!
//! Everything the client sends goes through a [`Transport`]. [`HttpTransport`] is the real one,
//! backed by [`reqwest`]; tests and embedders can plug in their own.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use tracing::trace;

use crate::error::{Result, ValidateError};

/// An outgoing HTTP request.
#[derive(Clone)]
pub struct Request {
    /// HTTP method, `OPTIONS` or `POST` in practice.
    pub method: Method,
    /// Fully-formed URL, query string included.
    pub url: String,
    /// Headers in the order they were added. Names may repeat.
    pub headers: Vec<(String, String)>,
    /// Request body; empty for `OPTIONS`.
    pub body: Vec<u8>,
}

impl Request {
    /// A request with no headers and an empty body.
    pub fn new(method: Method, url: impl Into<String>) -> Request {
        Request {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Request {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body.
    pub fn with_body(mut self, body: Vec<u8>) -> Request {
        self.body = body;
        self
    }

    /// The first header called `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(n, v)| {
                if n.eq_ignore_ascii_case("authorization") {
                    (n.as_str(), "<redacted>")
                } else {
                    (n.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body", &format_args!("{} bytes", self.body.len()))
            .finish()
    }
}

/// A fully-read HTTP response.
#[derive(Clone, Debug)]
pub struct Response {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Vec<u8>,
}

impl Response {
    /// An empty response with the given status.
    pub fn new(status: StatusCode) -> Response {
        Response {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Add a header. Fails if `name` or `value` can't be carried over HTTP.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Response> {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ValidateError::InvalidHeader(name.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| ValidateError::InvalidHeader(name.to_string()))?;
        self.headers.append(header, value);
        Ok(self)
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Response {
        self.body = body.into();
        self
    }

    /// The value of header `name`, if it is present and is valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The reason phrase for this response's status.
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }
}

/// Something that can carry a [`Request`] to a server and bring back its [`Response`].
///
/// A transport reports only failures to get a response at all (DNS, TLS, timeouts). Non-2xx
/// statuses are successful responses as far as the transport is concerned.
pub trait Transport: Send + Sync {
    /// Send `request` and wait for the complete response.
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        (**self).send(request)
    }
}

impl<T: Transport> Transport for &T {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        (**self).send(request)
    }
}

/// A [`Transport`] backed by a [`reqwest::Client`].
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// A transport with reqwest's defaults.
    pub fn new() -> HttpTransport {
        HttpTransport::default()
    }

    /// Use an existing, preconfigured client.
    pub fn from_client(client: reqwest::Client) -> HttpTransport {
        HttpTransport { client }
    }

    pub(crate) fn with_options(
        timeout: Option<Duration>,
        user_agent: Option<&str>,
    ) -> Result<HttpTransport> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = user_agent {
            builder = builder.user_agent(user_agent);
        }
        Ok(HttpTransport {
            client: builder.build()?,
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        async move {
            let mut headers = HeaderMap::new();
            for (name, value) in &request.headers {
                let header = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| ValidateError::InvalidHeader(name.clone()))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|_| ValidateError::InvalidHeader(name.clone()))?;
                headers.append(header, value);
            }

            trace!(method = %request.method, url = %request.url, "sending request");
            let response = self
                .client
                .request(request.method, request.url.as_str())
                .headers(headers)
                .body(request.body)
                .send()
                .await?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?.to_vec();
            trace!(%status, len = body.len(), "received response");
            Ok(Response {
                status,
                headers,
                body,
            })
        }
    }
}

/// The value of an `Authorization` header for HTTP Basic authentication.
pub(crate) fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    format!("Basic {}", general_purpose::STANDARD.encode(credentials))
}
