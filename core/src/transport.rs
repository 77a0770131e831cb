//! HTTP transport abstraction.
//!
//! The pipeline only ever talks to a `Transport`: open a connection for a
//! prepared `HttpRequest`, write its headers and body, and hand back status,
//! headers and an unread body stream. `UreqTransport` is the production
//! implementation; tests swap in a recording mock.

use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, RequestBuilder};

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes one prepared request.
pub trait Transport: Send + Sync {
    /// Send `request` and return the response with its body still unread.
    ///
    /// Non-2xx statuses are responses, not errors.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by `ureq`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
    no_redirect: Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        let no_redirect = Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .build()
            .new_agent();
        Self { agent, no_redirect }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = if request.follow_redirects {
            &self.agent
        } else {
            &self.no_redirect
        };
        let url = request.url.as_str();

        let response = match request.method {
            HttpMethod::Get => send_without_body(agent.get(url), request),
            HttpMethod::Delete => send_without_body(agent.delete(url), request),
            HttpMethod::Post => send_with_body(agent.post(url), request),
            HttpMethod::Put => send_with_body(agent.put(url), request),
        }
        .map_err(|e| classify(e, url))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.into_body().into_reader();

        Ok(HttpResponse {
            status,
            headers,
            body: Box::new(body),
        })
    }
}

fn apply_headers<B>(mut builder: RequestBuilder<B>, request: &HttpRequest) -> RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send_without_body(
    builder: RequestBuilder<WithoutBody>,
    request: &HttpRequest,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    let builder = apply_headers(builder, request);
    match &request.body {
        Some(body) => builder.force_send_body().send(body.as_slice()),
        None => builder.call(),
    }
}

fn send_with_body(
    builder: RequestBuilder<WithBody>,
    request: &HttpRequest,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    let builder = apply_headers(builder, request);
    match &request.body {
        Some(body) => builder.send(body.as_slice()),
        None => builder.send_empty(),
    }
}

fn classify(err: ureq::Error, url: &str) -> TransportError {
    let message = err.to_string();
    match err {
        ureq::Error::HostNotFound => TransportError::HostNotFound(url.to_string()),
        ureq::Error::ConnectionFailed => TransportError::ConnectionFailed(url.to_string()),
        ureq::Error::Timeout(_) => TransportError::Timeout(message),
        ureq::Error::Io(e) => TransportError::Io(e),
        ureq::Error::BadUri(reason) => TransportError::InvalidUrl {
            url: url.to_string(),
            reason,
        },
        _ => TransportError::Protocol(message),
    }
}
