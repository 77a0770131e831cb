//! HTTP wire types handed to and received from a `Transport`.
//!
//! # Design
//! `HttpRequest` is the fully prepared call as plain data: the final URL with
//! its encoded query string, the method, the header list and an optional
//! body. The pipeline builds it, the transport executes it. `HttpResponse`
//! carries status and headers eagerly but leaves the body as a reader so the
//! pipeline decides how it is drained.

use std::fmt;
use std::io::Read;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prepared HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// Form posts turn this off; everything else keeps the transport default.
    pub follow_redirects: bool,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            follow_redirects: true,
        }
    }

    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response whose body has not been read yet.
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_display_matches_wire_name() {
        assert_eq!(HttpMethod::Put.to_string(), "PUT");
        assert_eq!(HttpMethod::default(), HttpMethod::Get);
    }

    #[test]
    fn header_lookup_ignores_case() {
        let mut req = HttpRequest::new(HttpMethod::Post, "http://localhost/");
        req.headers
            .push(("Content-Type".to_string(), "text/plain".to_string()));
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.header("content-length"), None);
        assert!(req.follow_redirects);
    }
}
