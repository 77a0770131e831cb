//! The uniform outcome of one HTTP attempt.
//!
//! # Design
//! A `NetworkResult` is fully determined when it is built and has no public
//! mutators. The pipeline assembles response facts in a crate-private
//! `ResultBuilder` and hands the caller the finished value. Failure results
//! never carry a status or a body, so "server said no" (status present, no
//! error) and "could not talk to server" (error present, no status) are
//! always distinguishable.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::TransportError;

/// Outcome of an HTTP request: body bytes, status, headers, captured error.
#[derive(Debug, Clone)]
pub struct NetworkResult {
    body: Bytes,
    success: bool,
    status: Option<u16>,
    headers: HashMap<String, String>,
    error: Option<Arc<TransportError>>,
}

/// The 2xx test used wherever a status decides success.
pub fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

impl NetworkResult {
    /// Successful result holding `body` verbatim.
    pub fn from_bytes(body: impl Into<Bytes>) -> Self {
        Self::from_bytes_with_success(body, true)
    }

    pub fn from_bytes_with_status(body: impl Into<Bytes>, status: u16) -> Self {
        Self {
            body: body.into(),
            success: is_success_status(status),
            status: Some(status),
            headers: HashMap::new(),
            error: None,
        }
    }

    pub fn from_bytes_with_success(body: impl Into<Bytes>, success: bool) -> Self {
        Self {
            body: body.into(),
            success,
            status: None,
            headers: HashMap::new(),
            error: None,
        }
    }

    /// UTF-8 encodes `text`.
    pub fn from_text(text: &str) -> Self {
        Self::from_text_with_success(text, true)
    }

    pub fn from_text_with_success(text: &str, success: bool) -> Self {
        Self::from_bytes_with_success(Bytes::copy_from_slice(text.as_bytes()), success)
    }

    /// Unsuccessful, empty result carrying `error`.
    pub fn from_failure(error: impl Into<TransportError>) -> Self {
        Self {
            body: Bytes::new(),
            success: false,
            status: None,
            headers: HashMap::new(),
            error: Some(Arc::new(error.into())),
        }
    }

    /// Body decoded as UTF-8; invalid sequences become U+FFFD.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The shared body buffer. Cloning `Bytes` does not copy the payload.
    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn error(&self) -> Option<&TransportError> {
        self.error.as_deref()
    }

    /// Exact-match lookup; names are stored as the transport reported them.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}

impl fmt::Display for NetworkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.body))
    }
}

/// Accumulates response facts inside the pipeline.
#[derive(Debug, Default)]
pub(crate) struct ResultBuilder {
    status: Option<u16>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    error: Option<TransportError>,
}

impl ResultBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn status(&mut self, status: u16) -> &mut Self {
        self.status = Some(status);
        self
    }

    /// Repeated header names are folded into one comma-separated value.
    pub(crate) fn headers(&mut self, headers: impl IntoIterator<Item = (String, String)>) -> &mut Self {
        for (name, value) in headers {
            self.headers
                .entry(name)
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }
        self
    }

    pub(crate) fn body_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body
    }

    /// A failed builder always builds into the failure shape.
    pub(crate) fn fail(&mut self, error: TransportError) -> &mut Self {
        self.error = Some(error);
        self
    }

    pub(crate) fn build(self) -> NetworkResult {
        if let Some(error) = self.error {
            return NetworkResult::from_failure(error);
        }
        let body = Bytes::from(self.body);
        match self.status {
            Some(status) => NetworkResult {
                headers: self.headers,
                ..NetworkResult::from_bytes_with_status(body, status)
            },
            None => NetworkResult {
                headers: self.headers,
                ..NetworkResult::from_bytes(body)
            },
        }
    }
}
