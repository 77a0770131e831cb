//! Request configuration and the execution pipeline.
//!
//! # Overview
//! A `Request` is configured through fluent `with_*` calls or in-place
//! `set_*` / `add_*` calls, then executed. Execution snapshots the current
//! configuration into a prepared `HttpRequest`, hands the blocking network
//! work to the request's `Dispatcher`, and delivers exactly one
//! `NetworkResult` to the handler once the work finishes.
//!
//! # Design
//! - Query parameters and form fields go through `encode::encode_pairs`, so a
//!   pair that fails to encode is logged and skipped; the request still runs.
//! - Every failure (invalid URL, transport error, broken body stream, even a
//!   panicking transport) becomes a failure result. Nothing escapes `execute`.
//! - The body is drained in fixed 1024-byte reads with no size cap.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::dispatch::{Dispatcher, ThreadDispatcher};
use crate::encode::{append_query, encode_pairs};
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest};
use crate::result::{NetworkResult, ResultBuilder};
use crate::transport::{Transport, UreqTransport};

const CHUNK_SIZE: usize = 1024;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A configured HTTP call.
#[derive(Clone)]
pub struct Request {
    url: String,
    method: HttpMethod,
    headers: HashMap<String, String>,
    parameters: HashMap<String, String>,
    form: HashMap<String, String>,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("parameters", &self.parameters)
            .field("form", &self.form)
            .finish_non_exhaustive()
    }
}

impl Request {
    pub fn new(url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HashMap::new(),
            parameters: HashMap::new(),
            form: HashMap::new(),
            transport: Arc::new(UreqTransport::new()),
            dispatcher: Arc::new(ThreadDispatcher),
        }
    }

    /// A GET request for `url`.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self::new(url, HttpMethod::Get)
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url, HttpMethod::Get)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(url, HttpMethod::Post)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(url, HttpMethod::Put)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(url, HttpMethod::Delete)
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(key, value);
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_parameter(key, value);
        self
    }

    pub fn with_form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_form_field(key, value);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn set_method(&mut self, method: HttpMethod) {
        self.method = method;
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), value.into());
    }

    pub fn add_parameter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(key.into(), value.into());
    }

    pub fn add_form_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.form.insert(key.into(), value.into());
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    pub fn form_fields(&self) -> &HashMap<String, String> {
        &self.form
    }

    /// Snapshot the configuration as the request that will go on the wire.
    pub fn prepare(&self) -> HttpRequest {
        let query = encode_pairs(&self.parameters);
        let mut request = HttpRequest::new(self.method, append_query(&self.url, &query));
        request.headers = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let form = encode_pairs(&self.form);
        if !form.is_empty() {
            let body = form.into_bytes();
            request.follow_redirects = false;
            request.headers.extend([
                ("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()),
                ("charset".to_string(), "utf-8".to_string()),
                ("Content-Length".to_string(), body.len().to_string()),
                ("Cache-Control".to_string(), "no-cache".to_string()),
            ]);
            request.body = Some(body);
        }
        request
    }

    /// Run the request in the background and hand the result to `handler`.
    ///
    /// Returns as soon as the work is scheduled. `handler` runs exactly once,
    /// on the thread the dispatcher delivers completions on.
    ///
    /// If the OS refuses to start a worker thread, the request and `handler`
    /// run on the calling thread before `execute` returns, and an error is
    /// logged. This is the only case where `handler` runs synchronously.
    pub fn execute<F>(&self, handler: F)
    where
        F: FnOnce(NetworkResult) + Send + 'static,
    {
        let prepared = self.prepare();
        let transport = Arc::clone(&self.transport);
        let dispatcher = Arc::clone(&self.dispatcher);
        self.dispatcher.spawn(Box::new(move || {
            let result = run(transport.as_ref(), &prepared);
            dispatcher.deliver(Box::new(move || handler(result)));
        }));
    }

    /// Like `execute`, but the result arrives through a one-shot channel.
    ///
    /// With a `CompletionQueue` dispatcher the queue must be drained on
    /// another thread before `wait` can return.
    pub fn send(&self) -> PendingResult {
        let (sender, receiver) = mpsc::sync_channel(1);
        self.execute(move |result| {
            if sender.send(result).is_err() {
                log::debug!("pending result dropped before completion");
            }
        });
        PendingResult { receiver }
    }

    /// Run the pipeline on the calling thread.
    pub fn execute_blocking(&self) -> NetworkResult {
        run(self.transport.as_ref(), &self.prepare())
    }

    /// Run the pipeline on tokio's blocking pool.
    #[cfg(feature = "tokio")]
    pub async fn execute_async(&self) -> NetworkResult {
        let prepared = self.prepare();
        let transport = Arc::clone(&self.transport);
        match tokio::task::spawn_blocking(move || run(transport.as_ref(), &prepared)).await {
            Ok(result) => result,
            Err(e) => NetworkResult::from_failure(TransportError::Protocol(format!(
                "background task failed: {e}"
            ))),
        }
    }
}

/// A result that will be delivered by a background request.
#[derive(Debug)]
pub struct PendingResult {
    receiver: Receiver<NetworkResult>,
}

impl PendingResult {
    /// Block until the result arrives.
    pub fn wait(self) -> NetworkResult {
        self.receiver.recv().unwrap_or_else(|_| dropped())
    }

    /// Block for at most `timeout`. `None` means the request is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<NetworkResult> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(dropped()),
        }
    }

    /// The result if it has already arrived.
    pub fn try_take(&self) -> Option<NetworkResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(dropped()),
        }
    }
}

fn dropped() -> NetworkResult {
    NetworkResult::from_failure(TransportError::Protocol(
        "request dropped before completion".to_string(),
    ))
}

/// Execute `request` and fold every outcome into one result.
pub(crate) fn run(transport: &dyn Transport, request: &HttpRequest) -> NetworkResult {
    match catch_unwind(AssertUnwindSafe(|| run_inner(transport, request))) {
        Ok(result) => result,
        Err(_) => {
            log::error!("transport panicked while requesting {}", request.url);
            NetworkResult::from_failure(TransportError::Protocol(
                "transport panicked".to_string(),
            ))
        }
    }
}

fn run_inner(transport: &dyn Transport, request: &HttpRequest) -> NetworkResult {
    if let Err(e) = Url::parse(&request.url) {
        log::error!("refusing to open `{}`: {e}", request.url);
        return NetworkResult::from_failure(TransportError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        });
    }

    log::debug!("opening connection to {} HTTP-{}", request.url, request.method);
    let mut builder = ResultBuilder::new();
    match transport.send(request) {
        Ok(mut response) => {
            log::debug!("response status {} from {}", response.status, request.url);
            builder
                .status(response.status)
                .headers(std::mem::take(&mut response.headers));
            match read_body(&mut response.body, builder.body_mut()) {
                Ok(read) => log::debug!("read {read} body bytes"),
                Err(e) => {
                    log::error!("failed reading body from {}: {e}", request.url);
                    builder.fail(e.into());
                }
            }
        }
        Err(e) => {
            log::error!("failed to get data from {}: {e}", request.url);
            builder.fail(e);
        }
    }
    builder.build()
}

fn read_body(reader: &mut dyn Read, sink: &mut Vec<u8>) -> io::Result<usize> {
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut total = 0;
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => return Ok(total),
            Ok(n) => {
                sink.extend_from_slice(&chunk[..n]);
                total += n;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
