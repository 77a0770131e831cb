//! Shared request factory.
//!
//! # Design
//! `Client` holds the configuration every request of an application shares:
//! an explicit base URL, default headers, the transport and the dispatcher.
//! It builds `Request` values and carries no mutable state between calls.

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::dispatch::{Dispatcher, ThreadDispatcher};
use crate::http::HttpMethod;
use crate::request::Request;
use crate::transport::{Transport, UreqTransport};

#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: Arc::new(UreqTransport::new()),
            dispatcher: Arc::new(ThreadDispatcher),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A request for `path`, resolved against the configured base URL.
    pub fn request(&self, path: &str, method: HttpMethod) -> Request {
        let mut request = Request::new(self.resolve(path), method)
            .with_transport(Arc::clone(&self.transport))
            .with_dispatcher(Arc::clone(&self.dispatcher));
        if let Some(user_agent) = &self.config.user_agent {
            request.add_header("User-Agent", user_agent.as_str());
        }
        for (key, value) in &self.config.default_headers {
            request.add_header(key.as_str(), value.as_str());
        }
        request
    }

    pub fn get(&self, path: &str) -> Request {
        self.request(path, HttpMethod::Get)
    }

    pub fn post(&self, path: &str) -> Request {
        self.request(path, HttpMethod::Post)
    }

    pub fn put(&self, path: &str) -> Request {
        self.request(path, HttpMethod::Put)
    }

    pub fn delete(&self, path: &str) -> Request {
        self.request(path, HttpMethod::Delete)
    }

    fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        match self.config.base_url.as_deref() {
            Some(base) if path.is_empty() => base.to_string(),
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            None => path.to_string(),
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}
