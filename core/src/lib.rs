//! Asynchronous HTTP requests with a single uniform result.
//!
//! # Overview
//! Describe a call with `Request` (URL, method, headers, query parameters,
//! form fields), hand it a completion handler with `execute`, and receive
//! exactly one `NetworkResult` carrying status, body bytes, response headers
//! and any transport failure. The network I/O never runs on the caller's
//! thread.
//!
//! # Design
//! - `NetworkResult` is immutable once built; the pipeline assembles it with a
//!   private builder.
//! - A non-2xx status is not an error. `error()` is only set when the server
//!   could not be reached or the exchange broke.
//! - `Transport` and `Dispatcher` are the two seams: swap the network stack or
//!   the thread a completion is delivered on without touching the pipeline.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod encode;
pub mod error;
pub mod http;
pub mod request;
pub mod result;
pub mod transport;

pub use client::Client;
pub use config::ClientConfig;
pub use dispatch::{CompletionQueue, Dispatcher, ThreadDispatcher};
#[cfg(feature = "tokio")]
pub use dispatch::TokioDispatcher;
pub use error::{EncodeError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use request::{PendingResult, Request};
pub use result::NetworkResult;
pub use transport::{Transport, UreqTransport};
