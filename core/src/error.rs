//! Error types for the request pipeline.
//!
//! # Design
//! Two families of failure exist and they never mix. `EncodeError` describes
//! a single query parameter or form field that could not be encoded; the
//! pipeline logs it, drops that pair and keeps going. `TransportError`
//! describes a failure to talk to the server at all; it ends up inside a
//! `NetworkResult` and is how callers tell "could not reach the server" apart
//! from "the server said no" (a non-2xx status, which is not an error).

use thiserror::Error;

/// A key/value pair that cannot be form-encoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// `=value` is not a meaningful pair.
    #[error("empty key")]
    EmptyKey,

    /// Embedded NUL bytes are rejected for both keys and values.
    #[error("NUL byte in {part} of `{key}`")]
    NulByte { key: String, part: &'static str },
}

/// A failure captured while executing a request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("host not found: {0}")]
    HostNotFound(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    /// A null-equivalent input reached a constructor.
    #[error("missing input: {0}")]
    MissingInput(&'static str),

    #[error("invalid input: {0} is not valid UTF-8")]
    InvalidInput(&'static str),
}
