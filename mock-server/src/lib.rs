//! Local HTTP server the request pipeline is tested against.
//!
//! Routes:
//! - `/echo` (any method): reports method, raw query, headers and body as JSON
//! - `/status/{code}`: responds with `code` and body `status {code}`
//! - `/bytes/{n}`: `n` bytes of a repeating pattern
//! - `/headers`: fixed custom headers, `vary` sent twice
//! - `/redirect`: 302 to `/echo`
//! - anything else: 404 with body `not found`

use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What `/echo` saw.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub query: Option<String>,
    /// Lowercase header names; repeated headers joined with `, `.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", get(status))
        .route("/bytes/{n}", get(bytes))
        .route("/headers", get(headers))
        .route("/redirect", any(redirect))
        .fallback(not_found)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Byte `i` of the `/bytes/{n}` payload.
pub fn pattern_byte(i: usize) -> u8 {
    (i % 251) as u8
}

async fn echo(method: Method, RawQuery(query): RawQuery, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let mut seen = BTreeMap::new();
    for (name, value) in &headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        seen.entry(name.as_str().to_string())
            .and_modify(|v: &mut String| {
                v.push_str(", ");
                v.push_str(&value);
            })
            .or_insert(value);
    }
    log::debug!("echo {method} query={query:?}");
    Json(Echo {
        method: method.to_string(),
        query,
        headers: seen,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> impl IntoResponse {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, format!("status {code}")),
        Err(_) => (StatusCode::BAD_REQUEST, format!("invalid status {code}")),
    }
}

async fn bytes(Path(n): Path<usize>) -> Vec<u8> {
    (0..n).map(pattern_byte).collect()
}

async fn headers() -> impl IntoResponse {
    let mut map = HeaderMap::new();
    map.insert("x-nettask", HeaderValue::from_static("yes"));
    map.append(header::VARY, HeaderValue::from_static("accept"));
    map.append(header::VARY, HeaderValue::from_static("origin"));
    (map, "with headers")
}

async fn redirect() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/echo")], "moved")
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}
