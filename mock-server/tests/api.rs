use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, pattern_byte, Echo};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

// --- echo ---

#[tokio::test]
async fn echo_reports_get_without_body() {
    let resp = app().oneshot(get("/echo")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "GET");
    assert!(echo.query.is_none());
    assert!(echo.body.is_empty());
    assert!(!echo.headers.contains_key("content-type"));
}

#[tokio::test]
async fn echo_reports_raw_query() {
    let resp = app().oneshot(get("/echo?q=a+b%26c&page=1")).await.unwrap();

    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.query.as_deref(), Some("q=a+b%26c&page=1"));
}

#[tokio::test]
async fn echo_reports_form_post() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/echo")
                .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body("gender=female".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.body, "gender=female");
    assert_eq!(
        echo.headers.get("content-type").map(String::as_str),
        Some("application/x-www-form-urlencoded")
    );
}

#[tokio::test]
async fn echo_joins_repeated_headers() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/echo")
                .header("x-a", "1")
                .header("x-a", "2")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.headers.get("x-a").map(String::as_str), Some("1, 2"));
}

// --- status ---

#[tokio::test]
async fn status_route_returns_requested_code() {
    let resp = app().oneshot(get("/status/503")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_bytes(resp).await, "status 503");
}

#[tokio::test]
async fn status_route_rejects_invalid_code() {
    let resp = app().oneshot(get("/status/42")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- bytes ---

#[tokio::test]
async fn bytes_route_returns_pattern() {
    let resp = app().oneshot(get("/bytes/3000")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_bytes(resp).await;
    assert_eq!(body.len(), 3000);
    assert!(body.iter().enumerate().all(|(i, b)| *b == pattern_byte(i)));
}

// --- headers / redirect / fallback ---

#[tokio::test]
async fn headers_route_sets_custom_headers() {
    let resp = app().oneshot(get("/headers")).await.unwrap();

    assert_eq!(resp.headers()["x-nettask"], "yes");
    let vary: Vec<_> = resp.headers().get_all(http::header::VARY).iter().collect();
    assert_eq!(vary.len(), 2);
}

#[tokio::test]
async fn redirect_points_to_echo() {
    let resp = app().oneshot(get("/redirect")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()[http::header::LOCATION], "/echo");
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let resp = app().oneshot(get("/nothing/here")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_bytes(resp).await, "not found");
}
