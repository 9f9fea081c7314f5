//! Middleware for the Tollgate HTTP surface

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tollgate_core::correlation::REQUEST_ID_HEADER;
use tracing::{debug, info, warn};

/// Request logging middleware
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let inbound_id = request_id(request.headers()).map(str::to_string);
    let start_time = Instant::now();

    debug!("Incoming request: {} {}", method, uri);

    let response = next.run(request).await;

    let duration = start_time.elapsed();
    let status = response.status();
    // Handlers echo the id they resolved, which may be server-generated
    let id = request_id(response.headers())
        .map(str::to_string)
        .or(inbound_id)
        .unwrap_or_else(|| "-".to_string());

    if status.is_success() {
        info!("[{}] {} {} - {} ({:?})", id, method, uri, status, duration);
    } else {
        warn!("[{}] {} {} - {} ({:?})", id, method, uri, status, duration);
    }

    response
}

/// Security headers added to every response
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));

    response
}

/// `X-Request-ID` header value, if present and valid UTF-8
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok())
}
