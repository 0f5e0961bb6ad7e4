//! CORS response headers.
//! Reads the live config on every response so reloads take effect immediately.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, PATCH, OPTIONS, HEAD";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-Request-Id";

pub async fn cors_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    let config = state.config.load();
    if !config.cors.enabled {
        return response;
    }

    let headers = response.headers_mut();
    match HeaderValue::from_str(&config.cors.allow_origin) {
        Ok(origin) => {
            headers
                .entry(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .or_insert(origin);
        }
        Err(_) => {
            tracing::warn!(origin = %config.cors.allow_origin, "Invalid CORS origin in config");
        }
    }
    headers
        .entry(header::ACCESS_CONTROL_ALLOW_METHODS)
        .or_insert(HeaderValue::from_static(ALLOWED_METHODS));
    headers
        .entry(header::ACCESS_CONTROL_ALLOW_HEADERS)
        .or_insert(HeaderValue::from_static(ALLOWED_HEADERS));

    response
}
