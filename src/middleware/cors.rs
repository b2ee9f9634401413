use axum::{
    extract::{Request, State},
    http::{header::HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "authorization, x-api-key, content-type";
const MAX_AGE: &str = "86400";

/// Outermost layer: every response, success or error, carries the fixed CORS
/// header set, and `OPTIONS` is answered immediately before authentication,
/// tenant resolution, or routing run.
pub async fn cors_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let origin = state.config.security.cors_origin.clone();

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(&mut response, &origin);
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(&mut response, &origin);
    response
}

fn apply_cors_headers(response: &mut Response, origin: &str) {
    let headers = response.headers_mut();
    insert(headers, "access-control-allow-origin", origin);
    insert(headers, "access-control-allow-methods", ALLOW_METHODS);
    insert(headers, "access-control-allow-headers", ALLOW_HEADERS);
    insert(headers, "access-control-max-age", MAX_AGE);
}

fn insert(headers: &mut axum::http::HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}
