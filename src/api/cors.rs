use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

const ALLOWED_METHODS: &str = "GET,POST,OPTIONS";
const ALLOWED_HEADERS: &str = "content-type,authorization";
const MAX_AGE_SECS: &str = "86400";

fn is_loopback_origin(origin: &str, host: &str) -> bool {
    let Some(rest) = origin.strip_prefix("http://").and_then(|o| o.strip_prefix(host)) else {
        return false;
    };
    match rest.strip_prefix(':') {
        None => rest.is_empty(),
        Some(port) => !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()),
    }
}

/// Echo local dev origins and any https origin; everything else gets `*`.
pub fn resolve_origin(origin: Option<&str>) -> &str {
    match origin {
        Some(o) if is_loopback_origin(o, "localhost") || is_loopback_origin(o, "127.0.0.1") => o,
        Some(o) if o.starts_with("https://") => o,
        _ => "*",
    }
}

pub fn apply_cors_headers(headers: &mut HeaderMap, origin: Option<&str>) {
    let allow_origin = HeaderValue::from_str(resolve_origin(origin))
        .unwrap_or_else(|_| HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS));
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE_SECS));
    headers.insert(header::VARY, HeaderValue::from_static("Origin"));
}

/// Middleware: answers preflight directly and stamps CORS headers on every
/// other response.
pub async fn cors(req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let mut response = if req.method() == Method::OPTIONS {
        (StatusCode::OK, "ok").into_response()
    } else {
        next.run(req).await
    };

    apply_cors_headers(response.headers_mut(), origin.as_deref());
    response
}
