use axum::{
    extract::{Request, State},
    http::{header, uri::Scheme, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::error::ApiError;

/// Redirects plain HTTP requests to their HTTPS equivalent (307, so the
/// method and body are replayed). Passes everything through when disabled.
pub async fn redirect_to_https(State(require_https): State<bool>, request: Request, next: Next) -> Response {
    if !require_https || is_https(&request) {
        return next.run(request).await;
    }

    let Some(host) = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
    else {
        return ApiError::bad_request("Missing Host header").into_response();
    };

    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let location = format!("https://{}{}", strip_port(host), path);

    match HeaderValue::from_str(&location) {
        Ok(value) => {
            debug!(%location, "Redirecting to HTTPS");
            (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, value)]).into_response()
        }
        Err(_) => ApiError::bad_request("Invalid Host header").into_response(),
    }
}

fn is_https(request: &Request) -> bool {
    if request.uri().scheme() == Some(&Scheme::HTTPS) {
        return true;
    }
    request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

// The plain-HTTP port never applies to the HTTPS location
fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_are_stripped_from_hosts() {
        assert_eq!(strip_port("api.todo.test:8080"), "api.todo.test");
        assert_eq!(strip_port("api.todo.test"), "api.todo.test");
        assert_eq!(strip_port("[::1]:80"), "[::1]");
        assert_eq!(strip_port("[::1]"), "[::1]");
    }

    #[test]
    fn forwarded_proto_counts_as_https() {
        let request = axum::http::Request::get("/todoitems")
            .header("x-forwarded-proto", "HTTPS")
            .body(axum::body::Body::empty())
            .unwrap();
        assert!(is_https(&request));

        let request = axum::http::Request::get("https://api.todo.test/todoitems")
            .body(axum::body::Body::empty())
            .unwrap();
        assert!(is_https(&request));

        let request = axum::http::Request::get("/todoitems").body(axum::body::Body::empty()).unwrap();
        assert!(!is_https(&request));
    }
}
