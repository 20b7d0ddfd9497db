use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::debug;

pub static SERVER_TIMING: HeaderName = HeaderName::from_static("server-timing");

/// Times the rest of the pipeline and reports it as `Server-Timing: app;dur=<ms>`
pub async fn server_timing(State(enabled): State<bool>, request: Request, next: Next) -> Response {
    if !enabled {
        return next.run(request).await;
    }

    let started = Instant::now();
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    debug!(path, elapsed_ms, "Request timing");
    if let Ok(value) = HeaderValue::from_str(&format!("app;dur={:.3}", elapsed_ms)) {
        response.headers_mut().append(SERVER_TIMING.clone(), value);
    }
    response
}
