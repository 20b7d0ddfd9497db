//! Request/response logging as a tower layer.
//!
//! Whether an exchange is logged, and how it is rendered, are both decided by
//! injected collaborators. When the predicate declines, the request passes
//! through without its body ever being buffered.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, request, response, HeaderMap, Request, Response};
use axum::response::IntoResponse;
use futures::future::BoxFuture;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tower::{Layer, Service};
use tracing::{debug, info, warn};

use crate::config::{ApiConfig, ConfigError};
use crate::error::ApiError;

/// Target of the single event emitted per logged exchange
pub const HTTP_LOG_TARGET: &str = "http_logging";

const REDACTED: &str = "[REDACTED]";

/// Decides per request whether the exchange gets logged
pub trait HttpContextLoggingHandler: Send + Sync {
    fn should_log(&self, request: &Request<Body>) -> bool;
}

/// Renders buffered requests and responses into log text
pub trait HttpObjectConverter: Send + Sync {
    fn to_log_request(&self, parts: &request::Parts, body: &Bytes) -> String;

    fn to_log_response(&self, parts: &response::Parts, body: &Bytes) -> String;
}

#[derive(Clone)]
pub struct LoggingLayer {
    handler: Arc<dyn HttpContextLoggingHandler>,
    converter: Arc<dyn HttpObjectConverter>,
    max_body_bytes: usize,
}

impl LoggingLayer {
    pub fn builder() -> LoggingLayerBuilder {
        LoggingLayerBuilder::default()
    }
}

pub struct LoggingLayerBuilder {
    handler: Option<Arc<dyn HttpContextLoggingHandler>>,
    converter: Option<Arc<dyn HttpObjectConverter>>,
    max_body_bytes: usize,
}

impl Default for LoggingLayerBuilder {
    fn default() -> Self {
        Self {
            handler: None,
            converter: None,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl LoggingLayerBuilder {
    pub fn handler(mut self, handler: Arc<dyn HttpContextLoggingHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn converter(mut self, converter: Arc<dyn HttpObjectConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Upper bound on a request body buffered for logging
    pub fn max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn build(self) -> Result<LoggingLayer, ConfigError> {
        Ok(LoggingLayer {
            handler: self
                .handler
                .ok_or(ConfigError::MissingCollaborator("HttpContextLoggingHandler"))?,
            converter: self
                .converter
                .ok_or(ConfigError::MissingCollaborator("HttpObjectConverter"))?,
            max_body_bytes: self.max_body_bytes,
        })
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            handler: self.handler.clone(),
            converter: self.converter.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

#[derive(Clone)]
pub struct Logging<S> {
    inner: S,
    handler: Arc<dyn HttpContextLoggingHandler>,
    converter: Arc<dyn HttpObjectConverter>,
    max_body_bytes: usize,
}

impl<S> Service<Request<Body>> for Logging<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response<Body>, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        if !self.handler.should_log(&request) {
            return Box::pin(self.inner.call(request));
        }
        // Too large to buffer; downstream applies its own body limit
        if declared_length(request.headers()).is_some_and(|len| len > self.max_body_bytes) {
            debug!(path = request.uri().path(), "Request body over logging limit, forwarding unlogged");
            return Box::pin(self.inner.call(request));
        }

        // The ready service goes into the future, its clone stays behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let converter = self.converter.clone();
        let max_body_bytes = self.max_body_bytes;

        Box::pin(async move {
            let started = Instant::now();
            let (parts, body) = request.into_parts();

            let request_body = match Limited::new(body, max_body_bytes).collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(err) if err.is::<LengthLimitError>() => {
                    return Ok(ApiError::payload_too_large(format!(
                        "Request body exceeds {} bytes",
                        max_body_bytes
                    ))
                    .into_response());
                }
                Err(err) => {
                    warn!(error = %err, "Failed to buffer request body for logging");
                    return Ok(ApiError::bad_request("Failed to read request body").into_response());
                }
            };

            let logged_request = converter.to_log_request(&parts, &request_body);
            let response = inner
                .call(Request::from_parts(parts, Body::from(request_body)))
                .await?;

            let (parts, body) = response.into_parts();
            let response_body = match to_bytes(body, usize::MAX).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(error = %err, "Response body failed while buffering for logging");
                    let failed = futures::stream::once(async move { Err::<Bytes, _>(err) });
                    return Ok(Response::from_parts(parts, Body::from_stream(failed)));
                }
            };

            info!(
                target: HTTP_LOG_TARGET,
                status = parts.status.as_u16(),
                duration_ms = started.elapsed().as_millis() as u64,
                request = %logged_request,
                response = %converter.to_log_response(&parts, &response_body),
                "HTTP exchange"
            );

            Ok(Response::from_parts(parts, Body::from(response_body)))
        })
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Config-driven implementation of both logging collaborators
#[derive(Debug, Clone)]
pub struct LoggingService {
    enabled: bool,
    ignored_paths: Vec<String>,
    max_logged_body_bytes: usize,
}

impl LoggingService {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            enabled: config.enable_request_logging,
            ignored_paths: config.ignored_log_paths.clone(),
            max_logged_body_bytes: config.max_logged_body_bytes,
        }
    }

    fn render_headers(headers: &HeaderMap) -> String {
        headers
            .iter()
            .map(|(name, value)| {
                let value = if value.is_sensitive() {
                    REDACTED
                } else {
                    value.to_str().unwrap_or("<binary>")
                };
                format!("{}: {}", name, value)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn render_body(&self, body: &Bytes) -> String {
        if body.len() <= self.max_logged_body_bytes {
            return String::from_utf8_lossy(body).into_owned();
        }
        format!(
            "{}... ({} bytes total)",
            String::from_utf8_lossy(&body[..self.max_logged_body_bytes]),
            body.len()
        )
    }
}

impl HttpContextLoggingHandler for LoggingService {
    fn should_log(&self, request: &Request<Body>) -> bool {
        let path = request.uri().path();
        self.enabled && !self.ignored_paths.iter().any(|ignored| ignored == path)
    }
}

impl HttpObjectConverter for LoggingService {
    fn to_log_request(&self, parts: &request::Parts, body: &Bytes) -> String {
        format!(
            "{} {} {:?} [{}] {}",
            parts.method,
            parts.uri,
            parts.version,
            Self::render_headers(&parts.headers),
            self.render_body(body)
        )
    }

    fn to_log_response(&self, parts: &response::Parts, body: &Bytes) -> String {
        format!(
            "{} [{}] {}",
            parts.status,
            Self::render_headers(&parts.headers),
            self.render_body(body)
        )
    }
}
