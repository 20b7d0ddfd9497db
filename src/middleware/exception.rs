//! Turns unhandled failures into a structured 500.
//!
//! Three kinds of failure are recovered: a panic in the wrapped service, an
//! error returned by it, and a response carrying a [`Fault`] extension. The
//! body always has the generic message; the fault detail is only exposed in
//! development.

use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::response::IntoResponse;
use axum::{BoxError, Json};
use futures::future::BoxFuture;
use futures::FutureExt;
use tower::{Layer, Service};
use tracing::error;
use uuid::Uuid;

use crate::config::{ConfigError, Environment};
use crate::error::{ErrorBody, Fault};

pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug, Clone)]
pub struct ExceptionHandlingLayer {
    environment: Environment,
}

impl ExceptionHandlingLayer {
    pub fn builder() -> ExceptionHandlingLayerBuilder {
        ExceptionHandlingLayerBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct ExceptionHandlingLayerBuilder {
    environment: Option<Environment>,
}

impl ExceptionHandlingLayerBuilder {
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn build(self) -> Result<ExceptionHandlingLayer, ConfigError> {
        Ok(ExceptionHandlingLayer {
            environment: self
                .environment
                .ok_or(ConfigError::MissingCollaborator("Environment"))?,
        })
    }
}

impl<S> Layer<S> for ExceptionHandlingLayer {
    type Service = ExceptionHandling<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ExceptionHandling {
            inner,
            environment: self.environment,
            not_ready: None,
        }
    }
}

#[derive(Clone)]
pub struct ExceptionHandling<S> {
    inner: S,
    environment: Environment,
    // Set when the inner service failed readiness; answered on the next call
    not_ready: Option<Fault>,
}

impl<S> Service<Request<Body>> for ExceptionHandling<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response<Body>, Infallible>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.not_ready.is_some() {
            return Poll::Ready(Ok(()));
        }
        match self.inner.poll_ready(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
            Poll::Ready(Err(err)) => {
                let err: BoxError = err.into();
                self.not_ready = Some(Fault::from_error(&*err));
                Poll::Ready(Ok(()))
            }
        }
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let environment = self.environment;
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        if let Some(fault) = self.not_ready.take() {
            return Box::pin(async move { Ok(render(fault, environment, &method, &path)) });
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let outcome = AssertUnwindSafe(async move { inner.call(request).await })
                .catch_unwind()
                .await;

            let fault = match outcome {
                Ok(Ok(mut response)) => match response.extensions_mut().remove::<Fault>() {
                    Some(fault) => fault,
                    None => return Ok(response),
                },
                Ok(Err(err)) => {
                    let err: BoxError = err.into();
                    Fault::from_error(&*err)
                }
                Err(panic) => Fault::from_panic(panic),
            };

            Ok(render(fault, environment, &method, &path))
        })
    }
}

fn render(fault: Fault, environment: Environment, method: &Method, path: &str) -> Response<Body> {
    let error_id = Uuid::new_v4();
    error!(
        %error_id,
        %method,
        path,
        detail = %fault.detail,
        "Unhandled error: {}",
        fault.message
    );

    let body = ErrorBody {
        message: UNEXPECTED_ERROR_MESSAGE.to_string(),
        detail: environment.is_development().then_some(fault.detail),
        error_id: Some(error_id),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
