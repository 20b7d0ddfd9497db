//! Composition root: state, policies, routes and the middleware stack

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::header,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tracing::info;

use crate::auth::{JwtAuthenticator, Policy, PolicyTable};
use crate::config::{AppConfig, ConfigError};
use crate::database::TodoRepository;
use crate::handlers::{health, todo_items};
use crate::middleware::{
    authenticate, authorize, redirect_to_https, server_timing, AuthState, ExceptionHandlingLayer,
    LoggingLayer, LoggingService, PolicyGuard,
};
use crate::services::TodoService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub todo_service: TodoService,
}

/// Build the application router.
///
/// Middleware runs outermost first: header redaction, logging, exception
/// handling, profiling, HTTPS redirection, body limit, authentication. Each
/// route then applies its policy before the handler runs.
pub fn build(
    config: &AppConfig,
    repository: Arc<dyn TodoRepository>,
    authenticator: Arc<JwtAuthenticator>,
) -> Result<Router, ConfigError> {
    let policies = Arc::new(PolicyTable::for_issuer(authenticator.issuer())?);
    let state = AppState {
        todo_service: TodoService::new(repository, config.api.max_page_size),
    };

    let logging = Arc::new(LoggingService::new(&config.api));
    let logging_layer = LoggingLayer::builder()
        .handler(logging.clone())
        .converter(logging)
        .max_body_bytes(config.api.max_request_size_bytes)
        .build()?;
    let exception_layer = ExceptionHandlingLayer::builder()
        .environment(config.environment)
        .build()?;
    let auth_state = AuthState::new(authenticator, config.environment.is_development());

    let guard = |policy: Policy| from_fn_with_state(PolicyGuard::new(policies.clone(), policy), authorize);

    let router = Router::new()
        .route(
            "/todoitems",
            get(todo_items::list)
                .route_layer(guard(Policy::GetTodoItems))
                .merge(post(todo_items::create).route_layer(guard(Policy::CreateTodoItem))),
        )
        .route(
            "/todoitems/:id",
            get(todo_items::get)
                .route_layer(guard(Policy::GetTodoItems))
                .merge(axum::routing::put(todo_items::update).route_layer(guard(Policy::UpdateTodoItem)))
                .merge(axum::routing::delete(todo_items::delete).route_layer(guard(Policy::DeleteTodoItem))),
        )
        .route("/health", get(health::health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetSensitiveRequestHeadersLayer::new(std::iter::once(header::AUTHORIZATION)))
                .layer(logging_layer)
                .layer(exception_layer)
                .layer(from_fn_with_state(config.profiling.enabled, server_timing))
                .layer(from_fn_with_state(config.security.require_https, redirect_to_https))
                .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
                .layer(from_fn_with_state(auth_state, authenticate)),
        );

    info!(
        environment = ?config.environment,
        profiling = config.profiling.enabled,
        require_https = config.security.require_https,
        "Router assembled"
    );
    Ok(router)
}
