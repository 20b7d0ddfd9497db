use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::auth::{AuthError, JwtAuthenticator, Policy, PolicyTable, Principal};
use crate::error::ApiError;

/// Marks a request whose bearer token was present but rejected
#[derive(Debug, Clone)]
struct TokenRejected;

#[derive(Clone)]
pub struct AuthState {
    authenticator: Arc<JwtAuthenticator>,
    show_pii: bool,
}

impl AuthState {
    pub fn new(authenticator: Arc<JwtAuthenticator>, show_pii: bool) -> Self {
        Self {
            authenticator,
            show_pii,
        }
    }
}

/// Resolves the caller from the bearer token and attaches a [`Principal`].
///
/// Never rejects on its own: a missing or invalid token yields an anonymous
/// principal and the route's policy decides what that means.
pub async fn authenticate(State(state): State<AuthState>, mut request: Request, next: Next) -> Response {
    let principal = match extract_bearer(request.headers()) {
        Ok(None) => Principal::anonymous(),
        Ok(Some(token)) => match state.authenticator.authenticate(&token).await {
            Ok(principal) => {
                if state.show_pii {
                    debug!(name = principal.name(), "Authenticated bearer token");
                }
                principal
            }
            Err(err) => {
                debug!(error = %err, "Rejected bearer token");
                request.extensions_mut().insert(TokenRejected);
                Principal::anonymous()
            }
        },
        Err(err) => {
            debug!(error = %err, "Ignoring malformed Authorization header");
            request.extensions_mut().insert(TokenRejected);
            Principal::anonymous()
        }
    };

    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// Extract the token from `Authorization: Bearer <token>`
fn extract_bearer(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(Some(token.trim().to_string()))
        }
        _ => Err(AuthError::MalformedHeader),
    }
}

/// One named policy bound to the shared requirement table
#[derive(Clone)]
pub struct PolicyGuard {
    policies: Arc<PolicyTable>,
    policy: Policy,
}

impl PolicyGuard {
    pub fn new(policies: Arc<PolicyTable>, policy: Policy) -> Self {
        Self { policies, policy }
    }
}

/// Route-level gate: 401 without an authenticated principal, 403 when the
/// principal lacks the policy's scope.
pub async fn authorize(State(guard): State<PolicyGuard>, request: Request, next: Next) -> Response {
    let extensions = request.extensions();
    let rejected = extensions.get::<TokenRejected>().is_some();
    let decision = match extensions.get::<Principal>() {
        Some(principal) if principal.is_authenticated() => {
            Some(guard.policies.authorize(guard.policy, principal))
        }
        _ => None,
    };

    match decision {
        Some(true) => next.run(request).await,
        Some(false) => {
            let scope = guard.policy.required_scope();
            warn!(policy = guard.policy.name(), scope, "Authorization failed");
            ApiError::forbidden(format!("Missing required scope '{}'", scope)).into_response()
        }
        None => {
            let challenge = if rejected {
                HeaderValue::from_static("Bearer error=\"invalid_token\"")
            } else {
                HeaderValue::from_static("Bearer")
            };
            let mut response = ApiError::unauthorized("Authentication required").into_response();
            response.headers_mut().insert(header::WWW_AUTHENTICATE, challenge);
            response
        }
    }
}

/// Handlers take the caller as an argument; absent means anonymous
#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Principal>().cloned().unwrap_or_default())
    }
}
