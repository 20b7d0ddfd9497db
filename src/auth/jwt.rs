//! Bearer token validation
//!
//! Tokens are checked against the configured authority (issuer) and audience.
//! Signing keys come from a [`KeyProvider`]: the authority's JWKS document in
//! deployments, or a shared HS256 secret for local development.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Header, Validation};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use url::Url;

use super::{AuthError, Claim, Principal};
use crate::config::AuthConfig;

/// Claims tried, in order, when the configured name claim is absent
const FALLBACK_NAME_CLAIMS: &[&str] = &["azp", "client_id"];

/// Resolves the key that must have signed a token with the given header
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn decoding_key(&self, header: &Header) -> Result<(DecodingKey, Algorithm), AuthError>;
}

/// HS256 with a secret shared between issuer and API
pub struct SharedSecretKeyProvider {
    key: DecodingKey,
}

impl SharedSecretKeyProvider {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
        }
    }
}

#[async_trait]
impl KeyProvider for SharedSecretKeyProvider {
    async fn decoding_key(&self, header: &Header) -> Result<(DecodingKey, Algorithm), AuthError> {
        if header.alg != Algorithm::HS256 {
            return Err(AuthError::InvalidToken(format!(
                "expected HS256 token, got {:?}",
                header.alg
            )));
        }
        Ok((self.key.clone(), Algorithm::HS256))
    }
}

/// Public keys published at `{authority}.well-known/jwks.json`.
///
/// The set is fetched lazily and refetched when a token names an unknown
/// `kid`, at most once per [`JwksKeyProvider::MIN_REFRESH_INTERVAL`]
/// whether or not the previous fetch succeeded.
pub struct JwksKeyProvider {
    jwks_url: Url,
    client: reqwest::Client,
    cache: RwLock<Option<JwkSet>>,
    // Held for the whole fetch so concurrent misses share one request
    last_attempt: Mutex<Option<Instant>>,
}

impl JwksKeyProvider {
    pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

    pub fn new(authority: &str) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        Ok(Self {
            jwks_url: Self::jwks_url(authority)?,
            client,
            cache: RwLock::new(None),
            last_attempt: Mutex::new(None),
        })
    }

    /// Provider whose cache starts out filled, e.g. from a pinned key set
    pub fn with_keys(authority: &str, keys: JwkSet) -> Result<Self, AuthError> {
        let provider = Self::new(authority)?;
        Ok(Self {
            cache: RwLock::new(Some(keys)),
            last_attempt: Mutex::new(Some(Instant::now())),
            ..provider
        })
    }

    pub fn jwks_url(authority: &str) -> Result<Url, AuthError> {
        let mut base = Url::parse(authority)
            .map_err(|e| AuthError::KeyFetch(format!("invalid authority '{}': {}", authority, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(".well-known/jwks.json")
            .map_err(|e| AuthError::KeyFetch(e.to_string()))
    }

    async fn lookup(&self, kid: &str) -> Option<DecodingKey> {
        let cache = self.cache.read().await;
        let jwk = cache.as_ref()?.find(kid)?;
        DecodingKey::from_jwk(jwk).ok()
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        let mut last_attempt = self.last_attempt.lock().await;
        if last_attempt.is_some_and(|at| at.elapsed() < Self::MIN_REFRESH_INTERVAL) {
            return Ok(());
        }
        *last_attempt = Some(Instant::now());

        let keys = self
            .client
            .get(self.jwks_url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        info!("Fetched {} signing keys from {}", keys.keys.len(), self.jwks_url);
        *self.cache.write().await = Some(keys);
        Ok(())
    }
}

#[async_trait]
impl KeyProvider for JwksKeyProvider {
    async fn decoding_key(&self, header: &Header) -> Result<(DecodingKey, Algorithm), AuthError> {
        // Published keys are asymmetric; an HMAC header here is an algorithm confusion attempt
        if matches!(header.alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(AuthError::InvalidToken(format!(
                "symmetric algorithm {:?} not accepted",
                header.alg
            )));
        }
        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| AuthError::InvalidToken("token header has no kid".to_string()))?;

        if let Some(key) = self.lookup(kid).await {
            return Ok((key, header.alg));
        }

        debug!(kid, "Signing key not cached, refreshing JWKS");
        self.refresh().await?;
        self.lookup(kid)
            .await
            .map(|key| (key, header.alg))
            .ok_or_else(|| AuthError::UnknownSigningKey(kid.to_string()))
    }
}

/// Validates bearer tokens and turns their claims into a [`Principal`]
pub struct JwtAuthenticator {
    keys: Arc<dyn KeyProvider>,
    issuer: String,
    audience: String,
    name_claim: String,
}

impl JwtAuthenticator {
    pub fn new(
        keys: Arc<dyn KeyProvider>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        name_claim: impl Into<String>,
    ) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
            name_claim: name_claim.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let authority = config.authority();
        let keys: Arc<dyn KeyProvider> = match &config.signing_secret {
            Some(secret) => Arc::new(SharedSecretKeyProvider::new(secret.as_bytes())),
            None => Arc::new(JwksKeyProvider::new(&authority)?),
        };
        Ok(Self::new(keys, authority, &config.audience, &config.name_claim))
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let (key, algorithm) = self.keys.decoding_key(&header).await?;

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let token_data = decode::<Map<String, Value>>(token, &key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        Ok(self.principal_from_claims(token_data.claims))
    }

    fn principal_from_claims(&self, claims: Map<String, Value>) -> Principal {
        let issuer = claims
            .get("iss")
            .and_then(Value::as_str)
            .unwrap_or(&self.issuer)
            .to_string();

        let mut flattened = Vec::new();
        for (claim_type, value) in &claims {
            match value {
                Value::Array(items) => {
                    for item in items {
                        if let Some(v) = scalar_to_string(item) {
                            flattened.push(Claim::new(claim_type, v, &issuer));
                        }
                    }
                }
                other => {
                    if let Some(v) = scalar_to_string(other) {
                        flattened.push(Claim::new(claim_type, v, &issuer));
                    }
                }
            }
        }

        let name = std::iter::once(self.name_claim.as_str())
            .chain(FALLBACK_NAME_CLAIMS.iter().copied())
            .find_map(|wanted| {
                flattened
                    .iter()
                    .find(|claim| claim.claim_type == wanted)
                    .map(|claim| claim.value.clone())
            });

        Principal::authenticated(name, flattened)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
