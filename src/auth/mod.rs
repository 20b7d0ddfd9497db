pub mod jwt;
pub mod policy;
pub mod scope;

use thiserror::Error;

pub use jwt::{JwksKeyProvider, JwtAuthenticator, KeyProvider, SharedSecretKeyProvider};
pub use policy::{Policy, PolicyTable};
pub use scope::{has_scope, HasScopeRequirement, SCOPE_CLAIM};

/// One claim of a validated token, remembering who issued it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
    pub issuer: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
            issuer: issuer.into(),
        }
    }
}

/// The caller of the current request
#[derive(Debug, Clone, Default)]
pub struct Principal {
    authenticated: bool,
    name: Option<String>,
    claims: Vec<Claim>,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(name: Option<String>, claims: Vec<Claim>) -> Self {
        Self {
            authenticated: true,
            name,
            claims,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn find_claims<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a Claim> + 'a {
        self.claims.iter().filter(move |c| c.claim_type == claim_type)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization header must use Bearer token format")]
    MalformedHeader,

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("No signing key matches kid '{0}'")]
    UnknownSigningKey(String),

    #[error("Failed to fetch signing keys: {0}")]
    KeyFetch(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_principal_has_nothing() {
        let principal = Principal::anonymous();
        assert!(!principal.is_authenticated());
        assert!(principal.name().is_none());
        assert!(principal.claims().is_empty());
    }

    #[test]
    fn find_claims_filters_by_type() {
        let principal = Principal::authenticated(
            Some("alice".into()),
            vec![
                Claim::new("scope", "get:todo", "https://issuer/"),
                Claim::new("sub", "alice", "https://issuer/"),
                Claim::new("scope", "create:todo", "https://other/"),
            ],
        );
        assert_eq!(principal.find_claims("scope").count(), 2);
        assert_eq!(principal.find_claims("aud").count(), 0);
    }
}
