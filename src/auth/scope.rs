use crate::auth::Principal;
use crate::config::ConfigError;

/// Claim type carrying the space separated list of granted scopes
pub const SCOPE_CLAIM: &str = "scope";

/// "The token has scope S, issued by I"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HasScopeRequirement {
    scope: String,
    issuer: String,
}

impl HasScopeRequirement {
    pub fn new(scope: impl Into<String>, issuer: impl Into<String>) -> Result<Self, ConfigError> {
        let scope = scope.into();
        let issuer = issuer.into();
        if scope.trim().is_empty() {
            return Err(ConfigError::Missing("scope"));
        }
        if issuer.trim().is_empty() {
            return Err(ConfigError::Missing("issuer"));
        }
        Ok(Self { scope, issuer })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn is_satisfied_by(&self, principal: &Principal) -> bool {
        has_scope(principal, self)
    }
}

/// True when an authenticated principal holds a `scope` claim from the
/// requirement's issuer whose whitespace separated tokens include the scope.
pub fn has_scope(principal: &Principal, requirement: &HasScopeRequirement) -> bool {
    if !principal.is_authenticated() {
        return false;
    }

    principal
        .find_claims(SCOPE_CLAIM)
        .filter(|claim| claim.issuer == requirement.issuer)
        .any(|claim| {
            claim
                .value
                .split_whitespace()
                .any(|granted| granted == requirement.scope)
        })
}
