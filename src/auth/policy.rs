use crate::auth::{HasScopeRequirement, Principal};
use crate::config::ConfigError;

/// Named authorization policies guarding the todo endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    GetTodoItems,
    CreateTodoItem,
    UpdateTodoItem,
    DeleteTodoItem,
}

impl Policy {
    pub const ALL: [Policy; 4] = [
        Policy::GetTodoItems,
        Policy::CreateTodoItem,
        Policy::UpdateTodoItem,
        Policy::DeleteTodoItem,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Policy::GetTodoItems => "GetTodoItems",
            Policy::CreateTodoItem => "CreateTodoItem",
            Policy::UpdateTodoItem => "UpdateTodoItem",
            Policy::DeleteTodoItem => "DeleteTodoItem",
        }
    }

    pub fn required_scope(&self) -> &'static str {
        match self {
            Policy::GetTodoItems => "get:todo",
            Policy::CreateTodoItem => "create:todo",
            Policy::UpdateTodoItem => "update:todo",
            Policy::DeleteTodoItem => "delete:todo",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Immutable policy → requirement table, built once at startup
#[derive(Debug, Clone)]
pub struct PolicyTable {
    requirements: [HasScopeRequirement; 4],
}

impl PolicyTable {
    pub fn for_issuer(issuer: &str) -> Result<Self, ConfigError> {
        let requirement = |policy: Policy| HasScopeRequirement::new(policy.required_scope(), issuer);
        Ok(Self {
            requirements: [
                requirement(Policy::GetTodoItems)?,
                requirement(Policy::CreateTodoItem)?,
                requirement(Policy::UpdateTodoItem)?,
                requirement(Policy::DeleteTodoItem)?,
            ],
        })
    }

    pub fn requirement(&self, policy: Policy) -> &HasScopeRequirement {
        &self.requirements[policy.index()]
    }

    pub fn authorize(&self, policy: Policy, principal: &Principal) -> bool {
        self.requirement(policy).is_satisfied_by(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claim;

    const ISSUER: &str = "https://todo.eu.auth0.com/";

    #[test]
    fn every_policy_maps_to_its_scope() {
        let table = PolicyTable::for_issuer(ISSUER).unwrap();
        for policy in Policy::ALL {
            let requirement = table.requirement(policy);
            assert_eq!(requirement.scope(), policy.required_scope());
            assert_eq!(requirement.issuer(), ISSUER);
        }
    }

    #[test]
    fn authorize_checks_the_policy_scope_only() {
        let table = PolicyTable::for_issuer(ISSUER).unwrap();
        let reader = Principal::authenticated(
            Some("reader".into()),
            vec![Claim::new("scope", "get:todo", ISSUER)],
        );

        assert!(table.authorize(Policy::GetTodoItems, &reader));
        assert!(!table.authorize(Policy::CreateTodoItem, &reader));
        assert!(!table.authorize(Policy::DeleteTodoItem, &reader));
    }

    #[test]
    fn blank_issuer_is_rejected() {
        assert!(PolicyTable::for_issuer("").is_err());
    }
}
