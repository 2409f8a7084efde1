//! Outcome of a webservice permission check.

use serde::{Deserialize, Serialize};

use super::organization::AccessingOrganizations;
use crate::services::error::AuthzError;

/// Row-level scope attached to a grant. Each populated field unlocks an
/// independent subset of rows; the subsets are ORed together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessScope {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub owner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_role: Option<AccessingOrganizations>,
}

impl AccessScope {
    pub fn owner() -> Self {
        Self {
            owner: true,
            organization_role: None,
        }
    }

    pub fn organization_role(orgs: AccessingOrganizations) -> Self {
        Self {
            owner: false,
            organization_role: Some(orgs),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.owner && self.organization_role.as_ref().is_none_or(AccessingOrganizations::is_empty)
    }

    pub fn merge(&mut self, other: AccessScope) {
        self.owner |= other.owner;
        if let Some(orgs) = other.organization_role {
            match &mut self.organization_role {
                Some(existing) => existing.union(&orgs),
                None => self.organization_role = Some(orgs),
            }
        }
    }
}

/// What a single strategy grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    Full,
    Scoped(AccessScope),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    PermissionDenied,
    AuthenticationRequired,
    AlreadyConnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Denied(DenialReason),
    FullGrant,
    ScopedGrant(AccessScope),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, AccessDecision::Denied(_))
    }

    /// `false`, `true`, or the scope map, as seen on the wire.
    pub fn access_type(&self) -> serde_json::Value {
        match self {
            AccessDecision::Denied(_) => serde_json::Value::Bool(false),
            AccessDecision::FullGrant => serde_json::Value::Bool(true),
            AccessDecision::ScopedGrant(scope) => {
                serde_json::to_value(scope).unwrap_or(serde_json::Value::Bool(false))
            }
        }
    }

    pub fn into_result(self) -> Result<AccessDecision, AuthzError> {
        match self {
            AccessDecision::Denied(DenialReason::PermissionDenied) => {
                Err(AuthzError::PermissionDenied)
            }
            AccessDecision::Denied(DenialReason::AuthenticationRequired) => {
                Err(AuthzError::AuthenticationRequired)
            }
            AccessDecision::Denied(DenialReason::AlreadyConnected) => {
                Err(AuthzError::AlreadyConnected)
            }
            granted => Ok(granted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_access_type_wire_values() {
        assert_eq!(AccessDecision::Denied(DenialReason::PermissionDenied).access_type(), json!(false));
        assert_eq!(AccessDecision::FullGrant.access_type(), json!(true));

        let scope = AccessScope::organization_role(AccessingOrganizations::new().with("client", "org1"));
        assert_eq!(
            AccessDecision::ScopedGrant(scope).access_type(),
            json!({"organization_role": {"client": ["org1"]}})
        );
        assert_eq!(
            AccessDecision::ScopedGrant(AccessScope::owner()).access_type(),
            json!({"owner": true})
        );
    }

    #[test]
    fn test_merge_accumulates_scopes() {
        let mut scope = AccessScope::owner();
        scope.merge(AccessScope::organization_role(
            AccessingOrganizations::new().with("client", "A"),
        ));
        scope.merge(AccessScope::organization_role(
            AccessingOrganizations::new().with("client", "B"),
        ));

        assert!(scope.owner);
        let orgs = scope.organization_role.unwrap();
        assert!(orgs.contains("client", "A"));
        assert!(orgs.contains("client", "B"));
    }

    #[test]
    fn test_denials_map_to_errors() {
        let err = AccessDecision::Denied(DenialReason::AuthenticationRequired)
            .into_result()
            .unwrap_err();
        assert!(matches!(err, AuthzError::AuthenticationRequired));
        assert!(AccessDecision::FullGrant.into_result().is_ok());
    }
}
