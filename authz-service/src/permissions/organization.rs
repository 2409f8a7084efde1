use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{AccessContext, PermissionStrategy};
use crate::models::{
    AccessLevel, AccessScope, AccessingOrganizations, EntityDescriptor, Grant, OrgRef, Predicate,
    Statement, WebserviceConfig,
};
use crate::services::directory::AccessDirectory;
use crate::services::error::AuthzError;

/// Re-verifies subscriptions for licensed webservices at call time, bounded
/// by a timeout.
#[derive(Clone)]
pub struct LiveSubscriptionCheck {
    directory: Arc<dyn AccessDirectory>,
    timeout: Duration,
}

impl LiveSubscriptionCheck {
    pub fn new(directory: Arc<dyn AccessDirectory>, timeout: Duration) -> Self {
        Self { directory, timeout }
    }

    async fn is_active(&self, org: &OrgRef) -> Result<bool, AuthzError> {
        match tokio::time::timeout(self.timeout, self.directory.has_active_subscription(org)).await {
            Ok(Ok(active)) => Ok(active),
            Ok(Err(e)) => {
                tracing::error!(org = %org, error = %e, "Subscription lookup failed");
                Err(AuthzError::Lookup(e))
            }
            Err(_) => {
                tracing::error!(org = %org, timeout_ms = self.timeout.as_millis() as u64, "Subscription lookup timed out");
                Err(AuthzError::Indeterminate(format!(
                    "subscription check for {} timed out",
                    org
                )))
            }
        }
    }
}

/// Scoped access from `organizations` claims. Looks at the organization map
/// only, and only for webservices declaring the organization-role level.
#[derive(Default)]
pub struct OrganizationPermission {
    live_check: Option<LiveSubscriptionCheck>,
}

impl OrganizationPermission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_live_check(check: LiveSubscriptionCheck) -> Self {
        Self {
            live_check: Some(check),
        }
    }
}

#[async_trait]
impl PermissionStrategy for OrganizationPermission {
    fn name(&self) -> &'static str {
        "organization"
    }

    async fn check_webservice_permission(
        &self,
        webservice: &WebserviceConfig,
        ctx: &AccessContext,
    ) -> Result<Option<Grant>, AuthzError> {
        if !webservice.declares(AccessLevel::OrganizationRole) {
            return Ok(None);
        }
        let Some(claims) = ctx.claims.as_deref() else {
            return Ok(None);
        };

        let mut granting: Vec<OrgRef> = claims
            .organizations
            .iter()
            .filter(|(_, grant)| grant.webservices.contains(&webservice.id))
            .map(|(org_id, grant)| OrgRef::new(grant.level.clone(), org_id.clone()))
            .collect();

        if let (Some(check), true) = (&self.live_check, webservice.is_licenced) {
            let mut verified = Vec::with_capacity(granting.len());
            for org in granting {
                if check.is_active(&org).await? {
                    verified.push(org);
                } else {
                    tracing::debug!(org = %org, webservice = %webservice.id, "Subscription no longer active");
                }
            }
            granting = verified;
        }

        if granting.is_empty() {
            return Ok(None);
        }

        let orgs: AccessingOrganizations = granting.into_iter().collect();
        Ok(Some(Grant::Scoped(AccessScope::organization_role(orgs))))
    }

    fn add_statement_access_constraints(
        &self,
        statement: &mut Statement,
        or_where: Predicate,
        scope: &AccessScope,
        _ctx: &AccessContext,
        entity: &dyn EntityDescriptor,
    ) -> Result<Predicate, AuthzError> {
        let Some(orgs) = scope.organization_role.as_ref() else {
            return Ok(or_where);
        };

        match entity.organization_accessing_filters(statement, orgs) {
            Some(predicates) => Ok(or_where | Predicate::any(predicates)),
            None => {
                tracing::debug!(
                    entity = entity.entity_name(),
                    "Entity is not organization-scoped, organization axis adds no rows"
                );
                Ok(or_where)
            }
        }
    }
}
