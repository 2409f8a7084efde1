//! Permission strategies.
//!
//! Each strategy inspects one kind of credential and either grants access to
//! a webservice or defers. Strategies are assembled once, in a fixed order,
//! and handed to the engine.

pub mod internal_service;
pub mod organization;
pub mod webservice_claim;

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{
    AccessClaims, AccessScope, EntityDescriptor, Grant, Predicate, ServiceIdentity, Statement,
    WebserviceConfig,
};
use crate::services::error::AuthzError;

pub use internal_service::InternalServicePermission;
pub use organization::{LiveSubscriptionCheck, OrganizationPermission};
pub use webservice_claim::WebserviceClaimPermission;

/// Credentials attached to one call. Both halves are optional.
#[derive(Debug, Clone, Default)]
pub struct AccessContext {
    pub claims: Option<Arc<AccessClaims>>,
    pub service: Option<Arc<ServiceIdentity>>,
}

impl AccessContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(claims: AccessClaims) -> Self {
        Self {
            claims: Some(Arc::new(claims)),
            service: None,
        }
    }

    pub fn service(identity: ServiceIdentity) -> Self {
        Self {
            claims: None,
            service: Some(Arc::new(identity)),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.claims.is_none() && self.service.is_none()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.claims.as_deref().map(|c| c.sub.as_str())
    }
}

#[async_trait]
pub trait PermissionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` defers to the next strategy.
    async fn check_webservice_permission(
        &self,
        webservice: &WebserviceConfig,
        ctx: &AccessContext,
    ) -> Result<Option<Grant>, AuthzError>;

    /// OR this strategy's row predicates into `or_where` for a scoped grant.
    fn add_statement_access_constraints(
        &self,
        _statement: &mut Statement,
        or_where: Predicate,
        _scope: &AccessScope,
        _ctx: &AccessContext,
        _entity: &dyn EntityDescriptor,
    ) -> Result<Predicate, AuthzError> {
        Ok(or_where)
    }
}

/// Internal service, then organization, then flat webservice claims.
pub fn default_chain(live_check: Option<LiveSubscriptionCheck>) -> Vec<Arc<dyn PermissionStrategy>> {
    let organization = match live_check {
        Some(check) => OrganizationPermission::with_live_check(check),
        None => OrganizationPermission::new(),
    };

    vec![
        Arc::new(InternalServicePermission),
        Arc::new(organization),
        Arc::new(WebserviceClaimPermission),
    ]
}
