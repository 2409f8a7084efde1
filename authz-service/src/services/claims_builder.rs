//! Access claims computation at authentication time.
//!
//! A fixed, ordered list of contributors each receives the partial claims
//! and returns them updated. Any stage failure aborts the whole build.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::directory::{AccessDirectory, Principal};
use super::error::AuthzError;
use super::registry::WebserviceRegistry;
use crate::models::{
    AccessClaims, AccessLevel, OrgRef, OrganizationGrant, PublicType, WebserviceScope,
};

#[async_trait]
pub trait ClaimsContributor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Role and organization stages return true; once the claims carry
    /// `is_super_user` they are not run.
    fn skipped_for_super_user(&self) -> bool {
        false
    }

    async fn contribute(
        &self,
        claims: AccessClaims,
        principal: &Principal,
    ) -> Result<AccessClaims, AuthzError>;
}

// ============================================================================
// Contributors
// ============================================================================

/// Subject, super-user flag and the webservices every connected user reaches.
pub struct BaseIdentity {
    registry: WebserviceRegistry,
}

impl BaseIdentity {
    pub fn new(registry: WebserviceRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ClaimsContributor for BaseIdentity {
    fn name(&self) -> &'static str {
        "base_identity"
    }

    async fn contribute(
        &self,
        mut claims: AccessClaims,
        principal: &Principal,
    ) -> Result<AccessClaims, AuthzError> {
        claims.sub = principal.user_id.clone();
        claims.is_super_user |= principal.is_super_user;

        let snapshot = self.registry.snapshot();
        for ws in snapshot.enabled() {
            if ws.public_type == Some(PublicType::NoLimitation) || ws.declares(AccessLevel::Connected)
            {
                claims.grant_webservice(ws.id.clone(), WebserviceScope::Full);
            } else if ws.declares(AccessLevel::Owner) {
                claims.grant_webservice(ws.id.clone(), WebserviceScope::Owner);
            }
        }
        Ok(claims)
    }
}

/// Webservices granted by global roles, upgraded to full.
pub struct RoleWebservices {
    directory: Arc<dyn AccessDirectory>,
}

impl RoleWebservices {
    pub fn new(directory: Arc<dyn AccessDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl ClaimsContributor for RoleWebservices {
    fn name(&self) -> &'static str {
        "role_webservices"
    }

    fn skipped_for_super_user(&self) -> bool {
        true
    }

    async fn contribute(
        &self,
        mut claims: AccessClaims,
        principal: &Principal,
    ) -> Result<AccessClaims, AuthzError> {
        let webservices = self
            .directory
            .role_webservices(&principal.user_id)
            .await
            .map_err(AuthzError::Lookup)?;

        for ws in webservices {
            claims.grant_webservice(ws, WebserviceScope::Full);
        }
        Ok(claims)
    }
}

/// Organization grants from ownership and from roles held inside
/// organizations. Ownership wins per organization.
pub struct OrganizationWebservices {
    directory: Arc<dyn AccessDirectory>,
    registry: WebserviceRegistry,
}

impl OrganizationWebservices {
    pub fn new(directory: Arc<dyn AccessDirectory>, registry: WebserviceRegistry) -> Self {
        Self {
            directory,
            registry,
        }
    }
}

#[async_trait]
impl ClaimsContributor for OrganizationWebservices {
    fn name(&self) -> &'static str {
        "organization_webservices"
    }

    fn skipped_for_super_user(&self) -> bool {
        true
    }

    async fn contribute(
        &self,
        mut claims: AccessClaims,
        principal: &Principal,
    ) -> Result<AccessClaims, AuthzError> {
        let owned = self
            .directory
            .owned_organizations(&principal.user_id)
            .await
            .map_err(AuthzError::Lookup)?;
        let role = self
            .directory
            .organization_role_webservices(&principal.user_id)
            .await
            .map_err(AuthzError::Lookup)?;

        let organization_webservices = self.registry.snapshot().ids_with_level(AccessLevel::OrganizationRole);
        let owner: BTreeMap<String, OrganizationGrant> = owned
            .into_iter()
            .map(|org| {
                (
                    org.id,
                    OrganizationGrant {
                        level: org.kind,
                        webservices: organization_webservices.clone(),
                    },
                )
            })
            .collect();

        claims.merge_organizations(owner, role);
        Ok(claims)
    }
}

/// Drops licensed webservices from organizations that cannot use them:
/// owned organizations need an active subscription, member organizations
/// need the principal to hold a license seat.
pub struct LicensedOrganizations {
    directory: Arc<dyn AccessDirectory>,
    registry: WebserviceRegistry,
}

impl LicensedOrganizations {
    pub fn new(directory: Arc<dyn AccessDirectory>, registry: WebserviceRegistry) -> Self {
        Self {
            directory,
            registry,
        }
    }
}

#[async_trait]
impl ClaimsContributor for LicensedOrganizations {
    fn name(&self) -> &'static str {
        "licensed_organizations"
    }

    fn skipped_for_super_user(&self) -> bool {
        true
    }

    async fn contribute(
        &self,
        mut claims: AccessClaims,
        principal: &Principal,
    ) -> Result<AccessClaims, AuthzError> {
        if claims.organizations.is_empty() {
            return Ok(claims);
        }

        let owned = self
            .directory
            .owned_organizations(&principal.user_id)
            .await
            .map_err(AuthzError::Lookup)?;
        let snapshot = self.registry.snapshot();

        let mut filtered = BTreeMap::new();
        for (org_id, grant) in std::mem::take(&mut claims.organizations) {
            let org = OrgRef::new(grant.level.clone(), org_id.clone());
            let (licensed, mut kept): (Vec<String>, Vec<String>) = grant
                .webservices
                .into_iter()
                .partition(|ws| snapshot.is_licenced(ws));

            if !licensed.is_empty() {
                let lookup = if owned.contains(&org) {
                    self.directory.has_active_subscription(&org).await
                } else {
                    self.directory.holds_license(&principal.user_id, &org).await
                };
                let entitled = lookup.map_err(AuthzError::Lookup)?;

                if entitled {
                    kept.extend(licensed);
                } else {
                    tracing::debug!(org = %org, dropped = licensed.len(), "Licensed webservices removed");
                }
            }

            if !kept.is_empty() {
                filtered.insert(org_id, OrganizationGrant::new(grant.level, kept));
            }
        }

        claims.organizations = filtered;
        Ok(claims)
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct ClaimsBuilder {
    registry: WebserviceRegistry,
    contributors: Vec<Arc<dyn ClaimsContributor>>,
}

impl ClaimsBuilder {
    pub fn new(registry: WebserviceRegistry, contributors: Vec<Arc<dyn ClaimsContributor>>) -> Self {
        Self {
            registry,
            contributors,
        }
    }

    /// Base identity, role webservices, organization webservices, licensing.
    pub fn standard(registry: WebserviceRegistry, directory: Arc<dyn AccessDirectory>) -> Self {
        let contributors: Vec<Arc<dyn ClaimsContributor>> = vec![
            Arc::new(BaseIdentity::new(registry.clone())),
            Arc::new(RoleWebservices::new(directory.clone())),
            Arc::new(OrganizationWebservices::new(directory.clone(), registry.clone())),
            Arc::new(LicensedOrganizations::new(directory, registry.clone())),
        ];
        Self::new(registry, contributors)
    }

    #[tracing::instrument(skip(self), fields(user_id = %principal.user_id))]
    pub async fn build(&self, principal: &Principal) -> Result<AccessClaims, AuthzError> {
        let mut claims = AccessClaims::new(principal.user_id.clone());

        for contributor in &self.contributors {
            if claims.is_super_user && contributor.skipped_for_super_user() {
                tracing::debug!(stage = contributor.name(), "Skipped for super user");
                continue;
            }

            claims = contributor
                .contribute(claims, principal)
                .await
                .map_err(|e| {
                    tracing::error!(stage = contributor.name(), error = %e, "Claims stage failed");
                    AuthzError::ClaimsStage {
                        stage: contributor.name(),
                        source: Box::new(e),
                    }
                })?;
        }

        self.drop_unregistered(&mut claims);
        Ok(claims)
    }

    /// Claims grant capabilities, they never define webservices.
    fn drop_unregistered(&self, claims: &mut AccessClaims) {
        let snapshot = self.registry.snapshot();

        claims.webservices.retain(|id, _| {
            let known = snapshot.is_enabled(id);
            if !known {
                tracing::warn!(webservice = %id, "Dropping claim for unknown or disabled webservice");
            }
            known
        });

        for (org_id, grant) in claims.organizations.iter_mut() {
            grant.webservices.retain(|id| {
                let known = snapshot.is_enabled(id);
                if !known {
                    tracing::warn!(webservice = %id, org = %org_id, "Dropping organization claim for unknown or disabled webservice");
                }
                known
            });
        }
        claims.organizations.retain(|_, grant| !grant.webservices.is_empty());
    }
}
