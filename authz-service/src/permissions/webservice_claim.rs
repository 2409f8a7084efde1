use async_trait::async_trait;

use super::{AccessContext, PermissionStrategy};
use crate::models::{
    AccessScope, EntityDescriptor, Grant, Predicate, Statement, WebserviceConfig, WebserviceScope,
};
use crate::services::error::AuthzError;

/// Access from the flat `webservices` claim map.
///
/// `full` is unconditional whatever levels the webservice declares; `owner`
/// yields an owner scope.
pub struct WebserviceClaimPermission;

#[async_trait]
impl PermissionStrategy for WebserviceClaimPermission {
    fn name(&self) -> &'static str {
        "webservice_claim"
    }

    async fn check_webservice_permission(
        &self,
        webservice: &WebserviceConfig,
        ctx: &AccessContext,
    ) -> Result<Option<Grant>, AuthzError> {
        let Some(claims) = ctx.claims.as_deref() else {
            return Ok(None);
        };
        let Some(scope) = claims.webservice_scope(&webservice.id) else {
            return Ok(None);
        };

        let grant = match scope {
            WebserviceScope::Full => Grant::Full,
            WebserviceScope::Owner => Grant::Scoped(AccessScope::owner()),
        };

        tracing::debug!(webservice = %webservice.id, claim = ?scope, "Webservice claim evaluated");
        Ok(Some(grant))
    }

    fn add_statement_access_constraints(
        &self,
        statement: &mut Statement,
        or_where: Predicate,
        scope: &AccessScope,
        ctx: &AccessContext,
        entity: &dyn EntityDescriptor,
    ) -> Result<Predicate, AuthzError> {
        if !scope.owner {
            return Ok(or_where);
        }
        let Some(user_id) = ctx.user_id() else {
            return Ok(or_where);
        };

        let predicates = entity.user_accessing_filters(statement, user_id);
        Ok(or_where | Predicate::any(predicates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessClaims, AccessLevel, ScopedEntity};

    #[tokio::test]
    async fn test_owner_claim_yields_owner_scope() {
        let ws = WebserviceConfig::new("X", [AccessLevel::Owner]);
        let ctx = AccessContext::user(AccessClaims::new("u1").with_webservice("X", WebserviceScope::Owner));

        let grant = WebserviceClaimPermission
            .check_webservice_permission(&ws, &ctx)
            .await
            .unwrap();
        assert_eq!(grant, Some(Grant::Scoped(AccessScope::owner())));
    }

    #[tokio::test]
    async fn test_full_claim_on_role_webservice() {
        let ws = WebserviceConfig::new("X", [AccessLevel::Owner, AccessLevel::Role]);
        let ctx = AccessContext::user(AccessClaims::new("u1").with_webservice("X", WebserviceScope::Full));

        let grant = WebserviceClaimPermission
            .check_webservice_permission(&ws, &ctx)
            .await
            .unwrap();
        assert_eq!(grant, Some(Grant::Full));
    }

    #[tokio::test]
    async fn test_full_claim_on_owner_only_webservice() {
        let ws = WebserviceConfig::new("W", [AccessLevel::Owner]);
        let ctx = AccessContext::user(AccessClaims::new("u1").with_webservice("W", WebserviceScope::Full));

        let grant = WebserviceClaimPermission
            .check_webservice_permission(&ws, &ctx)
            .await
            .unwrap();
        assert_eq!(grant, Some(Grant::Full));
    }

    #[tokio::test]
    async fn test_missing_claim_defers() {
        let ws = WebserviceConfig::new("X", [AccessLevel::OrganizationRole]);
        let ctx = AccessContext::user(AccessClaims::new("u1").with_webservice("Z", WebserviceScope::Full));

        let grant = WebserviceClaimPermission
            .check_webservice_permission(&ws, &ctx)
            .await
            .unwrap();
        assert!(grant.is_none());
    }

    #[test]
    fn test_owner_scope_adds_user_predicate() {
        let ctx = AccessContext::user(AccessClaims::new("u1"));
        let entity = ScopedEntity::new("note").user_owned();
        let mut statement = Statement::new("note");

        let or_where = WebserviceClaimPermission
            .add_statement_access_constraints(
                &mut statement,
                Predicate::False,
                &AccessScope::owner(),
                &ctx,
                &entity,
            )
            .unwrap();
        assert_eq!(or_where, Predicate::user_in(["u1"]));
    }
}
