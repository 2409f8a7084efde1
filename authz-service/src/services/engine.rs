//! Webservice access decisions and row-level constraint composition.

use std::sync::Arc;

use super::error::AuthzError;
use super::registry::WebserviceRegistry;
use crate::models::{
    AccessControlled, AccessDecision, AccessScope, DenialReason, EntityDescriptor, Grant,
    Predicate, PublicType, Statement,
};
use crate::permissions::{AccessContext, PermissionStrategy};

pub struct AccessEngine {
    registry: WebserviceRegistry,
    strategies: Vec<Arc<dyn PermissionStrategy>>,
}

impl AccessEngine {
    /// `strategies` are consulted in the given order.
    pub fn new(registry: WebserviceRegistry, strategies: Vec<Arc<dyn PermissionStrategy>>) -> Self {
        Self {
            registry,
            strategies,
        }
    }

    pub fn registry(&self) -> &WebserviceRegistry {
        &self.registry
    }

    /// Decide whether `ctx` may invoke `webservice_id`.
    ///
    /// A full grant from any strategy ends evaluation. Scoped grants from
    /// several strategies are merged so their row subsets can be ORed later.
    /// Strategy errors propagate; nothing here defaults to allow.
    #[tracing::instrument(skip(self, ctx), fields(user_id = ctx.user_id(), service = ctx.service.as_deref().map(|s| s.service_name.as_str())))]
    pub async fn check_webservice(
        &self,
        webservice_id: &str,
        ctx: &AccessContext,
    ) -> Result<AccessDecision, AuthzError> {
        let snapshot = self.registry.snapshot();
        let webservice = snapshot
            .get(webservice_id)
            .filter(|ws| ws.enabled)
            .ok_or_else(|| AuthzError::UnknownWebservice(webservice_id.to_string()))?;

        if webservice.public_type == Some(PublicType::Disconnected) {
            return Ok(if ctx.claims.is_some() {
                AccessDecision::Denied(DenialReason::AlreadyConnected)
            } else {
                AccessDecision::FullGrant
            });
        }

        if ctx.claims.as_deref().is_some_and(|c| c.is_super_user) {
            tracing::debug!("Super user bypass");
            return Ok(AccessDecision::FullGrant);
        }

        if webservice.public_type == Some(PublicType::NoLimitation) {
            return Ok(AccessDecision::FullGrant);
        }

        let mut scope: Option<AccessScope> = None;
        for strategy in &self.strategies {
            match strategy.check_webservice_permission(webservice, ctx).await? {
                Some(Grant::Full) => {
                    tracing::debug!(strategy = strategy.name(), "Full grant");
                    return Ok(AccessDecision::FullGrant);
                }
                Some(Grant::Scoped(granted)) => {
                    tracing::debug!(strategy = strategy.name(), scope = ?granted, "Scoped grant");
                    scope.get_or_insert_with(AccessScope::default).merge(granted);
                }
                None => {}
            }
        }

        match scope.filter(|s| !s.is_empty()) {
            Some(scope) => Ok(AccessDecision::ScopedGrant(scope)),
            None if ctx.is_anonymous() => {
                Ok(AccessDecision::Denied(DenialReason::AuthenticationRequired))
            }
            None => {
                tracing::info!(webservice = %webservice_id, "Permission denied");
                Ok(AccessDecision::Denied(DenialReason::PermissionDenied))
            }
        }
    }

    /// Like [`check_webservice`](Self::check_webservice) but a denial is an error.
    pub async fn authorize(
        &self,
        webservice_id: &str,
        ctx: &AccessContext,
    ) -> Result<AccessDecision, AuthzError> {
        self.check_webservice(webservice_id, ctx).await?.into_result()
    }

    /// AND the row-level constraints implied by `decision` into `statement`.
    ///
    /// A scoped decision starts from `False` and lets every strategy OR in
    /// the rows its part of the scope unlocks.
    pub fn compose(
        &self,
        mut statement: Statement,
        decision: &AccessDecision,
        ctx: &AccessContext,
        entity: &dyn EntityDescriptor,
    ) -> Result<Statement, AuthzError> {
        match decision {
            AccessDecision::Denied(_) => statement.and_where(Predicate::False),
            AccessDecision::FullGrant => {}
            AccessDecision::ScopedGrant(scope) => {
                let mut or_where = Predicate::False;
                for strategy in &self.strategies {
                    or_where = strategy.add_statement_access_constraints(
                        &mut statement,
                        or_where,
                        scope,
                        ctx,
                        entity,
                    )?;
                }
                statement.and_where(or_where);
            }
        }
        Ok(statement)
    }

    /// Re-check a loaded instance against the same constraints a list query
    /// would apply.
    pub fn ensure_instance_access(
        &self,
        decision: &AccessDecision,
        ctx: &AccessContext,
        entity: &dyn EntityDescriptor,
        instance: &dyn AccessControlled,
    ) -> Result<(), AuthzError> {
        let statement = self.compose(Statement::new(entity.entity_name()), decision, ctx, entity)?;
        if statement.matches(instance) {
            Ok(())
        } else {
            Err(AuthzError::PermissionDenied)
        }
    }
}
