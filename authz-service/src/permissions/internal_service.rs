use async_trait::async_trait;

use super::{AccessContext, PermissionStrategy};
use crate::models::{AccessLevel, Grant, WebserviceConfig};
use crate::services::error::AuthzError;

/// Full access for a verified internal service on webservices that declare
/// the internal-service level. Looks at the service identity only.
pub struct InternalServicePermission;

#[async_trait]
impl PermissionStrategy for InternalServicePermission {
    fn name(&self) -> &'static str {
        "internal_service"
    }

    async fn check_webservice_permission(
        &self,
        webservice: &WebserviceConfig,
        ctx: &AccessContext,
    ) -> Result<Option<Grant>, AuthzError> {
        let Some(service) = ctx.service.as_deref() else {
            return Ok(None);
        };

        if !webservice.declares(AccessLevel::InternalService) {
            return Ok(None);
        }

        tracing::debug!(
            webservice = %webservice.id,
            caller = %service.service_name,
            instance = %service.instance_id,
            "Internal service granted"
        );
        Ok(Some(Grant::Full))
    }
}
