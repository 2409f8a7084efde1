//! Policy decision endpoints.
//!
//! - `POST /authz/check`: may the caller invoke a webservice, and which rows
//!   of an entity may it see
//! - `POST /authz/token`: compute access claims for a principal and sign
//!   them; internal services only

use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};

use crate::middleware::Access;
use crate::models::{AccessClaims, AccessDecision, CapabilityTuple, DenialReason, OrgRef, ScopedEntity, Statement};
use crate::services::{AuthzError, Principal};
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// A loaded instance to re-check after the webservice decision.
#[derive(Debug, Deserialize)]
pub struct InstanceRef {
    #[serde(default)]
    pub owner_user_id: Option<String>,
    /// Owning organization. Its ancestors are resolved server-side.
    #[serde(default)]
    pub organization: Option<OrgRef>,
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub webservice_id: String,
    /// Entity a list query will run against.
    #[serde(default)]
    pub entity: Option<ScopedEntity>,
    #[serde(default)]
    pub instance: Option<InstanceRef>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    pub access_type: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Statement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_allowed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub user_id: String,
    #[serde(default)]
    pub is_super_user: bool,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub xsrf_token: String,
    pub claims: AccessClaims,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /authz/check
pub async fn check(
    State(state): State<AppState>,
    Access(ctx): Access,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, AppError> {
    let decision = state.engine.check_webservice(&req.webservice_id, &ctx).await?;

    let code = match &decision {
        AccessDecision::Denied(DenialReason::PermissionDenied) => {
            Some(AuthzError::PermissionDenied.code())
        }
        AccessDecision::Denied(DenialReason::AuthenticationRequired) => {
            Some(AuthzError::AuthenticationRequired.code())
        }
        AccessDecision::Denied(DenialReason::AlreadyConnected) => {
            Some(AuthzError::AlreadyConnected.code())
        }
        _ => None,
    };

    let constraints = match &req.entity {
        Some(entity) => Some(state.engine.compose(
            Statement::new(entity.name.clone()),
            &decision,
            &ctx,
            entity,
        )?),
        None => None,
    };

    let instance_allowed = match (&req.entity, &req.instance) {
        (Some(entity), Some(instance)) => {
            let tuple = resolve_instance(&state, instance).await?;
            match state
                .engine
                .ensure_instance_access(&decision, &ctx, entity, &tuple)
            {
                Ok(()) => Some(true),
                Err(AuthzError::PermissionDenied) => Some(false),
                Err(e) => return Err(e.into()),
            }
        }
        (None, Some(_)) => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "instance checks require an entity"
            )))
        }
        _ => None,
    };

    tracing::info!(
        webservice = %req.webservice_id,
        allowed = decision.is_allowed(),
        user_id = ctx.user_id(),
        "Authorization decision"
    );

    Ok(Json(CheckResponse {
        allowed: decision.is_allowed(),
        access_type: decision.access_type(),
        code,
        constraints,
        instance_allowed,
    }))
}

/// POST /authz/token
pub async fn issue_token(
    State(state): State<AppState>,
    Access(ctx): Access,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let Some(service) = ctx.service.as_deref() else {
        return Err(if ctx.is_anonymous() {
            AuthzError::AuthenticationRequired
        } else {
            AuthzError::PermissionDenied
        }
        .into());
    };

    let principal = Principal {
        user_id: req.user_id,
        is_super_user: req.is_super_user,
    };
    let claims = state.claims_builder.build(&principal).await?;
    let (access_token, token_claims) = state.jwt.issue_access_token(claims)?;

    tracing::info!(
        user_id = %principal.user_id,
        requested_by = %service.service_name,
        webservices = token_claims.claims.webservices.len(),
        organizations = token_claims.claims.organizations.len(),
        "Access token issued"
    );

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.access_token_expiry_seconds(),
        xsrf_token: token_claims.xsrf_token,
        claims: token_claims.claims,
    }))
}

async fn resolve_instance(
    state: &AppState,
    instance: &InstanceRef,
) -> Result<CapabilityTuple, AuthzError> {
    let mut tuple = CapabilityTuple::default();
    if let Some(user_id) = &instance.owner_user_id {
        tuple.users.insert(user_id.clone());
    }
    if let Some(org) = &instance.organization {
        tuple.organizations = state.hierarchy.accessing_organizations(org).await?;
    }
    Ok(tuple)
}
