use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::{permissions::AccessContext, services::AuthzError, AppState};

pub const SERVICE_TOKEN_HEADER: &str = "x-service-token";
pub const XSRF_HEADER: &str = "x-xsrf-token";

/// Decode the caller's credentials into an [`AccessContext`] extension.
///
/// Absent tokens make an anonymous caller. A present but invalid token is
/// rejected, never treated as absent.
pub async fn access_context_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let mut ctx = AccessContext::anonymous();

    if let Some(token) = bearer_token(req.headers())? {
        let token_claims = state.jwt.validate_access_token(token)?;

        if state.config.engine.require_xsrf && !req.method().is_safe() {
            let echoed = req
                .headers()
                .get(XSRF_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            let matches: bool = echoed
                .as_bytes()
                .ct_eq(token_claims.xsrf_token.as_bytes())
                .into();
            if !matches {
                return Err(AuthzError::unauthenticated("xsrf token mismatch").into());
            }
        }

        ctx.claims = Some(Arc::new(token_claims.claims));
    }

    if let Some(token) = req
        .headers()
        .get(SERVICE_TOKEN_HEADER)
        .map(|v| v.to_str().map_err(|_| AuthzError::unauthenticated("service token header is not ascii")))
        .transpose()?
    {
        let identity = state.service_tokens.validate(token)?;
        ctx.service = Some(Arc::new(identity));
    }

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthzError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(Some)
        .ok_or_else(|| AuthzError::unauthenticated("malformed Authorization header"))
}

/// Extractor for the context inserted by [`access_context_middleware`].
pub struct Access(pub AccessContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Access
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts.extensions.get::<AccessContext>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Access context missing from request extensions"
            ))
        })?;

        Ok(Access(ctx.clone()))
    }
}
