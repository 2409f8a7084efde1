pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod permissions;
pub mod services;

use service_core::axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::request_id_middleware;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::AuthzConfig;
use crate::services::{AccessEngine, ClaimsBuilder, HierarchyResolver, JwtService, ServiceTokenService};

#[derive(Clone)]
pub struct AppState {
    pub config: AuthzConfig,
    pub engine: Arc<AccessEngine>,
    pub claims_builder: Arc<ClaimsBuilder>,
    pub hierarchy: HierarchyResolver,
    pub jwt: JwtService,
    pub service_tokens: ServiceTokenService,
}

pub fn build_router(state: AppState) -> Router {
    let authz_routes = Router::new()
        .route("/authz/check", post(handlers::authz::check))
        .route("/authz/token", post(handlers::authz::issue_token))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::access_context_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(authz_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(service_core::middleware::REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
}
