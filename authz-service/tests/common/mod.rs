//! Shared fixtures for authz-service integration tests.

#![allow(dead_code)]

use authz_service::{
    build_router,
    config::{
        AuthzConfig, EngineConfig, Environment, JwtAlgorithm, JwtConfig, ServiceTokenConfig,
        DEFAULT_SERVICE_TOKEN_AUDIENCE, DEFAULT_SERVICE_TOKEN_ISSUER,
    },
    models::{AccessLevel, PublicType, WebserviceConfig},
    permissions::default_chain,
    services::{
        AccessDirectory, AccessEngine, ClaimsBuilder, HierarchyResolver,
        InMemoryAccessDirectory, InMemoryOrganizationDirectory, JwtService, ServiceTokenService,
        WebserviceRegistry,
    },
    AppState,
};
use http_body_util::BodyExt;
use service_core::axum::{body::Body, http::Response, Router};
use std::sync::Arc;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_SERVICE_SECRET: &str = "test-service-secret";

/// The webservice set used across tests.
///
/// - `home`: public to everyone
/// - `login`: public to disconnected callers only
/// - `me`: any connected user
/// - `X`: owner or organization scoped
/// - `Y`: internal services only
/// - `list_invoices`: role or organization scoped, licensed
/// - `manage_users`: organization scoped, not licensed
/// - `retired`: disabled
pub fn webservices() -> Vec<WebserviceConfig> {
    vec![
        WebserviceConfig::public("home", PublicType::NoLimitation),
        WebserviceConfig::public("login", PublicType::Disconnected),
        WebserviceConfig::new("me", [AccessLevel::Connected]),
        WebserviceConfig::new("X", [AccessLevel::Owner, AccessLevel::OrganizationRole]),
        WebserviceConfig::new("Y", [AccessLevel::InternalService]),
        WebserviceConfig::new("list_invoices", [AccessLevel::Role, AccessLevel::OrganizationRole])
            .licenced(),
        WebserviceConfig::new("manage_users", [AccessLevel::OrganizationRole]),
        WebserviceConfig::new("retired", [AccessLevel::Role]).disabled(),
    ]
}

pub fn registry() -> WebserviceRegistry {
    WebserviceRegistry::from_configs(webservices()).expect("test registry is valid")
}

pub fn engine() -> AccessEngine {
    AccessEngine::new(registry(), default_chain(None))
}

pub fn test_config() -> AuthzConfig {
    AuthzConfig {
        common: service_core::config::Config::load_from("does-not-exist")
            .expect("default config loads"),
        environment: Environment::Dev,
        service_name: "authz-service".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        jwt: JwtConfig {
            algorithm: JwtAlgorithm::Hs256,
            secret: Some(TEST_JWT_SECRET.to_string()),
            private_key_path: None,
            public_key_path: None,
            access_token_expiry_minutes: 15,
        },
        service_token: ServiceTokenConfig {
            secret: TEST_SERVICE_SECRET.to_string(),
            audience: DEFAULT_SERVICE_TOKEN_AUDIENCE.to_string(),
            issuer: DEFAULT_SERVICE_TOKEN_ISSUER.to_string(),
            allowed_issuers: vec![],
            expiry_minutes: 1,
        },
        registry_path: "unused.json".to_string(),
        engine: EngineConfig {
            live_check_timeout: None,
            max_hierarchy_depth: 32,
            require_xsrf: true,
        },
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_directories(
            Arc::new(InMemoryAccessDirectory::new()),
            Arc::new(InMemoryOrganizationDirectory::new()),
        )
    }

    pub fn with_directories(
        access_directory: Arc<dyn AccessDirectory>,
        organization_directory: Arc<InMemoryOrganizationDirectory>,
    ) -> Self {
        let config = test_config();
        let registry = registry();

        let jwt = JwtService::new(&config.jwt).expect("jwt service");
        let service_tokens = ServiceTokenService::new(&config.service_token);

        let state = AppState {
            engine: Arc::new(AccessEngine::new(registry.clone(), default_chain(None))),
            claims_builder: Arc::new(ClaimsBuilder::standard(registry, access_directory)),
            hierarchy: HierarchyResolver::new(
                organization_directory,
                config.engine.max_hierarchy_depth,
            ),
            jwt,
            service_tokens,
            config,
        };

        let router = build_router(state.clone());
        Self { state, router }
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}
