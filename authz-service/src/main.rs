use authz_service::{
    build_router,
    config::AuthzConfig,
    permissions::{default_chain, LiveSubscriptionCheck},
    services::{
        AccessDirectory, AccessEngine, ClaimsBuilder, HierarchyResolver,
        InMemoryAccessDirectory, InMemoryOrganizationDirectory, JwtService, ServiceTokenService,
        WebserviceRegistry,
    },
    AppState,
};
use service_core::observability::init_tracing;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = AuthzConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting authorization service"
    );

    // A bad webservice configuration aborts startup
    let registry = WebserviceRegistry::load_from_file(&config.registry_path)?;
    tracing::info!(
        path = %config.registry_path,
        webservices = registry.snapshot().len(),
        "Webservice registry loaded"
    );

    // Persistence is an external collaborator; this binary runs with the
    // in-memory directories until one is wired in.
    let access_directory: Arc<dyn AccessDirectory> = Arc::new(InMemoryAccessDirectory::new());
    let organization_directory = Arc::new(InMemoryOrganizationDirectory::new());

    let live_check = config
        .engine
        .live_check_timeout
        .map(|timeout| LiveSubscriptionCheck::new(access_directory.clone(), timeout));
    let engine = Arc::new(AccessEngine::new(registry.clone(), default_chain(live_check)));
    let claims_builder = Arc::new(ClaimsBuilder::standard(registry.clone(), access_directory));
    let hierarchy = HierarchyResolver::new(organization_directory, config.engine.max_hierarchy_depth);

    let jwt = JwtService::new(&config.jwt)?;
    let service_tokens = ServiceTokenService::new(&config.service_token);

    let state = AppState {
        config: config.clone(),
        engine,
        claims_builder,
        hierarchy,
        jwt,
        service_tokens,
    };

    #[cfg(unix)]
    spawn_registry_reloader(registry, config.registry_path.clone())?;

    let app = build_router(state);
    let addr = config.common.socket_addr();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

/// Re-read the registry file on SIGHUP. An invalid file is logged and the
/// previous registry stays active.
#[cfg(unix)]
fn spawn_registry_reloader(
    registry: WebserviceRegistry,
    path: String,
) -> Result<(), service_core::error::AppError> {
    let mut hangup = signal::unix::signal(signal::unix::SignalKind::hangup())?;

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            if let Err(e) = registry.reload_from_file(&path) {
                tracing::error!(path = %path, error = %e, "Webservice registry reload rejected");
            }
        }
    });

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
