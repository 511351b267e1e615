use std::path::Path;
use std::sync::Arc;

use attendance_realtime::auth::Role;
use attendance_realtime::{
    build_router, AppConfig, AppState, CoordinatorHandle, CredentialService, InMemoryKeyValueStore,
    UserDirectory,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (silently skip if missing; env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attendance_realtime=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting attendance realtime coordinator");

    let config = AppConfig::from_env();

    let credentials = CredentialService::new(&config.jwt_secret, config.token_ttl_seconds);
    let users = UserDirectory::new(Arc::new(InMemoryKeyValueStore::new()));
    if let Some((admin_id, password)) = &config.bootstrap_admin {
        users.register(admin_id, Role::Admin, password).await?;
        info!(user_id = %admin_id, "Bootstrap admin registered");
    }

    let (coordinator, worker) = CoordinatorHandle::spawn(config.coordinator_mailbox);
    let app = build_router(AppState::new(credentials, coordinator, users));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Open connections hold coordinator handles; the task ends once they are gone
    worker.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
