mod config;
mod error;
mod routes;
mod wire;

use config::AppConfig;
use routes::{app_router, AppState};
use silt_core::SyncService;
use tokio::signal;

/// Load .env.server for local development.
#[cfg(debug_assertions)]
fn load_dev_dotenv() {
    let server_env = std::path::Path::new(".env.server");
    if server_env.exists() {
        let _ = dotenvy::from_path(server_env);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(debug_assertions)]
    load_dev_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("silt_api=info".parse().expect("valid directive"))
                .add_directive("silt_core=info".parse().expect("valid directive")),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!("Starting silt-api with config: {:?}", config);

    let service = SyncService::open_path(config.database_path.as_str()).await?;
    let state = AppState { service };
    let router = app_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("silt-api listening on {}", config.bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("silt-api shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
