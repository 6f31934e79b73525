mod config;

use std::sync::Arc;

use tracing::{info, warn};

use backstage_api::{AppState, AppStateInner};
use backstage_db::Database;
use backstage_gateway::dispatcher::Dispatcher;
use backstage_storage::Storage;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backstage=debug,tower_http=debug".into()),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e:#}");
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Database::open(&config.db_path)?;
    if !config.bootstrap_admins.is_empty() {
        let promoted = db.promote_admins(&config.bootstrap_admins)?;
        info!("Bootstrap admins: {} listed, {} promoted", config.bootstrap_admins.len(), promoted);
    }

    let storage = Storage::new(config.storage_dir.clone(), &config.public_url).await?;

    let state: AppState = Arc::new(AppStateInner {
        db: Arc::new(db),
        storage,
        dispatcher: Dispatcher::new(),
        jwt_secret: config.jwt_secret.clone(),
        max_upload_bytes: config.max_upload_bytes(),
    });
    let app = backstage_api::router(state);

    let addr = config.addr()?;
    info!("Backstage server listening on {} (public URL {})", addr, config.public_url);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
            },
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
