//! Casitas upload server.
//!
//! Wires the chunk assembly service to its collaborators and serves the
//! upload API until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use casitas_api::{AppState, build_router};
use casitas_cache::MemorySessionStore;
use casitas_core::config::AppConfig;
use casitas_core::error::AppError;
use casitas_core::traits::{StorageProvider, SystemClock};
use casitas_database::build_record_store;
use casitas_entity::UploadSession;
use casitas_service::AssemblyService;
use casitas_storage::{LocalStorageProvider, build_media_store};
use casitas_worker::{JobRunner, SessionSweepJob};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from files and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    match std::env::var("CASITAS_CONFIG") {
        Ok(path) => AppConfig::load_file(&path),
        Err(_) => {
            let env = std::env::var("CASITAS_ENV").unwrap_or_else(|_| "development".to_string());
            AppConfig::load(&env)
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Casitas upload server");

    // ── Step 1: Scratch storage for chunks ───────────────────────
    let scratch = Arc::new(LocalStorageProvider::new(&config.upload.scratch_dir).await?);
    if !scratch.health_check().await? {
        return Err(AppError::storage(format!(
            "Scratch directory {} is not usable",
            config.upload.scratch_dir
        )));
    }
    tracing::info!(path = %config.upload.scratch_dir, "Scratch storage ready");

    // ── Step 2: Remote media store ───────────────────────────────
    let media = build_media_store(&config.media)?;
    let diagnostics = media.diagnostics();
    tracing::info!(
        provider = %diagnostics.provider,
        cloud_name = diagnostics.cloud_name_configured,
        api_key = diagnostics.api_key_configured,
        api_secret = diagnostics.api_secret_configured,
        "Media store initialized"
    );

    // ── Step 3: Record store ─────────────────────────────────────
    let records = build_record_store(&config.records).await?;
    tracing::info!(provider = %config.records.provider, "Record store initialized");

    // ── Step 4: Assembly service ─────────────────────────────────
    let uploads = AssemblyService::new(
        config.upload.clone(),
        scratch,
        Arc::new(MemorySessionStore::<UploadSession>::new()),
        media,
        records,
        Arc::new(SystemClock),
    );

    // ── Step 5: Shutdown channel ─────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 6: Background jobs ──────────────────────────────────
    let runner = JobRunner::new().with_job(SessionSweepJob::new(uploads.clone()));
    let worker_handle = tokio::spawn(runner.run(shutdown_rx));

    // ── Step 7: HTTP server ──────────────────────────────────────
    let config = Arc::new(config);
    let app = build_router(AppState::new(config.clone(), uploads));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(%addr, "Casitas upload server listening");

    // ── Step 8: Graceful shutdown ────────────────────────────────
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    tracing::info!("Waiting for background jobs to complete...");
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    if tokio::time::timeout(grace, worker_handle).await.is_err() {
        tracing::warn!("Background jobs did not stop in time");
    }

    tracing::info!("Casitas upload server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
