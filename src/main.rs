use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crepusculo_pass::api::{self, AppState};
use crepusculo_pass::config::ServerConfig;
use crepusculo_pass::flow::FlowEngine;
use crepusculo_pass::photos::LocalObjectStore;
use crepusculo_pass::store::LibSqlBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("Invalid configuration")?;

    // Initialize tracing; the file sink guard must live until shutdown.
    let _log_guard = init_tracing(&config);

    eprintln!("🌒 Crepusculo pass v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listening: http://{}", config.listen_addr());
    eprintln!("   Public URL: {}", config.public_url);
    eprintln!("   Event: {}", config.event_tag);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Photos: {}\n", config.photo_dir.display());

    let backend = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .context("Failed to open database")?,
    );

    let photos = LocalObjectStore::new(config.photo_dir.clone(), config.public_url.clone());
    photos
        .ensure_root()
        .await
        .context("Failed to create photo directory")?;

    let flow = Arc::new(FlowEngine::new(backend.clone(), config.flow_timeout));
    let listen_addr = config.listen_addr();
    let state = AppState {
        db: backend,
        flow,
        photos: Arc::new(photos),
        config: Arc::new(config),
    };

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;
    tracing::info!(addr = %listen_addr, "HTTP server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Shut down");
    Ok(())
}

/// Console logging plus an optional daily-rolling file.
fn init_tracing(config: &ServerConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer().with_target(false);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "crepusculo-pass.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(console).init();
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    eprintln!("\nShutting down...");
}
