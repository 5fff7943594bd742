use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tracing::info;

use request_metrics_api::api::create_router;
use request_metrics_api::app::{AppState, Settings};
use request_metrics_api::infra::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let settings = Settings::from_env().context("Failed to load settings")?;

    init_tracing(settings.default_log_level(), settings.log_format)
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize logging")?;

    // Instruments are registered here, before the first request is served;
    // a registration error aborts startup.
    let app_state =
        Arc::new(AppState::new(&settings).context("Failed to register metric instruments")?);

    let router = create_router(app_state);

    let addr = settings.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        address = %addr,
        metrics_enabled = settings.metrics_enabled,
        "Server starting"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}
