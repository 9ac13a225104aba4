use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;

use notice_broadcast_service::config::Settings;
use notice_broadcast_service::server::{create_app, AppState};
use notice_broadcast_service::shutdown::GracefulShutdown;
use notice_broadcast_service::tasks::SweeperTask;
use notice_broadcast_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing; the guard flushes spans on drop
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    // Create application state
    let state = AppState::new(settings.clone());
    tracing::info!("Application state initialized");

    // Start sweeper in background
    let sweeper = SweeperTask::new(
        Duration::from_secs(settings.websocket.sweep_interval.max(1)),
        state.registry.clone(),
        state.directory.clone(),
        state.shutdown.subscribe(),
    );
    let sweeper_handle = tokio::spawn(sweeper.run());

    let graceful = GracefulShutdown::new(
        state.registry.clone(),
        state.directory.clone(),
        state.shutdown.clone(),
        Duration::from_secs(settings.shutdown.drain_timeout_seconds),
    );

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(
        ws_path = %settings.websocket.path,
        "Server listening on {}",
        addr
    );

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(graceful))
        .await?;

    // Wait for background tasks to finish
    tracing::info!("Waiting for background tasks to finish...");
    let _ = sweeper_handle.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(graceful: GracefulShutdown) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let reason = tokio::select! {
        _ = ctrl_c => "Received Ctrl+C",
        _ = terminate => "Received terminate signal",
    };
    tracing::info!(reason, "Initiating graceful shutdown");

    // Socket loops close their connections before axum stops accepting
    graceful.execute(reason).await;
}
