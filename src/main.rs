//! Listing Cache service entry point
//!
//! Builds the caches once, sweeps expired entries in the background and
//! serves read-only health and metrics endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use listing_cache::api::create_router;
use listing_cache::{spawn_cleanup_task, AppState, Config, ExpirySweep};

/// Main entry point for the cache service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Construct the image and property caches
/// 4. Start the background expiry sweep
/// 5. Serve the diagnostics router
/// 6. On SIGINT/SIGTERM, stop the sweep and shut down gracefully
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listing_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting listing cache service");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        image_max_bytes = config.image_cache.max_bytes,
        property_max_bytes = config.property_cache.max_bytes,
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        port = config.server_port,
        "configuration loaded"
    );

    let state = AppState::from_config(&config);

    let shutdown = CancellationToken::new();
    let sweep_targets = vec![
        state.images.clone() as Arc<dyn ExpirySweep>,
        state.properties.clone() as Arc<dyn ExpirySweep>,
    ];
    let sweeper = spawn_cleanup_task(sweep_targets, config.cleanup_interval, shutdown.clone());

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("server error")?;

    shutdown.cancel();
    sweeper.await.context("expiry sweep task panicked")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then cancels `shutdown`.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    shutdown.cancel();
}
