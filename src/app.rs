//! Application setup and wiring

use std::sync::Arc;
use std::time::Duration;

use ratewarden_core::Config;
use ratewarden_core::domain::rate_limit::RateLimitError;
use ratewarden_core::infrastructure::RateLimiterService;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle returned from `create_app` for graceful shutdown coordination
pub struct AppHandle {
    pub service: Arc<RateLimiterService>,
    pub shutdown_token: CancellationToken,
    pub maintenance: JoinHandle<()>,
}

/// Build the rate limiter service from configuration
pub async fn build_service(config: &Config) -> Result<Arc<RateLimiterService>, RateLimitError> {
    let service =
        RateLimiterService::new_with_url(config.rate_limit.clone(), &config.store.url).await?;

    let health = service.health().await;
    tracing::info!(
        backend = %health.backend,
        reachable = health.reachable,
        enabled = service.is_enabled(),
        profiles = service.registry().iter().count(),
        "Rate limiter initialized"
    );

    Ok(Arc::new(service))
}

/// Build the service and start its maintenance task
pub async fn create_app(config: &Config) -> Result<AppHandle, RateLimitError> {
    let service = build_service(config).await?;
    let shutdown_token = CancellationToken::new();

    let maintenance = Arc::clone(&service).start_maintenance_task(shutdown_token.clone());
    tracing::info!(
        interval_seconds = config.rate_limit.cleanup_interval_seconds,
        "Rate limiter maintenance task started"
    );

    Ok(AppHandle {
        service,
        shutdown_token,
        maintenance,
    })
}

/// Wait for a shutdown signal, then cancel background tasks
pub async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }

    tracing::info!("Cancelling background tasks...");
    shutdown_token.cancel();
}

/// Wait for the maintenance task to finish, bounded by `timeout`
pub async fn wait_for_shutdown(handle: AppHandle, timeout: Duration) {
    match tokio::time::timeout(timeout, handle.maintenance).await {
        Ok(Ok(())) => tracing::info!("Background tasks stopped"),
        Ok(Err(e)) => tracing::error!("Maintenance task failed: {}", e),
        Err(_) => tracing::warn!("Background tasks shutdown timeout reached"),
    }
}
