//! Serve Command - Run the rate limiter maintenance task until shutdown

use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::app::{create_app, shutdown_signal, wait_for_shutdown};
use crate::cli::context::CliContext;
use crate::cli::exit_codes;

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Seconds to wait for background tasks after a shutdown signal
    #[arg(long, default_value_t = 10)]
    pub shutdown_timeout_seconds: u64,
}

/// Run the serve command
pub async fn run(ctx: &CliContext, args: &ServeArgs) -> Result<i32> {
    tracing::info!("Starting ratewarden maintenance service...");
    tracing::info!(
        "Configuration loaded: store={} backend={:?}",
        ctx.config.store.url,
        ctx.config.rate_limit.storage_backend
    );

    let handle = match create_app(&ctx.config).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("Failed to create application: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    shutdown_signal(handle.shutdown_token.clone()).await;
    wait_for_shutdown(handle, Duration::from_secs(args.shutdown_timeout_seconds)).await;

    tracing::info!("Server shutdown complete");
    Ok(exit_codes::SUCCESS)
}
