//! Health Command - Probe the backing store

use anyhow::Result;

use crate::app::build_service;
use crate::cli::context::CliContext;
use crate::cli::exit_codes;
use crate::cli::output::OutputFormat;

/// Run the health command
///
/// Reports the in-memory fallback as it is instead of failing, so operators
/// can see that the configured store was unreachable.
pub async fn run(ctx: &CliContext) -> Result<i32> {
    let service = match build_service(&ctx.config).await {
        Ok(service) => service,
        Err(e) => {
            ctx.output.error(&format!("Failed to build rate limiter: {}", e));
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let health = service.health().await;
    let configured = match ctx.config.rate_limit.storage_backend {
        ratewarden_core::config::RateLimitStorageBackend::Dragonfly => "dragonfly",
        ratewarden_core::config::RateLimitStorageBackend::Memory => "memory",
    };
    let healthy = health.reachable && health.backend == configured;

    match ctx.output.format() {
        OutputFormat::Json => ctx.output.json(&health)?,
        OutputFormat::Table => {
            ctx.output.header("Rate Limiter Health");
            ctx.output.row("Backend", &health.backend);
            ctx.output.row("Reachable", health.reachable);
            if let Some(latency) = health.latency_ms {
                ctx.output.row("Latency", format!("{}ms", latency));
            }
            ctx.output.row("Atomic script", health.atomic_script);
            if let Some(error) = &health.error {
                ctx.output.row("Error", error);
            }
            if health.backend != configured {
                ctx.output.warn(&format!(
                    "Configured backend '{}' unavailable at {}",
                    configured, ctx.config.store.url
                ));
            }
        }
    }

    if healthy {
        Ok(exit_codes::SUCCESS)
    } else {
        Ok(exit_codes::STORE_UNAVAILABLE)
    }
}
