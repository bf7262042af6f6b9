//! CLI Context - Configuration and output shared by every command

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use ratewarden_core::config::{Config, RateLimitStorageBackend};
use ratewarden_core::infrastructure::RateLimiterService;

use crate::app::build_service;
use crate::cli::output::OutputWriter;
use crate::cli::{Cli, Commands};

/// Context for CLI operations
///
/// The rate limiter service is built on demand so commands that only read
/// configuration never touch the store.
pub struct CliContext {
    /// Application configuration
    pub config: Arc<Config>,

    /// Output writer configured based on CLI flags
    pub output: OutputWriter,
}

impl CliContext {
    /// Create a new CLI context from parsed CLI arguments
    pub fn new(cli: &Cli) -> Result<Self> {
        let mut config = Config::load_from(cli.config.as_deref())
            .context("Failed to load configuration. Check RATEWARDEN__* env vars")?;

        // One-shot commands stay quiet unless asked; the service always logs
        let serving = matches!(cli.command, Commands::Serve(_));
        if cli.verbose {
            config.logging.level = "debug".to_string();
        }
        if serving || cli.verbose {
            ratewarden_core::init_tracing(&config.logging).map_err(|e| anyhow::anyhow!(e))?;
        }

        Ok(Self {
            config: Arc::new(config),
            output: OutputWriter::new(cli.format, cli.quiet),
        })
    }

    /// Connect to the configured store and build the service
    ///
    /// Unlike the long-running service, operator commands refuse the
    /// in-memory fallback: its state would not reflect the shared store.
    pub async fn service(&self) -> Result<Arc<RateLimiterService>> {
        let service = build_service(&self.config)
            .await
            .context("Failed to build rate limiter")?;

        if self.config.rate_limit.storage_backend == RateLimitStorageBackend::Dragonfly {
            let health = service.health().await;
            if health.backend != "dragonfly" {
                bail!("Store at {} is unreachable", self.config.store.url);
            }
        }

        Ok(service)
    }
}
