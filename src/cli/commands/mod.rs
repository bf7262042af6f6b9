//! CLI Commands Module
//!
//! This module contains all CLI subcommand implementations.

pub mod health;
pub mod maintenance;
pub mod profiles;
pub mod reset;
pub mod serve;
pub mod status;

use std::sync::Arc;

use ratewarden_core::domain::rate_limit::{ProfileName, RateLimitKey};
use ratewarden_core::infrastructure::RateLimiterService;

use crate::cli::context::CliContext;
use crate::cli::exit_codes;

/// Build the service, reporting failure as an exit code
pub(crate) async fn connect(ctx: &CliContext) -> Result<Arc<RateLimiterService>, i32> {
    ctx.service().await.map_err(|e| {
        ctx.output.error(&format!("{:#}", e));
        exit_codes::STORE_UNAVAILABLE
    })
}

/// Parse an `ip:<address>` or `user:<id>` key, reporting failure as an exit code
pub(crate) fn parse_key(ctx: &CliContext, raw: &str) -> Result<RateLimitKey, i32> {
    raw.parse().map_err(|e| {
        ctx.output.error(&format!("{}", e));
        exit_codes::CONFIG_ERROR
    })
}

/// Parse a profile name, reporting failure as an exit code
pub(crate) fn parse_profile(ctx: &CliContext, raw: &str) -> Result<ProfileName, i32> {
    raw.parse().map_err(|e| {
        ctx.output.error(&format!("{}", e));
        ctx.output.info(&format!(
            "Known profiles: {}",
            ProfileName::ALL.map(|p| p.as_str()).join(", ")
        ));
        exit_codes::CONFIG_ERROR
    })
}
