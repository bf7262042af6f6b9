//! Profiles Command - List the profiles in effect

use anyhow::Result;
use serde::Serialize;

use ratewarden_core::domain::rate_limit::{ProfileRegistry, RateLimitProfile};

use crate::cli::context::CliContext;
use crate::cli::exit_codes;
use crate::cli::output::OutputFormat;

#[derive(Debug, Serialize)]
struct ProfileInfo {
    name: &'static str,
    #[serde(flatten)]
    profile: RateLimitProfile,
}

/// Run the profiles command
pub fn run(ctx: &CliContext) -> Result<i32> {
    let registry = match ProfileRegistry::with_overrides(&ctx.config.rate_limit.profiles) {
        Ok(registry) => registry,
        Err(e) => {
            ctx.output.error(&format!("{}", e));
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let profiles: Vec<ProfileInfo> = registry
        .iter()
        .map(|(name, profile)| ProfileInfo {
            name: name.as_str(),
            profile,
        })
        .collect();

    match ctx.output.format() {
        OutputFormat::Json => ctx.output.json(&profiles)?,
        OutputFormat::Table => {
            ctx.output.header("Rate Limit Profiles");
            ctx.output.print(&format!(
                "{:<14} {:>10} {:>6} {:>10}  {}",
                "NAME", "WINDOW_MS", "MAX", "BLOCK_MS", "SKIPS"
            ));
            for info in &profiles {
                let p = &info.profile;
                let mut skips = Vec::new();
                if p.skip_successful_requests {
                    skips.push("successful");
                }
                if p.skip_failed_requests {
                    skips.push("failed");
                }
                ctx.output.print(&format!(
                    "{:<14} {:>10} {:>6} {:>10}  {}",
                    info.name,
                    p.window_ms,
                    p.max_requests,
                    p.block_duration_ms,
                    if skips.is_empty() {
                        "-".to_string()
                    } else {
                        skips.join(",")
                    }
                ));
            }
        }
    }

    Ok(exit_codes::SUCCESS)
}
