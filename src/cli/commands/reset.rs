//! Reset Command - Clear window and block state for a key

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::commands::{connect, parse_key, parse_profile};
use crate::cli::context::CliContext;
use crate::cli::exit_codes;
use crate::cli::output::OutputFormat;

/// Arguments for the reset command
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Key to reset, e.g. "ip:1.2.3.4" or "user:42"
    pub key: String,

    /// Only reset this profile (default: every profile)
    #[arg(short, long)]
    pub profile: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResetInfo {
    key: String,
    profile: Option<String>,
    reset: bool,
}

/// Run the reset command
pub async fn run(ctx: &CliContext, args: &ResetArgs) -> Result<i32> {
    let key = match parse_key(ctx, &args.key) {
        Ok(key) => key,
        Err(code) => return Ok(code),
    };
    let profile = match args.profile.as_deref().map(|p| parse_profile(ctx, p)).transpose() {
        Ok(profile) => profile,
        Err(code) => return Ok(code),
    };
    let service = match connect(ctx).await {
        Ok(service) => service,
        Err(code) => return Ok(code),
    };

    let reset = match profile {
        Some(profile) => service.reset_profile(&key, profile).await,
        None => service.reset(&key).await,
    };

    let info = ResetInfo {
        key: key.to_string(),
        profile: profile.map(|p| p.to_string()),
        reset,
    };

    match ctx.output.format() {
        OutputFormat::Json => ctx.output.json(&info)?,
        OutputFormat::Table => {
            let scope = info.profile.as_deref().unwrap_or("all profiles");
            if reset {
                ctx.output
                    .success(&format!("Reset {} ({})", info.key, scope));
            } else {
                ctx.output
                    .error(&format!("Failed to reset {} ({})", info.key, scope));
            }
        }
    }

    if reset {
        Ok(exit_codes::SUCCESS)
    } else {
        Ok(exit_codes::STORE_UNAVAILABLE)
    }
}
