//! Status Command - Show remaining quota for a key without consuming it

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use ratewarden_core::infrastructure::RateLimitStatus;

use crate::cli::commands::{connect, parse_key, parse_profile};
use crate::cli::context::CliContext;
use crate::cli::exit_codes;
use crate::cli::output::OutputFormat;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Key to inspect, e.g. "ip:1.2.3.4" or "user:42"
    pub key: String,

    /// Profile name
    #[arg(short, long, default_value = "general")]
    pub profile: String,
}

/// Status information for JSON output
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    pub key: String,
    pub profile: String,
    pub limit: u32,
    pub blocked: bool,
    #[serde(flatten)]
    pub status: RateLimitStatus,
}

/// Run the status command
pub async fn run(ctx: &CliContext, args: &StatusArgs) -> Result<i32> {
    let key = match parse_key(ctx, &args.key) {
        Ok(key) => key,
        Err(code) => return Ok(code),
    };
    let profile = match parse_profile(ctx, &args.profile) {
        Ok(profile) => profile,
        Err(code) => return Ok(code),
    };
    let service = match connect(ctx).await {
        Ok(service) => service,
        Err(code) => return Ok(code),
    };

    let status = match service.status(&key, profile).await {
        Ok(status) => status,
        Err(e) => {
            ctx.output.error(&format!("Status lookup failed: {}", e));
            return Ok(exit_codes::STORE_UNAVAILABLE);
        }
    };

    let info = StatusInfo {
        key: key.to_string(),
        profile: profile.to_string(),
        limit: service.registry().get(profile).max_requests,
        blocked: status.is_blocked(),
        status,
    };

    match ctx.output.format() {
        OutputFormat::Json => ctx.output.json(&info)?,
        OutputFormat::Table => {
            ctx.output.header(&format!("Rate Limit Status: {} ({})", info.key, info.profile));
            ctx.output
                .row("Remaining", format!("{}/{}", status.remaining, info.limit));
            ctx.output.row("Hits in window", status.total_hits);
            ctx.output.row("Resets at (ms)", status.reset_time);
            match status.retry_after {
                Some(seconds) => ctx.output.row("Blocked for", format!("{}s", seconds)),
                None => ctx.output.row("Blocked", "no"),
            }
        }
    }

    if info.blocked {
        Ok(exit_codes::BLOCKED)
    } else {
        Ok(exit_codes::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_info_serialization() {
        let info = StatusInfo {
            key: "ip:1.2.3.4".to_string(),
            profile: "auth".to_string(),
            limit: 10,
            blocked: true,
            status: RateLimitStatus {
                remaining: 0,
                reset_time: 61_000,
                total_hits: 10,
                retry_after: Some(60),
            },
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["key"], "ip:1.2.3.4");
        assert_eq!(json["retryAfter"], 60);
        assert_eq!(json["totalHits"], 10);
        assert_eq!(json["blocked"], true);
    }
}
