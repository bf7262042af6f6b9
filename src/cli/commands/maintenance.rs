//! Stats and Cleanup Commands - One-shot keyspace maintenance

use anyhow::Result;

use crate::cli::commands::connect;
use crate::cli::context::CliContext;
use crate::cli::exit_codes;
use crate::cli::output::OutputFormat;

/// Sample the limiter keyspace and print the counts
pub async fn stats(ctx: &CliContext) -> Result<i32> {
    let service = match connect(ctx).await {
        Ok(service) => service,
        Err(code) => return Ok(code),
    };

    let stats = match service.stats().await {
        Ok(stats) => stats,
        Err(e) => {
            ctx.output.error(&format!("Stats sampling failed: {}", e));
            return Ok(exit_codes::STORE_UNAVAILABLE);
        }
    };

    match ctx.output.format() {
        OutputFormat::Json => ctx.output.json(&stats)?,
        OutputFormat::Table => {
            ctx.output.header("Rate Limit Stats");
            ctx.output.row("Active windows", stats.active_windows);
            ctx.output.row("Blocked keys", stats.blocked_keys);
            ctx.output.row("Total requests", stats.total_requests);
            ctx.output.row("Sampled keys", stats.sampled_keys);
            if stats.truncated {
                ctx.output
                    .warn("Sample limit reached; counts cover part of the keyspace");
            }
        }
    }

    Ok(exit_codes::SUCCESS)
}

/// Run one cleanup pass and print the report
pub async fn cleanup(ctx: &CliContext) -> Result<i32> {
    let service = match connect(ctx).await {
        Ok(service) => service,
        Err(code) => return Ok(code),
    };

    let report = match service.cleanup().await {
        Ok(report) => report,
        Err(e) => {
            ctx.output.error(&format!("Cleanup failed: {}", e));
            return Ok(exit_codes::STORE_UNAVAILABLE);
        }
    };

    match ctx.output.format() {
        OutputFormat::Json => ctx.output.json(&report)?,
        OutputFormat::Table => {
            ctx.output.header("Rate Limit Cleanup");
            ctx.output.row("Cleaned keys", report.cleaned_keys);
            ctx.output.row("Scanned keys", report.scanned_keys);
            ctx.output.row("Batches", report.batches);
            if report.truncated {
                ctx.output
                    .warn("Cleanup cap reached; run again to continue");
            } else {
                ctx.output.success("Cleanup complete");
            }
        }
    }

    Ok(exit_codes::SUCCESS)
}
