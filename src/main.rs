//! Ratewarden - Main application entry point
//!
//! Runs the rate limiter maintenance service or a one-shot operator command.

use ratewarden::cli::CliApp;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        // Only warn if it's not a "file not found" error
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let exit_code = CliApp::new().run().await?;

    std::process::exit(exit_code);
}
