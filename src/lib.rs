//! Ratewarden - Operator binary for the sliding window rate limiter
//!
//! Wires configuration, logging and the rate limiter service together and
//! exposes the `ratewarden` command line.

mod app;
pub mod cli;

pub use app::{AppHandle, build_service, create_app, shutdown_signal, wait_for_shutdown};
pub use ratewarden_core::{Config, init_tracing};

// Re-export for convenience
pub use ratewarden_core;
