//! Ratewarden Core - Sliding window rate limiting for request-serving backends
//!
//! This crate decides, per request, whether an identity (client IP or user id)
//! may proceed under a named profile such as `auth` or `passwordReset`.
//!
//! # Modules
//!
//! - [`config`] - Strongly-typed configuration with TOML and environment variable support
//! - [`domain`] - Profiles, identity keys and domain errors
//! - [`infrastructure`] - Sliding window limiter, storage backends and maintenance jobs
//! - [`logging`] - Structured logging with tracing
//!
//! # Architecture
//!
//! ```text
//! ratewarden-core/
//! ├── domain/
//! │   └── rate_limit/      # Profiles, keys, errors
//! ├── infrastructure/
//! │   └── rate_limiter/    # Limiter, storage, maintenance, service
//! └── config/              # Configuration management
//! ```
//!
//! # Configuration
//!
//! Load configuration from files and environment:
//!
//! ```rust,ignore
//! use ratewarden_core::Config;
//!
//! let config = Config::load()?;
//! ```
//!
//! Environment variables use the `RATEWARDEN__` prefix with double underscore separators:
//!
//! ```bash
//! RATEWARDEN__STORE__URL=redis://127.0.0.1:6379
//! RATEWARDEN__RATE_LIMIT__STORAGE_BACKEND=memory
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use ratewarden_core::domain::rate_limit::ProfileName;
//! use ratewarden_core::infrastructure::RateLimiterService;
//!
//! let service = RateLimiterService::new_with_url(config.rate_limit, &config.store.url).await?;
//! let result = service.check_by_ip("1.2.3.4", ProfileName::Auth, None, None).await?;
//! if !result.allowed {
//!     // respond 429 with Retry-After = result.retry_after
//! }
//! ```

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use config::Config;
pub use logging::init_tracing;
