//! Infrastructure Layer - External concerns and implementations
//!
//! This module handles the backing store used for rate limiting state.

pub mod rate_limiter;

pub use rate_limiter::*;
