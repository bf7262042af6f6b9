//! Domain Layer - Core rate limiting concepts
//!
//! This module contains the value objects and errors that describe admission
//! control independently of any backing store.

pub mod rate_limit;

pub use rate_limit::*;
