//! Rate limiting domain: profiles, keys and errors

pub mod errors;
pub mod profile;
pub mod value_objects;

pub use errors::RateLimitError;
pub use profile::{ProfileName, ProfileRegistry, RateLimitOverride, RateLimitProfile};
pub use value_objects::{KeyScope, RateLimitKey, RequestOutcome};
