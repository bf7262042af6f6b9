//! Rate limit profiles and the profile registry
//!
//! A profile is a named set of sliding-window parameters applied to a class of
//! operations. The registry is built once at startup from the built-in table
//! (optionally adjusted by configuration) and is read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::errors::RateLimitError;

/// Longest accepted window or block duration (one year)
pub const MAX_DURATION_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// Named rate limit profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProfileName {
    /// Login and other credential checks
    Auth,
    /// Password reset requests
    #[serde(alias = "password_reset", alias = "passwordreset")]
    PasswordReset,
    /// AI content generation
    #[serde(alias = "ai_generation", alias = "aigeneration")]
    AiGeneration,
    /// AI chat turns
    #[serde(alias = "ai_chat", alias = "aichat")]
    AiChat,
    /// General API traffic
    General,
    /// File uploads
    Upload,
}

impl ProfileName {
    /// Every profile known to the registry
    pub const ALL: [ProfileName; 6] = [
        ProfileName::Auth,
        ProfileName::PasswordReset,
        ProfileName::AiGeneration,
        ProfileName::AiChat,
        ProfileName::General,
        ProfileName::Upload,
    ];

    /// Get the profile name as used in storage keys and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileName::Auth => "auth",
            ProfileName::PasswordReset => "passwordReset",
            ProfileName::AiGeneration => "aiGeneration",
            ProfileName::AiChat => "aiChat",
            ProfileName::General => "general",
            ProfileName::Upload => "upload",
        }
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProfileName {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(RateLimitError::invalid_argument(
                "profile name cannot be empty",
            ));
        }

        // Accept camelCase, snake_case and lowercase spellings
        let normalized = trimmed.replace(['_', '-'], "").to_ascii_lowercase();
        ProfileName::ALL
            .into_iter()
            .find(|p| p.as_str().to_ascii_lowercase() == normalized)
            .ok_or_else(|| RateLimitError::UnknownProfile {
                name: trimmed.to_string(),
            })
    }
}

/// Sliding window parameters for one profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitProfile {
    /// Length of the trailing window in milliseconds
    pub window_ms: u64,
    /// Requests admitted per window
    pub max_requests: u32,
    /// How long an identity stays blocked after exceeding the limit (0 = soft deny only)
    pub block_duration_ms: u64,
    /// Do not count requests reported as successful
    pub skip_successful_requests: bool,
    /// Do not count requests reported as failed
    pub skip_failed_requests: bool,
}

impl RateLimitProfile {
    pub const fn new(window_ms: u64, max_requests: u32, block_duration_ms: u64) -> Self {
        Self {
            window_ms,
            max_requests,
            block_duration_ms,
            skip_successful_requests: false,
            skip_failed_requests: false,
        }
    }

    /// Built-in parameters for a profile
    pub fn builtin(name: ProfileName) -> Self {
        match name {
            ProfileName::Auth => Self {
                skip_successful_requests: true,
                ..Self::new(60_000, 10, 60_000)
            },
            ProfileName::PasswordReset => Self::new(3_600_000, 3, 3_600_000),
            ProfileName::AiGeneration => Self::new(60_000, 10, 300_000),
            ProfileName::AiChat => Self::new(60_000, 30, 0),
            ProfileName::General => Self::new(60_000, 100, 0),
            ProfileName::Upload => Self {
                skip_failed_requests: true,
                ..Self::new(3_600_000, 20, 0)
            },
        }
    }

    /// Merge a partial override on top of these parameters
    pub fn merged(&self, overrides: &RateLimitOverride) -> Self {
        Self {
            window_ms: overrides.window_ms.unwrap_or(self.window_ms),
            max_requests: overrides.max_requests.unwrap_or(self.max_requests),
            block_duration_ms: overrides
                .block_duration_ms
                .unwrap_or(self.block_duration_ms),
            skip_successful_requests: overrides
                .skip_successful_requests
                .unwrap_or(self.skip_successful_requests),
            skip_failed_requests: overrides
                .skip_failed_requests
                .unwrap_or(self.skip_failed_requests),
        }
    }

    /// TTL applied to the window collection, in whole seconds (rounded up)
    pub fn window_ttl_secs(&self) -> u64 {
        ceil_secs(self.window_ms)
    }

    /// TTL applied to a block marker, in whole seconds (rounded up)
    pub fn block_ttl_secs(&self) -> u64 {
        ceil_secs(self.block_duration_ms)
    }

    pub fn blocks_on_exceed(&self) -> bool {
        self.block_duration_ms > 0
    }

    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.window_ms == 0 {
            return Err(RateLimitError::invalid_argument(
                "window_ms must be greater than 0",
            ));
        }
        if self.max_requests == 0 {
            return Err(RateLimitError::invalid_argument(
                "max_requests must be greater than 0",
            ));
        }
        if self.window_ms > MAX_DURATION_MS || self.block_duration_ms > MAX_DURATION_MS {
            return Err(RateLimitError::invalid_argument(format!(
                "window_ms and block_duration_ms must not exceed {} ms",
                MAX_DURATION_MS
            )));
        }
        Ok(())
    }
}

/// Partial override of a profile, applied per call or at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitOverride {
    pub window_ms: Option<u64>,
    pub max_requests: Option<u32>,
    pub block_duration_ms: Option<u64>,
    pub skip_successful_requests: Option<bool>,
    pub skip_failed_requests: Option<bool>,
}

impl RateLimitOverride {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = Some(max_requests);
        self
    }

    pub fn with_window_ms(mut self, window_ms: u64) -> Self {
        self.window_ms = Some(window_ms);
        self
    }

    pub fn with_block_duration_ms(mut self, block_duration_ms: u64) -> Self {
        self.block_duration_ms = Some(block_duration_ms);
        self
    }
}

/// Immutable table of profiles, populated once at startup
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<ProfileName, RateLimitProfile>,
}

impl ProfileRegistry {
    /// Registry holding the built-in parameters for every profile
    pub fn with_defaults() -> Self {
        let profiles = ProfileName::ALL
            .into_iter()
            .map(|name| (name, RateLimitProfile::builtin(name)))
            .collect();
        Self { profiles }
    }

    /// Registry with startup adjustments applied on top of the built-in table
    pub fn with_overrides(
        overrides: &HashMap<ProfileName, RateLimitOverride>,
    ) -> Result<Self, RateLimitError> {
        let mut registry = Self::with_defaults();
        for (name, adjustment) in overrides {
            let profile = registry.get(*name).merged(adjustment);
            profile.validate().map_err(|e| {
                RateLimitError::invalid_argument(format!("profile {}: {}", name, e))
            })?;
            registry.profiles.insert(*name, profile);
        }
        Ok(registry)
    }

    /// Parameters registered for a profile
    pub fn get(&self, name: ProfileName) -> RateLimitProfile {
        self.profiles
            .get(&name)
            .copied()
            .unwrap_or_else(|| RateLimitProfile::builtin(name))
    }

    /// Look a profile up by its textual name
    pub fn lookup(&self, name: &str) -> Result<(ProfileName, RateLimitProfile), RateLimitError> {
        let profile_name: ProfileName = name.parse()?;
        Ok((profile_name, self.get(profile_name)))
    }

    /// Effective parameters for one call: registered profile merged with the override
    pub fn resolve(
        &self,
        name: ProfileName,
        overrides: Option<&RateLimitOverride>,
    ) -> Result<RateLimitProfile, RateLimitError> {
        let base = self.get(name);
        let effective = match overrides {
            Some(o) if !o.is_empty() => base.merged(o),
            _ => base,
        };
        effective.validate()?;
        Ok(effective)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProfileName, RateLimitProfile)> + '_ {
        ProfileName::ALL.into_iter().map(|name| (name, self.get(name)))
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Milliseconds to whole seconds, rounding up
pub fn ceil_secs(ms: u64) -> u64 {
    ms.div_ceil(1000)
}
