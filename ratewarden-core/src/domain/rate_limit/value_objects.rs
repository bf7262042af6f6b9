//! Rate limiting value objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::RateLimitError;
use super::profile::ProfileName;

/// Identity scope of a rate limit key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScope {
    /// Caller network address
    Ip,
    /// Authenticated user
    User,
}

impl KeyScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyScope::Ip => "ip",
            KeyScope::User => "user",
        }
    }
}

/// Canonical identity key (`ip:<addr>` or `user:<id>`)
///
/// The profile is not part of the key; storage keys combine both so the same
/// identity has disjoint state per profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    scope: KeyScope,
    identity: String,
}

impl RateLimitKey {
    /// Key for a caller IP address
    pub fn for_ip(ip: &str) -> Result<Self, RateLimitError> {
        let ip = ip.trim();
        if ip.is_empty() {
            return Err(RateLimitError::invalid_argument(
                "ip address cannot be empty",
            ));
        }
        Ok(Self {
            scope: KeyScope::Ip,
            identity: ip.to_string(),
        })
    }

    /// Key for an authenticated user
    pub fn for_user(user_id: &str) -> Result<Self, RateLimitError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(RateLimitError::invalid_argument("user id cannot be empty"));
        }
        Ok(Self {
            scope: KeyScope::User,
            identity: user_id.to_string(),
        })
    }

    pub fn scope(&self) -> KeyScope {
        self.scope
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Sorted-set key holding the window entries for this identity and profile
    pub fn window_key(&self, prefix: &str, profile: ProfileName) -> String {
        format!("{}:requests:{}:{}", prefix, profile.as_str(), self)
    }

    /// Scalar key holding the block marker for this identity and profile
    pub fn block_key(&self, prefix: &str, profile: ProfileName) -> String {
        format!("{}:block:{}:{}", prefix, profile.as_str(), self)
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope.as_str(), self.identity)
    }
}

impl FromStr for RateLimitKey {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // IPv6 literals contain ':' so only the first separator is significant
        match s.split_once(':') {
            Some(("ip", identity)) => Self::for_ip(identity),
            Some(("user", identity)) => Self::for_user(identity),
            _ => Err(RateLimitError::invalid_argument(format!(
                "rate limit key must start with 'ip:' or 'user:', got '{}'",
                s
            ))),
        }
    }
}

/// Outcome of the guarded operation, reported after it completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestOutcome {
    Succeeded,
    Failed,
}
