//! Engine configuration.
//!
//! Loads tunables from environment variables, with defaults suitable for a
//! single-process bot.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Tunables for the permission engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a cached guild snapshot may serve reads before being
    /// refreshed from the store. Bounds staleness for writes performed by
    /// other processes sharing a durable store; writes through this engine
    /// invalidate immediately. Default: 300 s.
    pub cache_ttl: Duration,

    /// Upper bound on any single persistence call. A call exceeding this is
    /// treated as store-unavailable. Default: 5 s.
    pub store_timeout: Duration,

    /// Maximum number of roles given deep (name + capability) analysis per
    /// classification pass; roles beyond this fall back to position-based
    /// classification. Default: 75.
    pub max_deep_analysis: usize,

    /// Guilds with more roles than this are classified by position only,
    /// which avoids pathological cost on ticket-per-user role patterns.
    /// Default: 200.
    pub large_guild_threshold: usize,

    /// Default number of audit entries returned by list queries.
    /// Default: 100.
    pub audit_list_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            store_timeout: Duration::from_secs(5),
            max_deep_analysis: 75,
            large_guild_threshold: 200,
            audit_list_limit: 100,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            cache_ttl: env_secs("MAGPIE_CACHE_TTL_SECS")?.unwrap_or(defaults.cache_ttl),
            store_timeout: env_secs("MAGPIE_STORE_TIMEOUT_SECS")?
                .unwrap_or(defaults.store_timeout),
            max_deep_analysis: env_usize("MAGPIE_MAX_DEEP_ANALYSIS")?
                .unwrap_or(defaults.max_deep_analysis),
            large_guild_threshold: env_usize("MAGPIE_LARGE_GUILD_THRESHOLD")?
                .unwrap_or(defaults.large_guild_threshold),
            audit_list_limit: env_usize("MAGPIE_AUDIT_LIST_LIMIT")?
                .unwrap_or(defaults.audit_list_limit),
        })
    }
}

fn env_secs(key: &str) -> Result<Option<Duration>> {
    match env::var(key) {
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("{key} must be a number of seconds"))?;
            Ok(Some(Duration::from_secs(secs)))
        }
        Err(_) => Ok(None),
    }
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    match env::var(key) {
        Ok(raw) => {
            let value: usize = raw
                .parse()
                .with_context(|| format!("{key} must be a non-negative integer"))?;
            Ok(Some(value))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.max_deep_analysis, 75);
        assert_eq!(config.large_guild_threshold, 200);
        assert_eq!(config.audit_list_limit, 100);
    }

    #[test]
    fn test_from_env_uses_defaults_when_unset() {
        // Scoped to variables this test does not set.
        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.max_deep_analysis, 75);
    }
}
