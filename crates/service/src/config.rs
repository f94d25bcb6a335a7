//! Service configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use lockkeeper_core::locking::{
    clamp_poll_interval_ms, DEFAULT_REVOKE_POLL_INTERVAL_MS, DEFAULT_REVOKE_TIMEOUT_SECS,
};
use lockkeeper_db::DEFAULT_MAX_CONNECTIONS;

/// Lock manager tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfig {
    /// Interval between store checks while waiting on a revocation.
    /// Always within the sub-second range enforced by `clamp_poll_interval_ms`.
    pub poll_interval: Duration,
    /// Revoke timeout used by callers that do not supply one.
    pub default_revoke_timeout_secs: i64,
}

impl LockConfig {
    pub fn new(poll_interval_ms: u64, default_revoke_timeout_secs: i64) -> Self {
        Self {
            poll_interval: Duration::from_millis(clamp_poll_interval_ms(poll_interval_ms)),
            default_revoke_timeout_secs: default_revoke_timeout_secs.max(0),
        }
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                            | Default |
    /// |------------------------------------|---------|
    /// | `LOCK_REVOKE_POLL_INTERVAL_MS`     | `250`   |
    /// | `LOCK_DEFAULT_REVOKE_TIMEOUT_SECS` | `10`    |
    pub fn from_env() -> Self {
        let poll_ms = env_or("LOCK_REVOKE_POLL_INTERVAL_MS", DEFAULT_REVOKE_POLL_INTERVAL_MS);
        let timeout = env_or("LOCK_DEFAULT_REVOKE_TIMEOUT_SECS", DEFAULT_REVOKE_TIMEOUT_SECS);
        Self::new(poll_ms, timeout)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REVOKE_POLL_INTERVAL_MS, DEFAULT_REVOKE_TIMEOUT_SECS)
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl DbConfig {
    /// | Env Var              | Default  |
    /// |----------------------|----------|
    /// | `DATABASE_URL`       | (unset)  |
    /// | `DB_MAX_CONNECTIONS` | `20`     |
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            max_connections: env_or("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
        }
    }
}

/// Read and parse `name`, falling back to `default` when it is unset or
/// does not parse.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => parse_or(name, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T>(name: &str, raw: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(var = name, value = raw, fallback = %default, "Invalid value, using default");
        default
    })
}
