//! Configuration for insight service
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use crate::error::{InsightError, Result};
use crate::jobs::schedule::RefreshSchedule;
use crate::jobs::FailurePolicy;
use crate::providers::gemini::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::staleness::{RefreshInterval, DEFAULT_INTERVAL_DAYS};

/// Main configuration struct, loaded from environment variables
#[derive(Clone, Deserialize)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout")]
    pub db_connect_timeout_secs: u64,

    #[serde(default = "default_db_acquire_timeout")]
    pub db_acquire_timeout_secs: u64,

    #[serde(default = "default_db_idle_timeout")]
    pub db_idle_timeout_secs: u64,

    /// Gemini API key
    pub gemini_api_key: String,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,

    /// Upper bound on one generation call
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    #[serde(default = "default_refresh_interval_days")]
    pub refresh_interval_days: i64,

    /// Cron expression, 5-field Unix form or the 6/7-field form with seconds
    #[serde(default = "default_refresh_schedule")]
    pub refresh_schedule: String,

    #[serde(default)]
    pub refresh_failure_policy: FailurePolicy,

    /// Redis URL for the cross-instance cycle lock; in-process lock if unset
    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_lock_key")]
    pub refresh_lock_key: String,

    /// Lease length; must outlive the longest expected cycle
    #[serde(default = "default_lock_ttl")]
    pub refresh_lock_ttl_secs: u64,
}

/// Connection pool settings
#[derive(Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .finish()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database", &self.database())
            .field("gemini_api_key", &"[REDACTED]")
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("generation_timeout_secs", &self.generation_timeout_secs)
            .field("refresh_interval_days", &self.refresh_interval_days)
            .field("refresh_schedule", &self.refresh_schedule)
            .field("refresh_failure_policy", &self.refresh_failure_policy)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_lock_key", &self.refresh_lock_key)
            .field("refresh_lock_ttl_secs", &self.refresh_lock_ttl_secs)
            .finish()
    }
}

fn default_db_max_connections() -> u32 {
    5
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout() -> u64 {
    5
}

fn default_db_acquire_timeout() -> u64 {
    10
}

fn default_db_idle_timeout() -> u64 {
    600
}

fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_gemini_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

fn default_generation_timeout() -> u64 {
    120
}

fn default_refresh_interval_days() -> i64 {
    DEFAULT_INTERVAL_DAYS
}

fn default_refresh_schedule() -> String {
    // Sunday 00:00 UTC
    "0 0 * * Sun".to_string()
}

fn default_lock_key() -> String {
    "insight-service:lock:insight-refresh".to_string()
}

fn default_lock_ttl() -> u64 {
    3600
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> std::result::Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(InsightError::Config("DATABASE_URL must not be empty".to_string()));
        }
        if self.gemini_api_key.trim().is_empty() {
            return Err(InsightError::Config("GEMINI_API_KEY must not be empty".to_string()));
        }
        if self.generation_timeout_secs == 0 {
            return Err(InsightError::Config(
                "GENERATION_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }
        if self.refresh_lock_ttl_secs == 0 {
            return Err(InsightError::Config(
                "REFRESH_LOCK_TTL_SECS must be greater than 0".to_string(),
            ));
        }
        if self.db_min_connections > self.db_max_connections {
            return Err(InsightError::Config(
                "DB_MIN_CONNECTIONS must not exceed DB_MAX_CONNECTIONS".to_string(),
            ));
        }
        self.refresh_interval()?;
        self.schedule()?;
        Ok(())
    }

    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig {
            database_url: self.database_url.clone(),
            max_connections: self.db_max_connections,
            min_connections: self.db_min_connections,
            connect_timeout_secs: self.db_connect_timeout_secs,
            acquire_timeout_secs: self.db_acquire_timeout_secs,
            idle_timeout_secs: self.db_idle_timeout_secs,
        }
    }

    pub fn refresh_interval(&self) -> Result<RefreshInterval> {
        RefreshInterval::days(self.refresh_interval_days)
    }

    pub fn schedule(&self) -> Result<RefreshSchedule> {
        RefreshSchedule::parse(&self.refresh_schedule)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_lock_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(extra: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut vars = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/insights".to_string()),
            ("GEMINI_API_KEY".to_string(), "test-key".to_string()),
        ];
        vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        vars
    }

    #[test]
    fn test_defaults() {
        let config: Config = envy::from_iter(vars(&[])).unwrap();
        assert_eq!(config.gemini_model, "gemini-2.0-flash");
        assert_eq!(config.generation_timeout_secs, 120);
        assert_eq!(config.refresh_interval_days, 7);
        assert_eq!(config.refresh_schedule, "0 0 * * Sun");
        assert_eq!(config.refresh_failure_policy, FailurePolicy::Continue);
        assert!(config.redis_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config: Config = envy::from_iter(vars(&[
            ("REFRESH_FAILURE_POLICY", "abort"),
            ("REFRESH_INTERVAL_DAYS", "14"),
            ("REDIS_URL", "redis://127.0.0.1:6379"),
            ("REFRESH_SCHEDULE", "0 30 2 * * Mon"),
        ]))
        .unwrap();
        assert_eq!(config.refresh_failure_policy, FailurePolicy::Abort);
        assert_eq!(config.refresh_interval().unwrap().num_days(), 14);
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(config.schedule().unwrap().expression(), "0 30 2 * * Mon");
    }

    #[test]
    fn test_missing_api_key_is_error() {
        let result: std::result::Result<Config, _> = envy::from_iter(vec![(
            "DATABASE_URL".to_string(),
            "postgres://localhost/insights".to_string(),
        )]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        let mut config: Config = envy::from_iter(vars(&[])).unwrap();
        config.refresh_interval_days = 0;
        assert!(config.validate().is_err());

        let mut config: Config = envy::from_iter(vars(&[])).unwrap();
        config.refresh_schedule = "not a cron".to_string();
        assert!(config.validate().is_err());

        let mut config: Config = envy::from_iter(vars(&[])).unwrap();
        config.generation_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config: Config = envy::from_iter(vars(&[])).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("test-key"));
        assert!(!debug.contains("postgres://"));
    }
}
