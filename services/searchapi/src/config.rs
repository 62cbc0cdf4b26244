//! Service configuration sourced from environment variables.
//!
//! # Purpose
//! Centralizes every tunable the service reads at startup: database
//! connection, cache TTLs, query limits, HTTP ports, and federation knobs.
//!
//! # Notes
//! Time-valued settings are milliseconds in the environment and `Duration`
//! in memory. Logging the configuration goes through [`Config::redacted`]
//! so the database password never reaches the log stream.
use anyhow::{Result, bail};
use std::time::Duration;

pub const DEFAULT_QUERY_LIMIT: i64 = 1000;

// Factor applied to the query limit for the inner schema scan. A high bound
// keeps the property list near-complete while still letting the planner put
// a LIMIT on the inner query.
pub const SCHEMA_LIMIT_FACTOR: i64 = 100;

// Factor applied to the query limit for autocomplete suggestions.
pub const COMPLETE_LIMIT_FACTOR: i64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_pass: String,
    pub db_max_conns: u32,

    // Freshness windows for the token-review, shared, and per-user caches.
    pub auth_cache_ttl: Duration,
    pub shared_cache_ttl: Duration,
    pub user_cache_ttl: Duration,

    // Row limit applied when a search request omits one.
    pub query_limit: i64,

    pub http_port: u16,
    pub metrics_port: u16,

    // Trust a local self-signed CA from sslcert/tls.crt instead of the
    // in-cluster service CA.
    pub development_mode: bool,

    pub federation: FederationConfig,
}

#[derive(Debug, Clone)]
pub struct FederationConfig {
    pub enabled: bool,
    // Name used for the local peer in federated responses.
    pub global_hub_name: String,
    pub config_cache_ttl: Duration,
    pub http_pool: HttpPoolConfig,
}

#[derive(Debug, Clone)]
pub struct HttpPoolConfig {
    pub max_idle_conns: usize,
    pub max_idle_conn_timeout: Duration,
    pub response_header_timeout: Duration,
    pub max_conns_per_host: usize,
    pub max_idle_conn_per_host: usize,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            db_host: get_env("DB_HOST", "localhost"),
            db_port: get_env_as_u64("DB_PORT", 5432) as u16,
            db_name: get_env("DB_NAME", ""),
            db_user: get_env("DB_USER", ""),
            db_pass: get_env("DB_PASS", ""),
            db_max_conns: get_env_as_u64("DB_MAX_CONNS", 10) as u32,
            auth_cache_ttl: env_millis("AUTH_CACHE_TTL", 60_000),
            shared_cache_ttl: env_millis("SHARED_CACHE_TTL", 300_000),
            user_cache_ttl: env_millis("USER_CACHE_TTL", 300_000),
            query_limit: get_env_as_u64("QUERY_LIMIT", DEFAULT_QUERY_LIMIT as u64) as i64,
            http_port: get_env_as_u64("HTTP_PORT", 4010) as u16,
            metrics_port: get_env_as_u64("METRICS_PORT", 8080) as u16,
            development_mode: get_env_as_bool("DEVELOPMENT_MODE", false),
            federation: FederationConfig {
                enabled: get_env_as_bool("FEDERATION_ENABLED", false),
                global_hub_name: get_env("FEDERATION_GLOBAL_HUB_NAME", "global-hub"),
                config_cache_ttl: env_millis("FEDERATION_CONFIG_CACHE_TTL", 120_000),
                http_pool: HttpPoolConfig {
                    max_idle_conns: get_env_as_u64("MAX_IDLE_CONNS", 100) as usize,
                    max_idle_conn_timeout: env_millis("MAX_IDLE_CONN_TIMEOUT", 90_000),
                    response_header_timeout: env_millis("RESPONSE_HEADER_TIMEOUT", 5_000),
                    max_conns_per_host: get_env_as_u64("MAX_CONNS_PER_HOST", 10) as usize,
                    max_idle_conn_per_host: get_env_as_u64("MAX_IDLE_CONN_PER_HOST", 10) as usize,
                    request_timeout: env_millis("REQUEST_TIMEOUT", 30_000),
                },
            },
        }
    }

    // The database credentials have no sane defaults; refuse to start
    // without them so a misconfigured deployment fails loudly.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("DB_NAME", &self.db_name),
            ("DB_USER", &self.db_user),
            ("DB_PASS", &self.db_pass),
        ] {
            if value.is_empty() {
                bail!("required environment {key} is not set");
            }
        }
        Ok(())
    }

    /// Copy of the configuration safe to log. The live value is untouched.
    pub fn redacted(&self) -> Config {
        let mut copy = self.clone();
        copy.db_pass = "[REDACTED]".to_string();
        copy
    }

    pub fn log(&self) {
        tracing::info!(config = ?self.redacted(), "resolved configuration");
    }
}

#[cfg(test)]
impl Config {
    /// Fixed configuration for cache unit tests; independent of the
    /// process environment.
    pub(crate) fn for_tests() -> Self {
        Self {
            db_host: "localhost".to_string(),
            db_port: 5432,
            db_name: "test".to_string(),
            db_user: "test".to_string(),
            db_pass: "test".to_string(),
            db_max_conns: 2,
            auth_cache_ttl: Duration::from_millis(60_000),
            shared_cache_ttl: Duration::from_millis(60_000),
            user_cache_ttl: Duration::from_millis(60_000),
            query_limit: 1000,
            http_port: 4010,
            metrics_port: 8080,
            development_mode: false,
            federation: FederationConfig {
                enabled: false,
                global_hub_name: "global-hub".to_string(),
                config_cache_ttl: Duration::from_millis(60_000),
                http_pool: HttpPoolConfig {
                    max_idle_conns: 100,
                    max_idle_conn_timeout: Duration::from_millis(90_000),
                    response_header_timeout: Duration::from_millis(5_000),
                    max_conns_per_host: 10,
                    max_idle_conn_per_host: 10,
                    request_timeout: Duration::from_millis(30_000),
                },
            },
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn get_env_as_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn get_env_as_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: u64) -> Duration {
    Duration::from_millis(get_env_as_u64(key, default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_db_env() {
        for key in ["DB_HOST", "DB_PORT", "DB_NAME", "DB_USER", "DB_PASS"] {
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn defaults_when_env_unset() {
        clear_db_env();
        let config = Config::from_env();
        assert_eq!(config.db_host, "localhost");
        assert_eq!(config.db_port, 5432);
        assert_eq!(config.query_limit, 1000);
        assert_eq!(config.auth_cache_ttl, Duration::from_millis(60_000));
        assert!(!config.federation.enabled);
    }

    #[test]
    #[serial]
    fn reads_values_from_env() {
        unsafe {
            std::env::set_var("QUERY_LIMIT", "250");
            std::env::set_var("FEDERATION_ENABLED", "true");
        }
        let config = Config::from_env();
        assert_eq!(config.query_limit, 250);
        assert!(config.federation.enabled);
        unsafe {
            std::env::remove_var("QUERY_LIMIT");
            std::env::remove_var("FEDERATION_ENABLED");
        }
    }

    #[test]
    #[serial]
    fn validate_names_first_missing_key() {
        clear_db_env();
        unsafe {
            std::env::set_var("DB_NAME", "test");
            std::env::set_var("DB_USER", "test");
            std::env::set_var("DB_PASS", "test");
        }
        assert!(Config::from_env().validate().is_ok());

        unsafe {
            std::env::set_var("DB_PASS", "");
        }
        let err = Config::from_env().validate().unwrap_err();
        assert_eq!(err.to_string(), "required environment DB_PASS is not set");

        unsafe {
            std::env::set_var("DB_USER", "");
        }
        let err = Config::from_env().validate().unwrap_err();
        assert_eq!(err.to_string(), "required environment DB_USER is not set");

        unsafe {
            std::env::set_var("DB_NAME", "");
        }
        let err = Config::from_env().validate().unwrap_err();
        assert_eq!(err.to_string(), "required environment DB_NAME is not set");
        clear_db_env();
    }

    #[test]
    #[serial]
    fn redaction_hides_password_without_mutating() {
        clear_db_env();
        unsafe {
            std::env::set_var("DB_PASS", "hunter2");
        }
        let config = Config::from_env();
        let logged = format!("{:?}", config.redacted());
        assert!(logged.contains("[REDACTED]"));
        assert!(!logged.contains("hunter2"));
        assert_eq!(config.db_pass, "hunter2");
        clear_db_env();
    }
}
