//! Configuration module for login-service.

use secrecy::SecretString;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct LoginConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Settings for the upstream identity provider. Loaded once at startup and
/// shared read-only; nothing mutates these after `from_env`.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Master switch; when false the service runs purely against the local
    /// store and never opens a connection to the provider.
    pub enabled: bool,
    pub base_url: String,
    pub api_key: SecretString,
    /// Bounds both connect and read per request.
    pub timeout_ms: u64,
    /// Grant a login on local credentials when the provider rejects or is
    /// unreachable.
    pub fallback_to_local: bool,
    /// Allow the post-decision one-way sync side effects.
    pub sync_on_auth: bool,
    pub log_requests: bool,
    pub log_responses: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://identity-provider:3001".to_string(),
            api_key: SecretString::new(String::new()),
            timeout_ms: 30_000,
            fallback_to_local: true,
            sync_on_auth: true,
            log_requests: false,
            log_responses: false,
        }
    }
}

impl LoginConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "login-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS", 2),
            },
            upstream: UpstreamConfig {
                enabled: env_parse("UPSTREAM_ENABLED", true),
                base_url: env::var("UPSTREAM_BASE_URL")
                    .unwrap_or_else(|_| "http://identity-provider:3001".to_string()),
                api_key: SecretString::new(env::var("UPSTREAM_API_KEY").unwrap_or_default()),
                timeout_ms: env_parse("UPSTREAM_TIMEOUT_MS", 30_000),
                fallback_to_local: env_parse("UPSTREAM_FALLBACK_TO_LOCAL", true),
                sync_on_auth: env_parse("UPSTREAM_SYNC_ON_AUTH", true),
                log_requests: env_parse("UPSTREAM_LOG_REQUESTS", false),
                log_responses: env_parse("UPSTREAM_LOG_RESPONSES", false),
            },
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_defaults_match_documented_values() {
        let upstream = UpstreamConfig::default();
        assert!(upstream.enabled);
        assert_eq!(upstream.timeout_ms, 30_000);
        assert!(upstream.fallback_to_local);
        assert!(upstream.sync_on_auth);
        assert!(!upstream.log_requests);
        assert!(!upstream.log_responses);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        std::env::set_var("TEST_ENV_PARSE_GARBAGE", "not-a-number");
        let parsed: u64 = env_parse("TEST_ENV_PARSE_GARBAGE", 42);
        assert_eq!(parsed, 42);
        std::env::remove_var("TEST_ENV_PARSE_GARBAGE");
    }
}
