//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub reflection_model: String,
    pub analysis_model: String,
    pub ai_connect_timeout: Duration,
    pub ai_response_timeout: Duration,
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
    pub scheduler_enabled: bool,
    pub scheduler_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // --- Load Server and Database Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            non_empty("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:5173");

        // --- Load AI Settings (the key is optional) ---
        let openai_api_key = non_empty("OPENAI_API_KEY");
        let openai_api_base = non_empty("OPENAI_API_BASE");
        let reflection_model = var_or("REFLECTION_MODEL", "gpt-4o-mini");
        let analysis_model = var_or("ANALYSIS_MODEL", "gpt-4o-mini");
        let ai_connect_timeout = parse_secs(&lookup, "AI_CONNECT_TIMEOUT_SECS", 10)?;
        let ai_response_timeout = parse_secs(&lookup, "AI_RESPONSE_TIMEOUT_SECS", 30)?;

        // --- Load Mail Settings ---
        let mail_api_url = non_empty("MAIL_API_URL");
        let mail_api_key = non_empty("MAIL_API_KEY");
        let mail_from = var_or("MAIL_FROM", "no-reply@journal.local");

        // --- Load Scheduler Settings ---
        let scheduler_enabled_str = var_or("SUMMARY_SCHEDULER_ENABLED", "true");
        let scheduler_enabled = scheduler_enabled_str.parse::<bool>().map_err(|_| {
            ConfigError::InvalidValue(
                "SUMMARY_SCHEDULER_ENABLED".to_string(),
                format!("'{}' is not true or false", scheduler_enabled_str),
            )
        })?;
        let scheduler_interval = parse_secs(&lookup, "SUMMARY_SCHEDULER_INTERVAL_SECS", 86_400)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            openai_api_key,
            openai_api_base,
            reflection_model,
            analysis_model,
            ai_connect_timeout,
            ai_response_timeout,
            mail_api_url,
            mail_api_key,
            mail_from,
            scheduler_enabled,
            scheduler_interval,
        })
    }
}

/// Reads a positive number of seconds.
fn parse_secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(Duration::from_secs(default));
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{}' is not a positive number of seconds", raw),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/journal")]).unwrap();

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.ai_connect_timeout, Duration::from_secs(10));
        assert_eq!(config.ai_response_timeout, Duration::from_secs(30));
        assert_eq!(config.mail_api_url, None);
        assert!(config.scheduler_enabled);
        assert_eq!(config.scheduler_interval, Duration::from_secs(86_400));
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(var)) if var == "DATABASE_URL"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/journal"),
            ("SUMMARY_SCHEDULER_INTERVAL_SECS", "0"),
        ]);

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue(var, _)) if var == "SUMMARY_SCHEDULER_INTERVAL_SECS"
        ));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/journal"),
            ("OPENAI_API_KEY", "  "),
            ("MAIL_API_URL", "https://mail.example.com/send"),
        ])
        .unwrap();

        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.mail_api_url.as_deref(), Some("https://mail.example.com/send"));
    }
}
