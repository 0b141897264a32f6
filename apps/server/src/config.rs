//! Application configuration.

use poolwatch_feeds::{ClientConfig, DEFAULT_PAIRS_API_URL, DEFAULT_POOLS_API_URL};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://poolwatch.db";

/// Startup configuration errors. All of them are fatal.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Settings that come from the command line rather than the environment.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Background poll interval; zero disables the loop.
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub database_url: Option<String>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
            database_url: None,
        }
    }
}

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Telegram bot token
    pub bot_token: String,
    /// Chat checked by the background poll loop
    pub chat_id: i64,
    pub database_url: String,
    pub client: ClientConfig,
    pub poll_interval: Duration,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("database_url", &self.database_url)
            .field("client", &self.client)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl AppConfig {
    /// Build from process environment variables.
    /// Requires BOT_TOKEN and CHAT_ID.
    pub fn from_env(runtime: RuntimeSettings) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), runtime)
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F, runtime: RuntimeSettings) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = var("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let raw_chat_id = var("CHAT_ID").ok_or(ConfigError::Missing("CHAT_ID"))?;
        let chat_id = raw_chat_id
            .parse::<i64>()
            .map_err(|_| ConfigError::Invalid {
                var: "CHAT_ID",
                value: raw_chat_id.clone(),
            })?;

        let database_url = runtime
            .database_url
            .or_else(|| var("DATABASE_URL"))
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let client = ClientConfig {
            pools_api_url: var("POOLS_API_URL").unwrap_or_else(|| DEFAULT_POOLS_API_URL.to_string()),
            pairs_api_url: var("PAIRS_API_URL").unwrap_or_else(|| DEFAULT_PAIRS_API_URL.to_string()),
            request_timeout: runtime.request_timeout,
        };

        Ok(Self {
            bot_token,
            chat_id,
            database_url,
            client,
            poll_interval: runtime.poll_interval,
        })
    }

    /// Whether the background poll loop should run.
    pub fn polling_enabled(&self) -> bool {
        !self.poll_interval.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_minimal_config() {
        let config = AppConfig::from_lookup(
            lookup(&[("BOT_TOKEN", "123:abc"), ("CHAT_ID", "-100200300")]),
            RuntimeSettings::default(),
        )
        .unwrap();

        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.chat_id, -100200300);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.client.pools_api_url, DEFAULT_POOLS_API_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert!(config.polling_enabled());
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let err = AppConfig::from_lookup(lookup(&[("CHAT_ID", "1")]), RuntimeSettings::default())
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("BOT_TOKEN"));

        let err = AppConfig::from_lookup(
            lookup(&[("BOT_TOKEN", "  "), ("CHAT_ID", "1")]),
            RuntimeSettings::default(),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("BOT_TOKEN"));
    }

    #[test]
    fn test_missing_or_bad_chat_id_is_fatal() {
        let err = AppConfig::from_lookup(lookup(&[("BOT_TOKEN", "t")]), RuntimeSettings::default())
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("CHAT_ID"));

        let err = AppConfig::from_lookup(
            lookup(&[("BOT_TOKEN", "t"), ("CHAT_ID", "@channel")]),
            RuntimeSettings::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "CHAT_ID",
                value: "@channel".to_string()
            }
        );
    }

    #[test]
    fn test_overrides() {
        let runtime = RuntimeSettings {
            poll_interval: Duration::ZERO,
            request_timeout: Duration::from_secs(3),
            database_url: Some("sqlite::memory:".to_string()),
        };
        let config = AppConfig::from_lookup(
            lookup(&[
                ("BOT_TOKEN", "t"),
                ("CHAT_ID", "7"),
                ("DATABASE_URL", "sqlite://ignored.db"),
                ("POOLS_API_URL", "http://localhost:8080"),
            ]),
            runtime,
        )
        .unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.client.pools_api_url, "http://localhost:8080");
        assert_eq!(config.client.request_timeout, Duration::from_secs(3));
        assert!(!config.polling_enabled());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = AppConfig::from_lookup(
            lookup(&[("BOT_TOKEN", "secret-token"), ("CHAT_ID", "1")]),
            RuntimeSettings::default(),
        )
        .unwrap();
        assert!(!format!("{:?}", config).contains("secret-token"));
    }
}
