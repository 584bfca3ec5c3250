//! Application configuration loaded from environment variables.
//!
//! The configuration is read once per run and handed to the client
//! constructors explicitly.

use std::env;
use std::time::Duration;

/// Default spacing between Notion API requests.
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_millis(350);

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Strava ---
    /// Strava OAuth client ID
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Long-lived refresh token produced by `strava2notion auth`
    pub strava_refresh_token: Option<String>,

    // --- Notion ---
    /// Notion integration token
    pub notion_token: String,
    /// Target database ID
    pub notion_database_id: String,

    // --- Sync ---
    /// Minimum spacing between Notion API requests
    pub rate_limit_delay: Duration,
}

impl Config {
    /// Config with placeholder values, for tests.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_refresh_token: Some("test_refresh_token".to_string()),
            notion_token: "test_notion_token".to_string(),
            notion_database_id: "test-database".to_string(),
            rate_limit_delay: Duration::ZERO,
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            strava_client_id: required("CLIENT_ID")?,
            strava_client_secret: required("CLIENT_SECRET")?,
            strava_refresh_token: env::var("STRAVA_REFRESH_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            notion_token: required("TOKEN_V3")?,
            notion_database_id: required("DATABASE_ID")?,
            rate_limit_delay: match env::var("RATE_LIMIT_DELAY") {
                Ok(raw) => parse_delay(&raw).ok_or(ConfigError::Invalid {
                    name: "RATE_LIMIT_DELAY",
                    value: raw,
                })?,
                Err(_) => DEFAULT_RATE_LIMIT_DELAY,
            },
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Parse a delay given in (fractional) seconds.
fn parse_delay(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("CLIENT_ID", "test_id");
        env::set_var("CLIENT_SECRET", " test_secret\n");
        env::set_var("TOKEN_V3", "secret_notion");
        env::set_var("DATABASE_ID", "db123");
        env::set_var("STRAVA_REFRESH_TOKEN", "");
        env::set_var("RATE_LIMIT_DELAY", "0.5");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.strava_client_id, "test_id");
        assert_eq!(config.strava_client_secret, "test_secret");
        assert_eq!(config.notion_database_id, "db123");
        assert!(config.strava_refresh_token.is_none());
        assert_eq!(config.rate_limit_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_parse_delay() {
        assert_eq!(parse_delay("0.25"), Some(Duration::from_millis(250)));
        assert_eq!(parse_delay(" 2 "), Some(Duration::from_secs(2)));
        assert_eq!(parse_delay("-1"), None);
        assert_eq!(parse_delay("fast"), None);
    }
}
