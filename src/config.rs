use std::{fmt::Display, str::FromStr, time::Duration};

use anyhow::Context;
use tracing::{info, warn};

pub const PERSPECTIVE_URL: &str = "https://commentanalyzer.googleapis.com/v1alpha1/comments:analyze";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub moderation_api_key: Option<String>,
    pub moderation_url: String,
    pub moderation_threshold: f64,
    pub moderation_timeout: Duration,
    pub moderation_fail_open: bool,
    pub session_inactivity: time::Duration,
    pub secure_cookies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_owned(),
            database_url: "sqlite://roomboard.db".to_owned(),
            moderation_api_key: None,
            moderation_url: PERSPECTIVE_URL.to_owned(),
            moderation_threshold: 0.5,
            moderation_timeout: Duration::from_secs(10),
            moderation_fail_open: false,
            session_inactivity: time::Duration::minutes(60),
            secure_cookies: false,
        }
    }
}

impl Config {
    /// Reads the environment (and `.env`, when present) over the defaults.
    pub fn load() -> anyhow::Result<Self> {
        if dotenv::dotenv().is_err() {
            info!("no .env file, reading the process environment only");
        }

        let defaults = Config::default();
        let config = Self {
            bind_addr: try_load("BIND_ADDR", defaults.bind_addr)?,
            database_url: try_load("DATABASE_URL", defaults.database_url)?,
            moderation_api_key: var("MODERATION_API_KEY").filter(|key| !key.is_empty()),
            moderation_url: try_load("MODERATION_URL", defaults.moderation_url)?,
            moderation_threshold: try_load("MODERATION_THRESHOLD", defaults.moderation_threshold)?,
            moderation_timeout: Duration::from_secs(try_load("MODERATION_TIMEOUT_SECS", 10u64)?),
            moderation_fail_open: try_load("MODERATION_FAIL_OPEN", defaults.moderation_fail_open)?,
            session_inactivity: time::Duration::minutes(try_load("SESSION_INACTIVITY_MINUTES", 60i64)?),
            secure_cookies: try_load("SECURE_COOKIES", defaults.secure_cookies)?,
        };

        if !(0.0..=1.0).contains(&config.moderation_threshold) {
            anyhow::bail!("MODERATION_THRESHOLD must be within [0, 1], got {}", config.moderation_threshold);
        }
        if config.moderation_api_key.is_none() {
            warn!(
                "MODERATION_API_KEY not set, messages will be {}",
                if config.moderation_fail_open { "posted unscreened" } else { "rejected" }
            );
        }

        Ok(config)
    }
}

fn var(key: &str) -> Option<String> {
    dotenv::var(key).ok()
}

fn try_load<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid {key} value: {value:?}")),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_policy() {
        let config = Config::default();
        assert_eq!(config.moderation_threshold, 0.5);
        assert!(!config.moderation_fail_open);
        assert!(config.moderation_api_key.is_none());
        assert_eq!(config.moderation_url, PERSPECTIVE_URL);
    }

    #[test]
    fn unset_keys_fall_back_to_defaults() {
        let threshold: f64 = try_load("ROOMBOARD_TEST_UNSET_THRESHOLD", 0.25).unwrap();
        assert_eq!(threshold, 0.25);
    }
}
