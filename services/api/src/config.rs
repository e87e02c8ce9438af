//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use problem_dojo_core::{DrainSettings, DEFAULT_CAPACITY};
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
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
    pub session_ttl_days: i64,
    pub problems_url: String,
    pub problem_models_url: String,
    pub submissions_url: String,
    pub http_timeout: Duration,
    pub drain: DrainSettings,
    /// Problem boards kept in memory before the least recently used are dropped.
    pub max_boards: usize,
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
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Load Server and Database Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:5173");
        let session_ttl_days = parse_number(&lookup, "SESSION_TTL_DAYS", 30)?;

        // --- Load Public Problem API Settings ---
        let problems_url = var_or(
            "PROBLEMS_URL",
            "https://kenkoooo.com/atcoder/resources/merged-problems.json",
        );
        let problem_models_url = var_or(
            "PROBLEM_MODELS_URL",
            "https://kenkoooo.com/atcoder/resources/problem-models.json",
        );
        let submissions_url = var_or(
            "SUBMISSIONS_URL",
            "https://kenkoooo.com/atcoder/atcoder-api/v3/user/submissions",
        );
        let http_timeout = Duration::from_secs(parse_number(&lookup, "HTTP_TIMEOUT_SECS", 30)?);

        // --- Load Submission Drain Settings ---
        let page_delay =
            Duration::from_millis(parse_number(&lookup, "SUBMISSION_PAGE_DELAY_MS", 500)?);
        let max_pages = parse_number(&lookup, "SUBMISSION_MAX_PAGES", 1_000)?;
        let timeout = match parse_number(&lookup, "MERGE_TIMEOUT_SECS", 600)? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let max_boards = parse_number(&lookup, "MAX_BOARDS", DEFAULT_CAPACITY)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            session_ttl_days,
            problems_url,
            problem_models_url,
            submissions_url,
            http_timeout,
            drain: DrainSettings {
                page_delay,
                max_pages,
                timeout,
            },
            max_boards,
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
