// src/config.rs

use std::{env, fmt};

/// Default token lifetime: 7 days.
const DEFAULT_JWT_EXPIRATION: u64 = 7 * 24 * 60 * 60;
const DEFAULT_SUBMIT_GRACE_SECONDS: i64 = 30;
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Identity token lifetime in seconds.
    pub jwt_expiration: u64,
    /// Extra seconds accepted after a timed attempt's deadline (network latency, clock skew).
    pub submit_grace_seconds: i64,
    pub port: u16,
    pub rust_log: String,
    pub cors_origins: Vec<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid(key, value) => write!(f, "{} has an invalid value: {}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Reads the configuration from the process environment.
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honored.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let jwt_expiration = parsed("JWT_EXPIRATION", DEFAULT_JWT_EXPIRATION)?;
        let submit_grace_seconds = parsed("SUBMIT_GRACE_SECONDS", DEFAULT_SUBMIT_GRACE_SECONDS)?;
        let port = parsed("PORT", DEFAULT_PORT)?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            submit_grace_seconds,
            port,
            rust_log,
            cors_origins,
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        Err(_) => Ok(default),
    }
}
