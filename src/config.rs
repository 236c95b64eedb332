//! Process configuration read from the environment.

use std::path::PathBuf;

use crate::password::{Argon2Hasher, HashParams};
use crate::rate_limit::RateLimitConfig;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Snapshot directory for the in-memory backend. `None` keeps it ephemeral.
    pub data_dir: Option<PathBuf>,
    pub database_url: Option<String>,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
    pub enable_hsts: bool,
    pub hash: HashParams,
    pub rate_limit: RateLimitConfig,
}

fn nonempty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match nonempty_env(name) {
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid { name, reason: e.to_string() }),
        None => Ok(default),
    }
}

fn flag_env(name: &str) -> bool {
    nonempty_env(name).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = HashParams::default();
        let cfg = Self {
            bind_addr: nonempty_env("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed_env("PORT", 8080)?,
            data_dir: nonempty_env("BOARD_DATA_DIR").map(PathBuf::from),
            database_url: nonempty_env("DATABASE_URL"),
            cors_origins: nonempty_env("CORS_ORIGINS")
                .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
                .unwrap_or_default(),
            enable_hsts: flag_env("ENABLE_HSTS"),
            hash: HashParams {
                memory_kib: parsed_env("ARGON2_MEMORY_KIB", defaults.memory_kib)?,
                iterations: parsed_env("ARGON2_ITERATIONS", defaults.iterations)?,
                parallelism: parsed_env("ARGON2_PARALLELISM", defaults.parallelism)?,
            },
            rate_limit: RateLimitConfig::from_env(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Argon2Hasher::new(self.hash).map_err(|e| ConfigError::Invalid { name: "ARGON2_*", reason: e.to_string() })?;
        if cfg!(feature = "postgres-store") && self.database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        Ok(())
    }
}
