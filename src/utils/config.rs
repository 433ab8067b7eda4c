use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::utils::logging::{check_filter, LogFormat, UnknownLogFormat};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not a valid socket address: {value}")]
    InvalidAddr { name: &'static str, value: String },
    #[error("{name} is not a positive integer: {value}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("SCORE_LOG is not a valid filter ({reason}): {value}")]
    InvalidLogFilter { value: String, reason: String },
    #[error("SCORE_LOG_FORMAT: {0}")]
    InvalidLogFormat(#[from] UnknownLogFormat),
}

/// Runtime settings, read once from the environment at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub web_dir: PathBuf,
    pub seed_file: Option<PathBuf>,
    /// Row cap for the recent observations page.
    pub recent_limit: usize,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            db_path: PathBuf::from("data/db/observations.sqlite"),
            web_dir: PathBuf::from("web"),
            seed_file: None,
            recent_limit: 500,
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut cfg = Config::default();

        if let Some(value) = get("SCORE_BIND") {
            cfg.bind = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidAddr { name: "SCORE_BIND", value })?;
        }
        if let Some(value) = get("SCORE_DB_PATH") {
            cfg.db_path = PathBuf::from(value);
        }
        if let Some(value) = get("SCORE_WEB_DIR") {
            cfg.web_dir = PathBuf::from(value);
        }
        cfg.seed_file = get("SCORE_SEED_FILE").map(PathBuf::from);
        if let Some(value) = get("SCORE_RECENT_LIMIT") {
            cfg.recent_limit = match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidNumber { name: "SCORE_RECENT_LIMIT", value }),
            };
        }
        if let Some(value) = get("SCORE_LOG") {
            if let Err(reason) = check_filter(&value) {
                return Err(ConfigError::InvalidLogFilter { value, reason });
            }
            cfg.log_level = value;
        }
        if let Some(value) = get("SCORE_LOG_FORMAT") {
            cfg.log_format = value.parse()?;
        }
        Ok(cfg)
    }
}
