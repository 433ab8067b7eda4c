use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// Line layout for request and startup logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    /// Includes span fields and targets; handy when tracing a single request.
    Full,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown log format {0:?}, expected compact or full")]
pub struct UnknownLogFormat(pub String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "full" => Ok(LogFormat::Full),
            _ => Err(UnknownLogFormat(s.to_string())),
        }
    }
}

/// Checks a filter directive such as `info` or `score_search=debug,tower_http=warn`.
pub fn check_filter(directives: &str) -> Result<(), String> {
    EnvFilter::try_new(directives).map(|_| ()).map_err(|e| e.to_string())
}

pub fn init(default_level: &str, format: LogFormat) {
    // RUST_LOG wins over SCORE_LOG
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(env_filter);
    match format {
        LogFormat::Compact => builder.with_target(false).compact().init(),
        LogFormat::Full => builder.with_target(true).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_known_names() {
        assert_eq!(" Full ".parse::<LogFormat>(), Ok(LogFormat::Full));
        assert_eq!("compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert_eq!("json".parse::<LogFormat>(), Err(UnknownLogFormat("json".into())));
    }

    #[test]
    fn filter_directives_are_checked() {
        assert!(check_filter("info").is_ok());
        assert!(check_filter("score_search=debug,tower_http=warn").is_ok());
        assert!(check_filter("score_search=loud").is_err());
    }
}
