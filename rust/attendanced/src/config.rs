use std::path::PathBuf;

use crate::logging::LogFormat;

pub const ENV_WORKSPACE: &str = "ATTENDANCED_WORKSPACE";
pub const ENV_LOG: &str = "ATTENDANCED_LOG";
pub const ENV_LOG_FORMAT: &str = "ATTENDANCED_LOG_FORMAT";

/// Process settings read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Workspace opened before the first request, if any.
    pub workspace: Option<PathBuf>,
    /// `EnvFilter` directive, e.g. `info` or `attendanced=debug`.
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workspace: None,
            log_filter: "info".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Config::default();
        Config {
            workspace: get(ENV_WORKSPACE).map(PathBuf::from),
            log_filter: get(ENV_LOG).unwrap_or(defaults.log_filter),
            log_format: get(ENV_LOG_FORMAT)
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
        }
    }
}
