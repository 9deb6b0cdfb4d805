//! Process-level settings read from the environment.
//!
//! Everything that shapes request handling is configured in code, at
//! construction time. The environment only answers two questions: which mode
//! the process runs in (access logs are silenced under `test`), and how the
//! crate's own diagnostics should be rendered.

use std::fmt;
use std::str::FromStr;

/// Variable holding the environment mode.
pub const ENV_VAR: &str = "APP_ENV";

/// Variable selecting the diagnostics format (`pretty` or `json`).
pub const LOG_FORMAT_VAR: &str = "LOG_FORMAT";

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// The mode the process runs in.
///
/// Absent or empty `APP_ENV` means [`Environment::Development`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
    Other(String),
}

impl Environment {
    /// Reads the mode from `APP_ENV` at call time.
    pub fn current() -> Self {
        std::env::var(ENV_VAR)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Self::Test)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
            Self::Other(name) => name,
        }
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    /// Exact, case-sensitive names; anything else is kept as `Other`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "" | "development" => Self::Development,
            "test" => Self::Test,
            "production" => Self::Production,
            other => Self::Other(other.to_owned()),
        })
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format for the crate's own `tracing` diagnostics.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LogFormat {
    /// Human-readable, colored.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

/// Settings gathered from the environment in one place.
#[derive(Clone, Debug)]
pub struct Settings {
    pub environment: Environment,
    pub log_format: LogFormat,
    /// `EnvFilter` directive, from `RUST_LOG`.
    pub log_filter: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            environment: Environment::current(),
            log_format: std::env::var(LOG_FORMAT_VAR)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_FILTER.to_owned()),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            log_format: LogFormat::default(),
            log_filter: DEFAULT_FILTER.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_mode_is_development() {
        assert_eq!("".parse::<Environment>().unwrap(), Environment::Development);
    }

    #[test]
    fn only_exact_test_is_test() {
        assert!("test".parse::<Environment>().unwrap().is_test());
        assert!(!"TEST".parse::<Environment>().unwrap().is_test());
        assert!(!"testing".parse::<Environment>().unwrap().is_test());
    }

    #[test]
    fn unknown_modes_are_kept() {
        let env: Environment = "staging".parse().unwrap();
        assert_eq!(env, Environment::Other("staging".into()));
        assert_eq!(env.to_string(), "staging");
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
