//! Log output configuration.

use crate::config::{LoggingSettings, process_env, string_var};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Filter used when neither config nor environment supplies one.
const DEFAULT_FILTER: &str = "tally=info,tower_http=info";

/// Filter used with `--verbose`.
const VERBOSE_FILTER: &str = "tally=debug,tower_http=debug";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses `pretty` / `json`; anything else is `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Filter directive in `EnvFilter` syntax.
    pub filter: String,
    /// Append to this file instead of writing to stderr.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds logging configuration from config settings with env overrides.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        Self::from_settings_with(settings, verbose, &process_env)
    }

    /// Like [`from_settings`](Self::from_settings), reading the environment
    /// through `lookup`.
    ///
    /// Precedence for the filter: `TALLY_LOG`, `RUST_LOG`, `--verbose`,
    /// the config file, then the default.
    pub(crate) fn from_settings_with(
        settings: Option<&LoggingSettings>,
        verbose: bool,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Self {
        let format = string_var(lookup, "TALLY_LOG_FORMAT")
            .or_else(|| settings.and_then(|s| s.format.clone()))
            .and_then(|value| LogFormat::parse(&value))
            .unwrap_or_default();

        let configured = settings.and_then(|s| s.filter.clone());
        let filter = string_var(lookup, "TALLY_LOG")
            .or_else(|| string_var(lookup, "RUST_LOG"))
            .or_else(|| verbose.then(|| VERBOSE_FILTER.to_string()))
            .or(configured)
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());

        let file = string_var(lookup, "TALLY_LOG_FILE")
            .or_else(|| settings.and_then(|s| s.file.clone()))
            .map(PathBuf::from);

        Self {
            format,
            filter,
            file,
        }
    }

    /// Builds the `EnvFilter`, falling back to the default on a bad directive.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: DEFAULT_FILTER.to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::from_settings_with(None, false, &lookup_from(&[]));
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.filter, DEFAULT_FILTER);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_verbose_beats_config_but_not_env() {
        let settings = LoggingSettings {
            format: Some("json".to_string()),
            filter: Some("tally=warn".to_string()),
            file: None,
        };

        let config = LoggingConfig::from_settings_with(Some(&settings), true, &lookup_from(&[]));
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, VERBOSE_FILTER);

        let config = LoggingConfig::from_settings_with(
            Some(&settings),
            true,
            &lookup_from(&[("RUST_LOG", "tally=trace")]),
        );
        assert_eq!(config.filter, "tally=trace");
    }

    #[test]
    fn test_bad_directive_falls_back() {
        let config = LoggingConfig {
            filter: "tally=[[[".to_string(),
            ..LoggingConfig::default()
        };
        let _filter = config.env_filter();
    }
}
