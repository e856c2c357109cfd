//! Configuration management.
//!
//! Configuration is assembled from, in increasing precedence:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, `TALLY_CONFIG_PATH`, or
//!    `<config dir>/tally/config.toml`)
//! 3. `TALLY_*` environment variables
//! 4. CLI flags (applied by the binary)
//!
//! ```toml
//! [window]
//! interval_ms = 60000
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [store]
//! backend = "redis"
//! redis_url = "redis://localhost:6379"
//! key = "tally:unique_ids"
//! timeout_ms = 250
//!
//! [emitter]
//! backend = "webhook"
//! topic = "unique-counts"
//! webhook_url = "https://collector.example.com/counts"
//! timeout_ms = 5000
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `TALLY_WINDOW_MS` | `window.interval_ms` |
//! | `TALLY_HOST` / `TALLY_PORT` | `server.host` / `server.port` |
//! | `TALLY_STORE` | `store.backend` (`memory`, `redis`) |
//! | `TALLY_REDIS_URL` / `TALLY_REDIS_KEY` | `store.redis_url` / `store.key` |
//! | `TALLY_EMITTER` | `emitter.backend` (`log`, `broadcast`, `webhook`, `redis`) |
//! | `TALLY_TOPIC` | `emitter.topic` |
//! | `TALLY_WEBHOOK_URL` / `TALLY_WEBHOOK_TOKEN` | `emitter.webhook_url` / `emitter.webhook_token` |

mod env;
mod observability;

pub use observability::{LoggingSettings, MetricsSettings, ObservabilitySettings, TracingSettings};

pub(crate) use env::{bool_var, parsed_var, process_env, required_parse, string_var};

use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Default topic for emitted counts.
pub const DEFAULT_TOPIC: &str = "unique-counts";

/// Main configuration for tally.
#[derive(Debug, Clone)]
pub struct TallyConfig {
    /// Window length between drains.
    pub window_interval: Duration,
    /// HTTP ingestion server.
    pub server: ServerConfig,
    /// Dedup set storage.
    pub store: StoreConfig,
    /// Downstream emitter.
    pub emitter: EmitterConfig,
    /// Logging, metrics and tracing.
    pub observability: ObservabilitySettings,
}

/// HTTP ingestion server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

/// Window store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Which backend holds the open window.
    pub backend: StoreBackend,
    /// Redis connection URL.
    pub redis_url: String,
    /// Redis key of the open window.
    pub key: String,
    /// Per-command timeout for the store.
    pub timeout: Duration,
}

/// Emitter configuration.
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Which transport publishes counts.
    pub backend: EmitterBackend,
    /// Topic (or channel) the counts are published to.
    pub topic: String,
    /// Destination for the webhook emitter.
    pub webhook_url: Option<String>,
    /// Bearer token for the webhook emitter.
    pub webhook_token: Option<SecretString>,
    /// Per-publish timeout.
    pub timeout: Duration,
}

/// Available window store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// In-process `HashSet`.
    #[default]
    Memory,
    /// Redis set.
    Redis,
}

impl StoreBackend {
    /// Returns the config name of the backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
        }
    }
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" | "inmemory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(Error::InvalidInput(format!("unknown store backend: {other}"))),
        }
    }
}

/// Available emitter backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitterBackend {
    /// Write the message to the log only.
    #[default]
    Log,
    /// In-process tokio broadcast channel.
    Broadcast,
    /// HTTP POST of a JSON payload.
    Webhook,
    /// Redis `PUBLISH` on the topic channel.
    Redis,
}

impl EmitterBackend {
    /// Returns the config name of the backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Broadcast => "broadcast",
            Self::Webhook => "webhook",
            Self::Redis => "redis",
        }
    }
}

impl FromStr for EmitterBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "broadcast" | "channel" => Ok(Self::Broadcast),
            "webhook" | "http" => Ok(Self::Webhook),
            "redis" => Ok(Self::Redis),
            other => Err(Error::InvalidInput(format!(
                "unknown emitter backend: {other}"
            ))),
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Window section.
    pub window: Option<ConfigFileWindow>,
    /// Server section.
    pub server: Option<ConfigFileServer>,
    /// Store section.
    pub store: Option<ConfigFileStore>,
    /// Emitter section.
    pub emitter: Option<ConfigFileEmitter>,
    /// Observability section.
    pub observability: Option<ObservabilitySettings>,
}

/// Window section in config file.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFileWindow {
    /// Window length in milliseconds.
    pub interval_ms: Option<u64>,
}

/// Server section in config file.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFileServer {
    /// Bind address.
    pub host: Option<String>,
    /// Bind port.
    pub port: Option<u16>,
}

/// Store section in config file.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFileStore {
    /// `memory` or `redis`.
    pub backend: Option<String>,
    /// Redis connection URL.
    pub redis_url: Option<String>,
    /// Redis key.
    pub key: Option<String>,
    /// Command timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// Emitter section in config file.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFileEmitter {
    /// `log`, `broadcast`, `webhook` or `redis`.
    pub backend: Option<String>,
    /// Topic name.
    pub topic: Option<String>,
    /// Webhook URL.
    pub webhook_url: Option<String>,
    /// Webhook bearer token.
    pub webhook_token: Option<String>,
    /// Publish timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            window_interval: DEFAULT_WINDOW,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                redis_url: "redis://localhost:6379".to_string(),
                key: "tally:unique_ids".to_string(),
                timeout: Duration::from_millis(250),
            },
            emitter: EmitterConfig {
                backend: EmitterBackend::Log,
                topic: DEFAULT_TOPIC.to_string(),
                webhook_url: None,
                webhook_token: None,
                timeout: Duration::from_secs(5),
            },
            observability: ObservabilitySettings::default(),
        }
    }
}

impl TallyConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from an explicit path, `TALLY_CONFIG_PATH`, or the
    /// default location, then applies environment overrides.
    ///
    /// The result is not validated; callers apply their own overrides first
    /// and then call [`validate`](Self::validate).
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be read or parsed,
    /// or if an environment override is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match string_var(&process_env, "TALLY_CONFIG_PATH") {
                Some(path) => Self::load_from_file(Path::new(&path))?,
                None => Self::load_default()?,
            },
        };

        config.apply_overrides(process_env)?;
        Ok(config)
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or names an unknown
    /// backend.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;

        Self::from_config_file(file)
    }

    /// Loads the config file from the platform config directory, if present.
    fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Converts a `ConfigFile` to `TallyConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(interval_ms) = file.window.and_then(|w| w.interval_ms) {
            config.window_interval = Duration::from_millis(interval_ms);
        }
        if let Some(server) = file.server {
            if let Some(host) = server.host {
                config.server.host = host;
            }
            if let Some(port) = server.port {
                config.server.port = port;
            }
        }
        if let Some(store) = file.store {
            if let Some(backend) = store.backend {
                config.store.backend = backend.parse()?;
            }
            if let Some(url) = store.redis_url {
                config.store.redis_url = url;
            }
            if let Some(key) = store.key {
                config.store.key = key;
            }
            if let Some(ms) = store.timeout_ms {
                config.store.timeout = Duration::from_millis(ms);
            }
        }
        if let Some(emitter) = file.emitter {
            if let Some(backend) = emitter.backend {
                config.emitter.backend = backend.parse()?;
            }
            if let Some(topic) = emitter.topic {
                config.emitter.topic = topic;
            }
            config.emitter.webhook_url = emitter.webhook_url;
            config.emitter.webhook_token = emitter.webhook_token.map(SecretString::from);
            if let Some(ms) = emitter.timeout_ms {
                config.emitter.timeout = Duration::from_millis(ms);
            }
        }
        if let Some(observability) = file.observability {
            config.observability = observability;
        }

        Ok(config)
    }

    /// Applies `TALLY_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if a numeric override does not parse or a
    /// backend override names an unknown backend.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(ms) = required_parse::<u64>(&lookup, "TALLY_WINDOW_MS")? {
            self.window_interval = Duration::from_millis(ms);
        }
        if let Some(host) = string_var(&lookup, "TALLY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = required_parse(&lookup, "TALLY_PORT")? {
            self.server.port = port;
        }
        if let Some(backend) = string_var(&lookup, "TALLY_STORE") {
            self.store.backend = backend.parse()?;
        }
        if let Some(url) = string_var(&lookup, "TALLY_REDIS_URL") {
            self.store.redis_url = url;
        }
        if let Some(key) = string_var(&lookup, "TALLY_REDIS_KEY") {
            self.store.key = key;
        }
        if let Some(backend) = string_var(&lookup, "TALLY_EMITTER") {
            self.emitter.backend = backend.parse()?;
        }
        if let Some(topic) = string_var(&lookup, "TALLY_TOPIC") {
            self.emitter.topic = topic;
        }
        if let Some(url) = string_var(&lookup, "TALLY_WEBHOOK_URL") {
            self.emitter.webhook_url = Some(url);
        }
        if let Some(token) = string_var(&lookup, "TALLY_WEBHOOK_TOKEN") {
            self.emitter.webhook_token = Some(SecretString::from(token));
        }
        Ok(())
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if:
    /// - the window interval is zero
    /// - the topic is empty
    /// - the webhook emitter is selected without a URL
    pub fn validate(&self) -> Result<()> {
        if self.window_interval.is_zero() {
            return Err(Error::InvalidInput(
                "window interval must be greater than zero".to_string(),
            ));
        }
        if self.emitter.topic.trim().is_empty() {
            return Err(Error::InvalidInput("emitter topic must not be empty".to_string()));
        }
        if self.emitter.backend == EmitterBackend::Webhook && self.emitter.webhook_url.is_none() {
            return Err(Error::InvalidInput(
                "webhook emitter requires emitter.webhook_url".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the window interval.
    #[must_use]
    pub const fn with_window_interval(mut self, interval: Duration) -> Self {
        self.window_interval = interval;
        self
    }

    /// Sets the HTTP port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// Renders the effective configuration as TOML, with secrets masked.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        let file = ConfigFile {
            window: Some(ConfigFileWindow {
                interval_ms: Some(duration_ms(self.window_interval)),
            }),
            server: Some(ConfigFileServer {
                host: Some(self.server.host.clone()),
                port: Some(self.server.port),
            }),
            store: Some(ConfigFileStore {
                backend: Some(self.store.backend.as_str().to_string()),
                redis_url: Some(self.store.redis_url.clone()),
                key: Some(self.store.key.clone()),
                timeout_ms: Some(duration_ms(self.store.timeout)),
            }),
            emitter: Some(ConfigFileEmitter {
                backend: Some(self.emitter.backend.as_str().to_string()),
                topic: Some(self.emitter.topic.clone()),
                webhook_url: self.emitter.webhook_url.clone(),
                webhook_token: self
                    .emitter
                    .webhook_token
                    .as_ref()
                    .map(|token| mask(token.expose_secret())),
                timeout_ms: Some(duration_ms(self.emitter.timeout)),
            }),
            observability: Some(self.observability.clone()),
        };

        toml::to_string_pretty(&file).map_err(|e| Error::OperationFailed {
            operation: "serialize_config".to_string(),
            cause: e.to_string(),
        })
    }
}

/// Returns `<platform config dir>/tally/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("tally").join("config.toml"))
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}
