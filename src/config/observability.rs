//! Observability settings as read from the config file.
//!
//! Every field is optional; the observability module applies defaults and
//! environment overrides on top.

use serde::{Deserialize, Serialize};

/// `[observability]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ObservabilitySettings {
    /// Logging settings.
    pub logging: Option<LoggingSettings>,
    /// Prometheus metrics settings.
    pub metrics: Option<MetricsSettings>,
    /// OTLP tracing settings.
    pub tracing: Option<TracingSettings>,
}

/// `[observability.logging]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Output format: `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive, e.g. `tally=debug,tower_http=info`.
    pub filter: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<String>,
}

/// `[observability.metrics]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsSettings {
    /// Whether to install the Prometheus recorder.
    pub enabled: Option<bool>,
    /// Port for the scrape endpoint.
    pub port: Option<u16>,
}

/// `[observability.tracing]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TracingSettings {
    /// Whether to export spans.
    pub enabled: Option<bool>,
    /// OTLP collector endpoint.
    pub endpoint: Option<String>,
    /// `grpc` or `http`.
    pub protocol: Option<String>,
    /// Trace sample ratio in `[0.0, 1.0]`.
    pub sample_ratio: Option<f64>,
    /// Service name reported to the collector.
    pub service_name: Option<String>,
}
