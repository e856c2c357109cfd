//! Prometheus metrics.
//!
//! Series recorded by tally:
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `tally_ids_accepted_total` | counter | |
//! | `tally_ids_duplicate_total` | counter | |
//! | `tally_ids_failed_total` | counter | |
//! | `tally_window_drains_total` | counter | |
//! | `tally_window_unique_count` | gauge | |
//! | `tally_drain_duration_ms` | histogram | |
//! | `tally_publish_total` | counter | `emitter`, `status` |
//! | `tally_ticks_skipped_total` | counter | |

use crate::config::{MetricsSettings, bool_var, parsed_var, process_env};
use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const DEFAULT_METRICS_PORT: u16 = 9090;

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,
    /// Address of the scrape endpoint.
    pub listen_addr: SocketAddr,
}

impl MetricsConfig {
    /// Builds metrics configuration from config settings with env overrides.
    #[must_use]
    pub fn from_settings(settings: Option<&MetricsSettings>) -> Self {
        Self::from_settings_with(settings, &process_env)
    }

    pub(crate) fn from_settings_with(
        settings: Option<&MetricsSettings>,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Self {
        let enabled = bool_var(lookup, "TALLY_METRICS_ENABLED")
            .or_else(|| settings.and_then(|s| s.enabled))
            .unwrap_or(false);
        let port = parsed_var(lookup, "TALLY_METRICS_PORT")
            .or_else(|| settings.and_then(|s| s.port))
            .unwrap_or(DEFAULT_METRICS_PORT);

        Self {
            enabled,
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        }
    }
}

/// Installs the Prometheus recorder, optionally with an HTTP listener.
///
/// The listener is spawned on the current tokio runtime.
///
/// # Errors
///
/// Returns an error if a recorder is already installed, or if `expose` is
/// set outside a tokio runtime.
pub fn install_prometheus(config: &MetricsConfig, expose: bool) -> Result<Option<PrometheusHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    let builder = PrometheusBuilder::new();
    if !expose {
        let recorder = builder.build_recorder();
        let handle = recorder.handle();
        set_global_recorder(recorder)?;
        return Ok(Some(handle));
    }

    let runtime = tokio::runtime::Handle::try_current().map_err(|e| Error::OperationFailed {
        operation: "metrics_listener".to_string(),
        cause: e.to_string(),
    })?;
    let (recorder, exporter) = {
        let _guard = runtime.enter();
        builder
            .with_http_listener(config.listen_addr)
            .build()
            .map_err(|e| Error::OperationFailed {
                operation: "metrics_exporter_build".to_string(),
                cause: e.to_string(),
            })?
    };
    let handle = recorder.handle();
    set_global_recorder(recorder)?;
    runtime.spawn(exporter);

    tracing::info!(addr = %config.listen_addr, "Prometheus metrics listener started");
    Ok(Some(handle))
}

fn set_global_recorder(recorder: metrics_exporter_prometheus::PrometheusRecorder) -> Result<()> {
    metrics::set_global_recorder(recorder).map_err(|e| Error::OperationFailed {
        operation: "metrics_recorder_install".to_string(),
        cause: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_disabled_by_default() {
        let config = MetricsConfig::from_settings_with(None, &|_: &str| None);
        assert!(!config.enabled);
        assert_eq!(config.listen_addr.port(), 9090);
        assert!(install_prometheus(&config, true).unwrap().is_none());
    }

    #[test]
    fn test_env_overrides_settings() {
        let settings = MetricsSettings {
            enabled: Some(false),
            port: Some(9100),
        };
        let env: HashMap<&str, &str> =
            HashMap::from([("TALLY_METRICS_ENABLED", "true"), ("TALLY_METRICS_PORT", "9200")]);
        let lookup = |key: &str| env.get(key).map(|v| (*v).to_string());

        let config = MetricsConfig::from_settings_with(Some(&settings), &lookup);
        assert!(config.enabled);
        assert_eq!(config.listen_addr.port(), 9200);
    }

    #[test]
    fn test_recorder_renders_tally_series() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("tally_window_drains_total").increment(1);
        });

        assert!(handle.render().contains("tally_window_drains_total"));
    }
}
