//! Observability and telemetry.
//!
//! [`init_from_config`] installs, once per process:
//!
//! - a `tracing` subscriber writing pretty or JSON lines to stderr or a file
//! - the Prometheus recorder, with a scrape listener when exposed
//! - an OTLP span exporter when a collector endpoint is configured

mod logging;
mod metrics;
mod request_context;
mod tracing;

pub use self::logging::{LogFormat, LoggingConfig};
pub use self::metrics::{MetricsConfig, install_prometheus};
pub use self::tracing::{OtlpProtocol, TracingConfig, TracingInit, build_tracing};
pub use request_context::{
    REQUEST_ID_HEADER, RequestContext, RequestContextGuard, current_request_id,
    enter_request_context, scope_request_context, spawn_blocking_in_context,
};

use crate::config::ObservabilitySettings;
use crate::{Error, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Full observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Tracing configuration.
    pub tracing: TracingConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
    /// Whether to expose metrics via HTTP listener.
    pub metrics_expose: bool,
}

/// Options supplied by the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    /// Whether `--verbose` was given.
    pub verbose: bool,
    /// Whether to start the metrics scrape listener.
    pub metrics_expose: bool,
}

/// Keeps telemetry components alive; flushes them on shutdown.
pub struct ObservabilityHandle {
    tracer_provider: Option<SdkTracerProvider>,
    metrics_handle: Option<PrometheusHandle>,
}

static OBSERVABILITY_INIT: OnceLock<()> = OnceLock::new();

impl ObservabilityHandle {
    /// The Prometheus handle, when metrics are enabled.
    #[must_use]
    pub const fn metrics_handle(&self) -> Option<&PrometheusHandle> {
        self.metrics_handle.as_ref()
    }

    /// Flushes and shuts down the span exporter.
    pub fn shutdown(&mut self) {
        let Some(provider) = self.tracer_provider.take() else {
            return;
        };

        let flush = move || {
            let _ = provider.force_flush();
            let _ = provider.shutdown();
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle)
                if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread =>
            {
                tokio::task::block_in_place(flush);
            },
            _ => flush(),
        }
    }
}

impl Drop for ObservabilityHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Builds the observability configuration from settings and the environment.
#[must_use]
pub fn build_config(settings: &ObservabilitySettings, options: InitOptions) -> ObservabilityConfig {
    ObservabilityConfig {
        logging: LoggingConfig::from_settings(settings.logging.as_ref(), options.verbose),
        tracing: TracingConfig::from_settings(settings.tracing.as_ref()),
        metrics: MetricsConfig::from_settings(settings.metrics.as_ref()),
        metrics_expose: options.metrics_expose,
    }
}

/// Initializes observability from config settings with env overrides.
///
/// # Errors
///
/// Returns an error if observability has already been initialized or if any
/// component fails to initialize.
pub fn init_from_config(
    settings: &ObservabilitySettings,
    options: InitOptions,
) -> Result<ObservabilityHandle> {
    init(build_config(settings, options))
}

/// Initializes logging, tracing, and metrics for the process.
///
/// # Errors
///
/// Returns an error if observability has already been initialized or if any
/// component fails to initialize.
pub fn init(config: ObservabilityConfig) -> Result<ObservabilityHandle> {
    if OBSERVABILITY_INIT.get().is_some() {
        return Err(Error::OperationFailed {
            operation: "observability_init".to_string(),
            cause: "observability already initialized".to_string(),
        });
    }

    let (otel_layer, tracer_provider) = match build_tracing(&config.tracing)? {
        Some(init) => (Some(init.layer), Some(init.provider)),
        None => (None, None),
    };

    let filter = config.logging.env_filter();
    let registry = tracing_subscriber::registry().with(otel_layer);

    match (&config.logging.file, config.logging.format) {
        (Some(path), LogFormat::Json) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(open_log_file(path)?)
                    .with_current_span(true)
                    .with_target(true),
            )
            .with(filter)
            .try_init(),
        (Some(path), LogFormat::Pretty) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(open_log_file(path)?)
                    .with_ansi(false)
                    .with_target(true),
            )
            .with(filter)
            .try_init(),
        (None, LogFormat::Json) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(true)
                    .with_target(true),
            )
            .with(filter)
            .try_init(),
        (None, LogFormat::Pretty) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .try_init(),
    }
    .map_err(|e| Error::OperationFailed {
        operation: "observability_init".to_string(),
        cause: e.to_string(),
    })?;

    let metrics_handle = install_prometheus(&config.metrics, config.metrics_expose)?;

    let _ = OBSERVABILITY_INIT.set(());

    Ok(ObservabilityHandle {
        tracer_provider,
        metrics_handle,
    })
}

/// Thread-safe appending file writer.
#[derive(Clone)]
struct LogFileWriter {
    file: Arc<Mutex<File>>,
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Opens a log file for appending, creating parent directories.
fn open_log_file(path: &Path) -> Result<LogFileWriter> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_log_dir".to_string(),
            cause: e.to_string(),
        })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::OperationFailed {
            operation: "open_log_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

    Ok(LogFileWriter {
        file: Arc::new(Mutex::new(file)),
    })
}
