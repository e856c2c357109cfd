//! OTLP trace export.
//!
//! Disabled unless an endpoint is configured. Spans from `#[instrument]`
//! and `tower_http::trace` are exported through a batch span processor.

use crate::config::{TracingSettings, bool_var, parsed_var, process_env, string_var};
use crate::{Error, Result};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::Registry;

const DEFAULT_TRACE_SAMPLE_RATIO: f64 = 1.0;

/// OTLP transport protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtlpProtocol {
    /// gRPC transport (4317 default).
    Grpc,
    /// HTTP/protobuf transport (4318 default).
    Http,
}

impl OtlpProtocol {
    /// Parses a protocol name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "grpc" => Some(Self::Grpc),
            "http" | "http/protobuf" | "http_binary" | "http-binary" => Some(Self::Http),
            _ => None,
        }
    }

    /// Guesses the protocol from the collector port.
    fn from_endpoint(endpoint: Option<&str>) -> Self {
        match endpoint {
            Some(endpoint) if endpoint.contains(":4317") => Self::Grpc,
            _ => Self::Http,
        }
    }
}

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Whether span export is enabled.
    pub enabled: bool,
    /// Collector endpoint URL.
    pub endpoint: Option<String>,
    /// Transport protocol.
    pub protocol: OtlpProtocol,
    /// Sample ratio for trace sampling (0.0 - 1.0).
    pub sample_ratio: f64,
    /// Service name reported to the collector.
    pub service_name: String,
}

impl TracingConfig {
    /// Builds tracing configuration from config settings with env overrides.
    #[must_use]
    pub fn from_settings(settings: Option<&TracingSettings>) -> Self {
        Self::from_settings_with(settings, &process_env)
    }

    pub(crate) fn from_settings_with(
        settings: Option<&TracingSettings>,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env_endpoint = string_var(lookup, "TALLY_OTLP_ENDPOINT")
            .or_else(|| string_var(lookup, "OTEL_EXPORTER_OTLP_ENDPOINT"));
        let endpoint = env_endpoint
            .clone()
            .or_else(|| settings.and_then(|s| s.endpoint.clone()));

        let protocol = string_var(lookup, "TALLY_OTLP_PROTOCOL")
            .or_else(|| string_var(lookup, "OTEL_EXPORTER_OTLP_PROTOCOL"))
            .or_else(|| settings.and_then(|s| s.protocol.clone()))
            .and_then(|value| OtlpProtocol::parse(&value))
            .unwrap_or_else(|| OtlpProtocol::from_endpoint(endpoint.as_deref()));

        let enabled = bool_var(lookup, "TALLY_TRACING_ENABLED")
            .or_else(|| env_endpoint.as_ref().map(|_| true))
            .or_else(|| settings.and_then(|s| s.enabled))
            .unwrap_or(endpoint.is_some());

        let sample_ratio = parsed_var::<f64>(lookup, "TALLY_TRACE_SAMPLE_RATIO")
            .or_else(|| parsed_var(lookup, "OTEL_TRACES_SAMPLER_ARG"))
            .or_else(|| settings.and_then(|s| s.sample_ratio))
            .unwrap_or(DEFAULT_TRACE_SAMPLE_RATIO)
            .clamp(0.0, 1.0);

        let service_name = string_var(lookup, "OTEL_SERVICE_NAME")
            .or_else(|| settings.and_then(|s| s.service_name.clone()))
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());

        Self {
            enabled,
            endpoint,
            protocol,
            sample_ratio,
            service_name,
        }
    }
}

/// Output of [`build_tracing`].
pub struct TracingInit {
    /// Layer bridging `tracing` spans to `OpenTelemetry`.
    pub layer: OpenTelemetryLayer<Registry, opentelemetry_sdk::trace::Tracer>,
    /// Provider kept for flushing on shutdown.
    pub provider: SdkTracerProvider,
}

/// Builds the `OpenTelemetry` layer, or `None` when tracing is disabled.
///
/// # Errors
///
/// Returns an error if tracing is enabled without an endpoint or the
/// exporter cannot be built.
pub fn build_tracing(config: &TracingConfig) -> Result<Option<TracingInit>> {
    if !config.enabled {
        return Ok(None);
    }

    let endpoint = config.endpoint.clone().ok_or_else(|| Error::OperationFailed {
        operation: "tracing_init".to_string(),
        cause: "OTLP endpoint required when tracing is enabled".to_string(),
    })?;

    let exporter = match config.protocol {
        OtlpProtocol::Grpc => SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&endpoint)
            .build(),
        OtlpProtocol::Http => SpanExporter::builder()
            .with_http()
            .with_protocol(Protocol::HttpBinary)
            .with_endpoint(&endpoint)
            .build(),
    }
    .map_err(|e| Error::OperationFailed {
        operation: "otlp_exporter_build".to_string(),
        cause: e.to_string(),
    })?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", config.service_name.clone()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();
    let provider = SdkTracerProvider::builder()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            config.sample_ratio,
        ))))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();

    global::set_text_map_propagator(TraceContextPropagator::new());
    global::set_tracer_provider(provider.clone());

    let tracer = provider.tracer(config.service_name.clone());
    Ok(Some(TracingInit {
        layer: OpenTelemetryLayer::new(tracer),
        provider,
    }))
}
