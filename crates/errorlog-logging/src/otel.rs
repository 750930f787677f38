//! OpenTelemetry span export
//!
//! Exports the spans of record submissions and tail queries to an OTLP
//! collector when enabled in [`OtelConfig`].

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, Tracer, TracerProvider};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;

use crate::config::OtelConfig;

/// Instrumentation scope name of exported spans
pub const TRACER_NAME: &str = "errorlog";

#[derive(Debug, thiserror::Error)]
pub enum OtelError {
    #[error("Failed to create OTLP exporter: {0}")]
    Exporter(String),
}

/// Build a tracing layer exporting spans over OTLP
///
/// The tracer provider is installed globally; call [`shutdown_otel`]
/// before exit to flush pending spans.
pub fn init_otel_layer<S>(config: &OtelConfig) -> Result<OpenTelemetryLayer<S, Tracer>, OtelError>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.endpoint)
        .build()
        .map_err(|e| OtelError::Exporter(e.to_string()))?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_sampler(sampler_for(config))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource_for(config))
        .build();

    let tracer = provider.tracer(TRACER_NAME);
    // The global handle keeps the provider, and its exporter, alive
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer))
}

/// Resource describing this process: service name and version plus any
/// configured attributes
fn resource_for(config: &OtelConfig) -> Resource {
    let mut attrs = vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ];
    attrs.extend(
        config
            .resource_attributes
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone())),
    );
    Resource::new(attrs)
}

fn sampler_for(config: &OtelConfig) -> Sampler {
    if config.sample_ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if config.sample_ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(config.sample_ratio)
    }
}

/// Flush and shut down the global tracer provider
pub fn shutdown_otel() {
    opentelemetry::global::shutdown_tracer_provider();
}
