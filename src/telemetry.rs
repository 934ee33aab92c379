use opentelemetry::{trace::TraceError, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace as sdktrace, Resource};
use opentelemetry_semantic_conventions::resource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Request spans at info; SQL statement logging from sqlx and sea-orm only
/// surfaces on warnings.
const DEFAULT_FILTER: &str = "info,contacts_server=info,sqlx=warn,sea_orm=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    /// One object per event with span fields (`table`, `action`,
    /// `contact_id`) flattened to the top level for log shippers.
    Json,
}

impl LogFormat {
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

fn otlp_tracer(endpoint: String, service_name: &str) -> Result<sdktrace::Tracer, TraceError> {
    let resource = Resource::new(vec![KeyValue::new(
        resource::SERVICE_NAME,
        service_name.to_string(),
    )]);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(
            sdktrace::config()
                .with_resource(resource)
                .with_sampler(sdktrace::Sampler::AlwaysOn),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)
}

/// Installs the global subscriber for the contacts service.
///
/// `RUST_LOG` overrides [`DEFAULT_FILTER`], `RUST_LOG_FORMAT=json` switches
/// to structured output, and `OTEL_EXPORTER_OTLP_ENDPOINT` adds trace export.
/// If the exporter cannot be built, the service still starts with local logs
/// only.
pub fn init_telemetry(service_name: &str) {
    let format = LogFormat::parse(std::env::var("RUST_LOG_FORMAT").ok().as_deref());

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));

    let tracer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .and_then(|endpoint| match otlp_tracer(endpoint, service_name) {
            Ok(tracer) => Some(tracer),
            Err(e) => {
                // No subscriber to report through yet.
                eprintln!("contact traces will not be exported: {e}");
                None
            }
        });
    let otel_layer = tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t));

    let registry = tracing_subscriber::registry().with(env_filter).with(otel_layer);
    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .without_time(),
            )
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}
