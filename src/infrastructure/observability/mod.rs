use crate::config::Config;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Registry};

/// Page requests issued by paged collections, labelled `kind` = `refresh` | `more`.
pub const PAGE_FETCHES: &str = "teamflow_page_fetches_total";
/// Transient page fetch failures absorbed into a collection view.
pub const PAGE_FETCH_FAILURES: &str = "teamflow_page_fetch_failures_total";
/// Cached keys marked stale by committed mutations.
pub const CACHE_INVALIDATIONS: &str = "teamflow_cache_invalidations_total";

const COUNTERS: [(&str, &str); 3] = [
    (PAGE_FETCHES, "Page requests issued by paged collections"),
    (PAGE_FETCH_FAILURES, "Transient page fetch failures kept out of the view"),
    (CACHE_INVALIDATIONS, "Cached collections and records invalidated by mutations"),
];

pub struct ObservabilityGuard;

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        shutdown();
    }
}

/// Installs the global tracing subscriber and, when configured, the OTLP and
/// Prometheus exporters. Call once from the host application.
pub fn init(config: &Config) -> Result<ObservabilityGuard, Box<dyn std::error::Error>> {
    init_tracing(config)?;
    init_metrics(config)?;
    Ok(ObservabilityGuard)
}

fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_thread_ids(true)
        .with_target(true);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "teamflow=info".into());

    if let Some(endpoint) = &config.otel_exporter_endpoint {
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint);

        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", config.service_name.clone()),
            ])))
            .install_batch(runtime::Tokio)?;

        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .try_init()?;
    } else {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

fn init_metrics(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = config.metrics_port else {
        return Ok(());
    };

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([127, 0, 0, 1], port))
        .install()?;

    describe_metrics();
    tracing::info!("Metrics exporter (Prometheus) started on port {}", port);
    Ok(())
}

pub fn shutdown() {
    global::shutdown_tracer_provider();
}

/// Registers help text for the client's counters with the installed recorder.
pub fn describe_metrics() {
    for (name, help) in COUNTERS {
        metrics::describe_counter!(name, metrics::Unit::Count, help);
    }
}
