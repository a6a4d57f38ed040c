use crate::app_env;
use crate::config::OtelEndpoints;
use anyhow::Context;
use axum::Router;
use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use opentelemetry::trace::TracerProvider;
use opentelemetry::{KeyValue, global};
use opentelemetry_http::HeaderExtractor;
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::Tracer;
use opentelemetry_sdk::{Resource, runtime};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing::{Span, debug, field, info_span};
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer, OpenTelemetrySpanExt};
use tracing_subscriber::{EnvFilter, prelude::*, registry};

/// Service name reported to OpenTelemetry collectors
const SERVICE_NAME: &str = "task-tracker";

/// Span field filled in once a request's session is resolved
pub const USER_ID_FIELD: &str = "user_id";

pub struct OtelExporters {
    pub tracer: Tracer,
    pub meter: SdkMeterProvider,
}

/// Wraps every request in a span named after its route template, so task IDs in paths
/// don't explode span cardinality. Trace context from the caller becomes the span's parent.
pub fn attach_tracing_http<T>(router: Router<T>) -> Router<T>
where
    T: Clone + Send + Sync + 'static,
{
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            let route = request
                .extensions()
                .get::<MatchedPath>()
                .map(MatchedPath::as_str)
                .unwrap_or_else(|| request.uri().path());

            let req_span = info_span!(
                "http_request",
                method = %request.method(),
                route,
                user_id = field::Empty,
                response_status = field::Empty,
                latency_ms = field::Empty,
            );
            req_span.set_parent(global::get_text_map_propagator(|propagator| {
                propagator.extract(&HeaderExtractor(request.headers()))
            }));

            req_span
        })
        .on_response(|response: &Response<Body>, latency: Duration, span: &Span| {
            span.record("response_status", response.status().as_u16());
            span.record("latency_ms", latency.as_millis() as u64);
            debug!("Response sent");
        });

    router.layer(trace_layer)
}

/// Tags the current request span with the signed-in user
pub fn record_user(user_id: &str) {
    Span::current().record(USER_ID_FIELD, user_id);
}

fn service_resource() -> Resource {
    Resource::new([KeyValue::new("service.name", SERVICE_NAME)])
}

/// Starts background OTLP exporters for spans and metrics
pub fn init_exporters(endpoints: &OtelEndpoints) -> Result<OtelExporters, anyhow::Error> {
    let span_export = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoints.spans)
        .build()
        .with_context(|| format!("building a span exporter for {}", endpoints.spans))?;
    let metric_export = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoints.metrics)
        .build()
        .with_context(|| format!("building a metric exporter for {}", endpoints.metrics))?;

    let tracer = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(span_export, runtime::Tokio)
        .with_resource(service_resource())
        .build()
        .tracer(SERVICE_NAME);
    let meter = SdkMeterProvider::builder()
        .with_reader(PeriodicReader::builder(metric_export, runtime::Tokio).build())
        .with_resource(service_resource())
        .build();

    Ok(OtelExporters { tracer, meter })
}

/// Builds the stdout log filter from [app_env::LOG_LEVEL], defaulting to "info"
pub fn init_env_filter() -> Result<EnvFilter, anyhow::Error> {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(app_env::LOG_LEVEL)
        .from_env()
        .context("parsing LOG_LEVEL")
}

/// Installs the global subscriber. Stdout gets JSON logs filtered by `env_filter`, while
/// OpenTelemetry (when configured) receives everything at debug and above.
pub fn setup_logging_and_tracing(env_filter: EnvFilter, otel_exporters: Option<OtelExporters>) {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let (otel_spans, otel_metrics) = match otel_exporters {
        Some(exporters) => (
            Some(OpenTelemetryLayer::new(exporters.tracer)),
            Some(MetricsLayer::new(exporters.meter)),
        ),
        None => (None, None),
    };

    registry()
        .with(LevelFilter::DEBUG)
        .with(otel_spans)
        .with(otel_metrics)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_filter(env_filter),
        )
        .init();
}
