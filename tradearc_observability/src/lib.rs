//! Logging, tracing and metrics setup shared by the tradearc crates.
//!
//! Logs always go to stdout, either with the compact human format or as JSON
//! when `RUST_LOG_FORMAT=json`. OpenTelemetry export of traces and metrics is
//! opt-in through `OTEL_SDK_DISABLED=false`.

use std::borrow::Cow;
use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{InstrumentationScope, global};
use opentelemetry_otlp::{ExporterBuildError, MetricExporter, SpanExporter};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;
use snafu::{ResultExt, Snafu};
use tracing::Subscriber;
use tracing_opentelemetry::MetricsLayer;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::{prelude::*, registry::LookupSpan};

pub use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

pub use crate::error_kind::ErrorKind;

use crate::format::TradearcFormat;

mod error_kind;
mod format;

const OTEL_SDK_DISABLED: &str = "OTEL_SDK_DISABLED";

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

#[derive(Debug, Snafu)]
pub enum ObservabilityError {
    #[snafu(display("Failed to build exporter"))]
    Exporter { source: ExporterBuildError },
}

/// Returns a meter from the global meter provider.
///
/// Instruments created before `init_observability` (or without it, as in
/// tests) record into a no-op provider.
pub fn meter(name: &'static str) -> Meter {
    global::meter(name)
}

/// Flushes the OpenTelemetry exporters when the process is done.
///
/// One-shot invocations exit right after their work, before the periodic
/// exporters had a chance to run, so the binary calls [`shutdown`] last.
///
/// [`shutdown`]: ObservabilityGuard::shutdown
#[derive(Default)]
pub struct ObservabilityGuard {
    providers: Option<(SdkTracerProvider, SdkMeterProvider)>,
}

impl ObservabilityGuard {
    pub fn shutdown(self) {
        if let Some((trace_provider, meter_provider)) = self.providers {
            if let Err(err) = meter_provider.shutdown() {
                tracing::warn!(err = ?err, "failed to flush metrics");
            }
            if let Err(err) = trace_provider.shutdown() {
                tracing::warn!(err = ?err, "failed to flush traces");
            }
        }
    }
}

pub fn init_observability(
    package_name: impl Into<Cow<'static, str>>,
    package_version: impl Into<Cow<'static, str>>,
) -> Result<ObservabilityGuard, ObservabilityError> {
    // Unlike the otel sdk, exports are disabled unless explicitly enabled.
    let sdk_disabled = std::env::var(OTEL_SDK_DISABLED)
        .map(|v| v != "false")
        .unwrap_or(true);

    let mut layers = vec![stdout()];
    let mut guard = ObservabilityGuard::default();

    if !sdk_disabled {
        let (layer, providers) = otel(package_name, package_version)?;
        layers.push(layer);
        guard.providers = Some(providers);
    }

    tracing_subscriber::registry().with(layers).init();

    Ok(guard)
}

fn log_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO"))
}

fn stdout<S>() -> BoxedLayer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let json_fmt = std::env::var("RUST_LOG_FORMAT")
        .map(|val| val == "json")
        .unwrap_or(false);

    if json_fmt {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(log_env_filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .event_format(TradearcFormat::default())
            .fmt_fields(TradearcFormat::default())
            .with_filter(log_env_filter())
            .boxed()
    }
}

fn otel<S>(
    package_name: impl Into<Cow<'static, str>>,
    version: impl Into<Cow<'static, str>>,
) -> Result<(BoxedLayer<S>, (SdkTracerProvider, SdkMeterProvider)), ObservabilityError>
where
    S: Subscriber + Send + Sync,
    for<'a> S: LookupSpan<'a>,
{
    let resource = Resource::builder().build();

    let instrumentation_lib = InstrumentationScope::builder(package_name.into())
        .with_version(version.into())
        .build();

    let span_exporter = SpanExporter::builder()
        .with_tonic()
        .build()
        .context(ExporterSnafu {})?;

    let trace_provider = SdkTracerProvider::builder()
        .with_resource(resource.clone())
        .with_batch_exporter(span_exporter)
        .build();
    let tracer = trace_provider.tracer_with_scope(instrumentation_lib);

    let metrics_exporter = MetricExporter::builder()
        .with_tonic()
        .build()
        .context(ExporterSnafu {})?;

    let metrics_reader = PeriodicReader::builder(metrics_exporter)
        .with_interval(Duration::from_secs(10))
        .build();

    let meter_provider = MeterProviderBuilder::default()
        .with_resource(resource)
        .with_reader(metrics_reader)
        .build();

    global::set_meter_provider(meter_provider.clone());

    let otel_trace_layer = tracing_opentelemetry::layer().with_tracer(tracer);
    let otel_metrics_layer = MetricsLayer::new(meter_provider.clone());
    let otel_layer = log_env_filter()
        .and_then(otel_metrics_layer)
        .and_then(otel_trace_layer)
        .boxed();

    Ok((otel_layer, (trace_provider, meter_provider)))
}
