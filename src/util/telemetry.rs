//! Logging setup for the `telopay` binary.
//!
//! Logs are written to stderr through `tracing-subscriber`, filtered by `RUST_LOG`
//! (default `warn`), so they never mix with the payment output on stdout.
//!
//! With the `telemetry` feature enabled and any of the `OTEL_EXPORTER_OTLP_*`
//! variables set, spans and metrics are additionally exported over OTLP.

#[cfg(feature = "telemetry")]
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
#[cfg(feature = "telemetry")]
use opentelemetry_sdk::{
    Resource,
    metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider},
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
#[cfg(feature = "telemetry")]
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_VERSION},
};
#[cfg(feature = "telemetry")]
use std::env;
#[cfg(feature = "telemetry")]
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "warn";

/// Telemetry protocol to use for OTLP export
#[cfg(feature = "telemetry")]
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TelemetryProtocol {
    HTTP,
    GRPC,
}

#[cfg(feature = "telemetry")]
impl TelemetryProtocol {
    /// Determines telemetry protocol from environment variables if OTEL is configured
    fn from_env() -> Option<Self> {
        let is_enabled = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok()
            || env::var("OTEL_EXPORTER_OTLP_HEADERS").is_ok()
            || env::var("OTEL_EXPORTER_OTLP_PROTOCOL").is_ok();
        if !is_enabled {
            return None;
        }
        let protocol = match env::var("OTEL_EXPORTER_OTLP_PROTOCOL").as_deref() {
            Ok("grpc") => TelemetryProtocol::GRPC,
            _ => TelemetryProtocol::HTTP,
        };
        Some(protocol)
    }
}

/// Builder for the process-wide `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct Telemetry {
    name: &'static str,
    version: &'static str,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn with_version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    fn env_filter() -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    }

    /// Installs the global subscriber. Keep the returned guard alive until exit.
    pub fn register(self) -> TelemetryGuard {
        #[cfg(feature = "telemetry")]
        if let Some(protocol) = TelemetryProtocol::from_env() {
            return self.register_otlp(protocol);
        }

        tracing_subscriber::registry()
            .with(Self::env_filter())
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
        tracing::debug!(name = self.name, version = self.version, "Local logging enabled");

        TelemetryGuard::default()
    }

    #[cfg(feature = "telemetry")]
    fn resource(&self) -> Resource {
        let deployment_env = env::var("DEPLOYMENT_ENV").unwrap_or_else(|_| "develop".to_string());
        Resource::builder()
            .with_service_name(self.name)
            .with_schema_url(
                [
                    KeyValue::new(SERVICE_VERSION, self.version),
                    KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, deployment_env),
                ],
                SCHEMA_URL,
            )
            .build()
    }

    #[cfg(feature = "telemetry")]
    fn register_otlp(self, protocol: TelemetryProtocol) -> TelemetryGuard {
        let span_exporter = opentelemetry_otlp::SpanExporter::builder();
        let span_exporter = match protocol {
            TelemetryProtocol::HTTP => span_exporter.with_http().build(),
            TelemetryProtocol::GRPC => span_exporter.with_tonic().build(),
        };
        let metric_exporter = opentelemetry_otlp::MetricExporter::builder();
        let metric_exporter = match protocol {
            TelemetryProtocol::HTTP => metric_exporter.with_http().build(),
            TelemetryProtocol::GRPC => metric_exporter.with_tonic().build(),
        };
        let (span_exporter, metric_exporter) = match (span_exporter, metric_exporter) {
            (Ok(spans), Ok(metrics)) => (spans, metrics),
            (Err(e), _) | (_, Err(e)) => {
                eprintln!("Failed to build OTLP exporter, falling back to local logging: {e}");
                tracing_subscriber::registry()
                    .with(Self::env_filter())
                    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                    .init();
                return TelemetryGuard::default();
            }
        };

        let tracer_provider = SdkTracerProvider::builder()
            .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                1.0,
            ))))
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(self.resource())
            .with_batch_exporter(span_exporter)
            .build();

        let reader = PeriodicReader::builder(metric_exporter)
            .with_interval(std::time::Duration::from_secs(30))
            .build();
        let meter_provider = MeterProviderBuilder::default()
            .with_resource(self.resource())
            .with_reader(reader)
            .build();
        global::set_meter_provider(meter_provider.clone());

        let tracer = tracer_provider.tracer("tracing-otel-subscriber");
        tracing_subscriber::registry()
            .with(Self::env_filter())
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(MetricsLayer::new(meter_provider.clone()))
            .with(OpenTelemetryLayer::new(tracer))
            .init();

        tracing::info!(?protocol, "OpenTelemetry tracing and metrics exporter is enabled");

        TelemetryGuard {
            tracer_provider: Some(tracer_provider),
            meter_provider: Some(meter_provider),
        }
    }
}

/// Flushes and shuts down the OTLP providers on drop.
#[derive(Default)]
pub struct TelemetryGuard {
    #[cfg(feature = "telemetry")]
    tracer_provider: Option<SdkTracerProvider>,
    #[cfg(feature = "telemetry")]
    meter_provider: Option<SdkMeterProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "telemetry")]
        {
            if let Some(tracer_provider) = self.tracer_provider.as_ref()
                && let Err(err) = tracer_provider.shutdown()
            {
                eprintln!("{err:?}");
            }
            if let Some(meter_provider) = self.meter_provider.as_ref()
                && let Err(err) = meter_provider.shutdown()
            {
                eprintln!("{err:?}");
            }
        }
    }
}
