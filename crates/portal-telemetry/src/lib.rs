//! Process-wide tracing setup shared by every Portal binary.
//!
//! [`init`] installs a `tracing` subscriber with an `EnvFilter`, a JSON or
//! human-readable formatter, a bridge for `log` records and, when an OTLP
//! endpoint is configured, an OpenTelemetry span exporter.

use clap::ValueEnum;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};
use typed_builder::TypedBuilder;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to install log bridge: {0}")]
    LogBridge(String),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
    #[error("failed to build OTLP exporter: {0}")]
    Exporter(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    #[value(name = "json")]
    Json,
    /// Multi-line, human-readable output for local development.
    #[value(name = "pretty")]
    Pretty,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct TelemetryConfig {
    /// Reported as `service.name` on exported spans.
    #[builder(setter(into))]
    pub service_name: String,
    #[builder(default)]
    pub log_format: LogFormat,
    /// Filter used when `RUST_LOG` is unset.
    #[builder(default = "info".to_string(), setter(into))]
    pub default_filter: String,
    /// gRPC OTLP collector, e.g. `http://localhost:4317`. Spans are only
    /// exported when set.
    #[builder(default, setter(into))]
    pub otlp_endpoint: Option<String>,
}

/// Flushes pending spans when dropped. Keep it alive for the whole process.
#[must_use = "dropping the guard shuts down span export"]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to shut down tracer provider: {e}");
            }
        }
    }
}

fn tracer_provider(service_name: &str, endpoint: &str) -> Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder()
                .with_service_name(service_name.to_string())
                .build(),
        )
        .build())
}

/// Installs the global subscriber. Must be called once, from inside the
/// tokio runtime when OTLP export is enabled.
pub fn init(config: TelemetryConfig) -> Result<TelemetryGuard> {
    tracing_log::LogTracer::init().map_err(|e| TelemetryError::LogBridge(e.to_string()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().pretty().boxed(),
    };

    let provider = config
        .otlp_endpoint
        .as_deref()
        .map(|endpoint| tracer_provider(&config.service_name, endpoint))
        .transpose()?;

    let otel_layer = provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;

    if let Some(provider) = &provider {
        opentelemetry::global::set_tracer_provider(provider.clone());
    }

    tracing::info!(
        service = %config.service_name,
        log_format = %config.log_format,
        otlp = config.otlp_endpoint.is_some(),
        "telemetry initialized"
    );

    Ok(TelemetryGuard { provider })
}
