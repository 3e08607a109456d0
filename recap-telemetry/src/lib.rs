// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Recap telemetry (metrics + tracing + logging).

use opentelemetry::trace::TracerProvider;
use opentelemetry::{
    metrics::{Counter, Histogram, Meter, MeterProvider},
    KeyValue,
};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Metrics registry for digest processing.
pub struct SummaryMetrics {
    pub digests_processed: Counter<u64>,
    pub digests_failed: Counter<u64>,
    pub entries_created: Counter<u64>,
    pub entries_appended: Counter<u64>,
    pub entries_updated: Counter<u64>,
    pub generation_fallbacks: Counter<u64>,
    pub generation_latency_ms: Histogram<f64>,
}

impl SummaryMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            digests_processed: meter
                .u64_counter("recap.digests.processed")
                .with_description("Digests folded into a summary document")
                .init(),
            digests_failed: meter
                .u64_counter("recap.digests.failed")
                .with_description("Digests that could not be processed")
                .init(),
            entries_created: meter
                .u64_counter("recap.entries.created")
                .with_description("Summary documents created from a first digest")
                .init(),
            entries_appended: meter
                .u64_counter("recap.entries.appended")
                .with_description("New entries prepended to an existing log")
                .init(),
            entries_updated: meter
                .u64_counter("recap.entries.updated")
                .with_description("Digests merged into the most recent entry")
                .init(),
            generation_fallbacks: meter
                .u64_counter("recap.generation.fallbacks")
                .with_description("Decisions produced by the deterministic fallback")
                .init(),
            generation_latency_ms: meter
                .f64_histogram("recap.generation.latency_ms")
                .with_description("Latency of the summary model call in milliseconds")
                .init(),
        }
    }

    /// Metrics backed by the globally installed meter provider.
    pub fn global(service_name: &'static str) -> Self {
        Self::new(&opentelemetry::global::meter(service_name))
    }

    /// Record a processed digest and the action it produced (`create`, `append` or `update`).
    pub fn record_digest(&self, interface_type: &str, action: &str, used_fallback: bool) {
        let attrs = [
            KeyValue::new("interface", interface_type.to_string()),
            KeyValue::new("action", action.to_string()),
        ];
        self.digests_processed.add(1, &attrs);
        match action {
            "create" => self.entries_created.add(1, &attrs),
            "update" => self.entries_updated.add(1, &attrs),
            _ => self.entries_appended.add(1, &attrs),
        }
        if used_fallback {
            self.generation_fallbacks.add(1, &attrs);
        }
    }

    pub fn record_failure(&self, reason: &str) {
        self.digests_failed
            .add(1, &[KeyValue::new("reason", reason.to_string())]);
    }

    pub fn record_generation(&self, latency_ms: f64, succeeded: bool) {
        self.generation_latency_ms.record(
            latency_ms,
            &[KeyValue::new("outcome", if succeeded { "ok" } else { "fallback" })],
        );
    }
}

/// Initialize telemetry (tracing + metrics).
pub fn init_telemetry(
    service_name: &str,
    otlp_endpoint: Option<&str>,
) -> anyhow::Result<SummaryMetrics> {
    let tracer_provider = if let Some(endpoint) = otlp_endpoint {
        opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
            .with_trace_config(
                opentelemetry_sdk::trace::Config::default().with_resource(
                    opentelemetry_sdk::Resource::new(vec![KeyValue::new(
                        "service.name",
                        service_name.to_string(),
                    )]),
                ),
            )
            .install_batch(opentelemetry_sdk::runtime::Tokio)?
    } else {
        opentelemetry_sdk::trace::TracerProvider::builder().build()
    };

    let tracer = tracer_provider.tracer(service_name.to_string());

    let meter_provider = if let Some(endpoint) = otlp_endpoint {
        opentelemetry_otlp::new_pipeline()
            .metrics(opentelemetry_sdk::runtime::Tokio)
            .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
            .build()?
    } else {
        SdkMeterProvider::default()
    };

    let meter = meter_provider.meter(service_name.to_string());
    let metrics = SummaryMetrics::new(&meter);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(metrics)
}

/// Install only a log formatter, for hosts that export traces themselves.
///
/// Falls back to `info` when `RUST_LOG` is unset.
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_record_without_exporter() {
        let metrics = SummaryMetrics::global("recap-test");
        metrics.record_digest("slack", "create", false);
        metrics.record_digest("slack", "update", false);
        metrics.record_digest("web", "append", true);
        metrics.record_failure("conversation_not_found");
        metrics.record_generation(12.5, true);
    }

    #[test]
    fn test_init_logging_twice_reports_error() {
        let _ = init_logging(false);
        assert!(init_logging(true).is_err());
    }
}
