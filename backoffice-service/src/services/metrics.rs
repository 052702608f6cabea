//! Metrics collection and Prometheus export.
//!
//! HTTP request metrics come from the core middleware; the helpers here add
//! the domain counters. Everything renders through one recorder on `/metrics`.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use crate::models::{PartyKind, QuoteStatus};

/// Global handle to the Prometheus recorder.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Later calls are no-ops.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => tracing::warn!(error = %e, "Prometheus recorder not installed"),
    }
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

pub fn record_quote_created(kind: PartyKind) {
    counter!("backoffice_quotes_created_total", "party" => kind.label()).increment(1);
}

pub fn record_quote_transition(kind: PartyKind, from: QuoteStatus, to: QuoteStatus) {
    counter!(
        "backoffice_quote_transitions_total",
        "party" => kind.label(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

pub fn record_quote_conversion(kind: PartyKind) {
    counter!("backoffice_quote_conversions_total", "party" => kind.label()).increment(1);
}

/// `source` is `direct` or `quote`.
pub fn record_invoice_created(kind: PartyKind, source: &'static str) {
    counter!(
        "backoffice_invoices_created_total",
        "party" => kind.label(),
        "source" => source
    )
    .increment(1);
}

/// A delete refused because other records still point at the entity.
pub fn record_guarded_delete(entity: &'static str) {
    counter!("backoffice_deletes_refused_total", "entity" => entity).increment(1);
}

pub fn record_error(kind: &'static str) {
    counter!("backoffice_errors_total", "error_type" => kind).increment(1);
}

/// Times one store operation; call `observe_duration` when it finishes.
#[derive(Debug)]
pub struct QueryTimer {
    backend: &'static str,
    operation: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn start(backend: &'static str, operation: &'static str) -> Self {
        Self {
            backend,
            operation,
            start: Instant::now(),
        }
    }

    pub fn observe_duration(self) {
        histogram!(
            "backoffice_store_query_duration_seconds",
            "backend" => self.backend,
            "operation" => self.operation
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}
