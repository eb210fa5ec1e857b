//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters a rename session produces.

use std::fmt;
use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Outcome label for `rows_processed_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcomeLabel {
    /// Row transferred and every plugin step passed.
    Succeeded,
    /// Row failed validation, a plugin step, or the transfer.
    Failed,
}

impl RowOutcomeLabel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// Prometheus-backed metrics registry shared across sessions.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    rows_processed_total: IntCounterVec,
    transfer_bytes_total: IntCounter,
    plugin_errors_total: IntCounterVec,
    tasks_finished_total: IntCounterVec,
}

/// Snapshot of selected counters for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Rows that succeeded.
    pub rows_succeeded: u64,
    /// Rows that failed.
    pub rows_failed: u64,
    /// Bytes moved or copied.
    pub transfer_bytes: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let rows_processed_total = IntCounterVec::new(
            Opts::new("rows_processed_total", "Rows processed by outcome"),
            &["outcome"],
        )
        .map_err(|source| collector("rows_processed_total", source))?;
        let transfer_bytes_total = IntCounter::with_opts(Opts::new(
            "transfer_bytes_total",
            "Bytes moved or copied by verified transfers",
        ))
        .map_err(|source| collector("transfer_bytes_total", source))?;
        let plugin_errors_total = IntCounterVec::new(
            Opts::new("plugin_errors_total", "Plugin errors by plugin and kind"),
            &["plugin", "kind"],
        )
        .map_err(|source| collector("plugin_errors_total", source))?;
        let tasks_finished_total = IntCounterVec::new(
            Opts::new("tasks_finished_total", "Tasks finished by terminal state"),
            &["state"],
        )
        .map_err(|source| collector("tasks_finished_total", source))?;

        registry
            .register(Box::new(rows_processed_total.clone()))
            .map_err(|source| register("rows_processed_total", source))?;
        registry
            .register(Box::new(transfer_bytes_total.clone()))
            .map_err(|source| register("transfer_bytes_total", source))?;
        registry
            .register(Box::new(plugin_errors_total.clone()))
            .map_err(|source| register("plugin_errors_total", source))?;
        registry
            .register(Box::new(tasks_finished_total.clone()))
            .map_err(|source| register("tasks_finished_total", source))?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                rows_processed_total,
                transfer_bytes_total,
                plugin_errors_total,
                tasks_finished_total,
            }),
        })
    }

    /// Count a processed row.
    pub fn inc_row(&self, outcome: RowOutcomeLabel) {
        self.inner
            .rows_processed_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Add transferred bytes.
    pub fn add_transfer_bytes(&self, bytes: u64) {
        self.inner.transfer_bytes_total.inc_by(bytes);
    }

    /// Count a plugin error.
    pub fn inc_plugin_error(&self, plugin: &str, kind: &str) {
        self.inner
            .plugin_errors_total
            .with_label_values(&[plugin, kind])
            .inc();
    }

    /// Count a task reaching `state`.
    pub fn inc_task_finished(&self, state: &str) {
        self.inner
            .tasks_finished_total
            .with_label_values(&[state])
            .inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode {
                families: metric_families.len(),
                source,
            })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the row and byte counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let rows = |outcome: RowOutcomeLabel| {
            self.inner
                .rows_processed_total
                .with_label_values(&[outcome.as_str()])
                .get()
        };
        MetricsSnapshot {
            rows_succeeded: rows(RowOutcomeLabel::Succeeded),
            rows_failed: rows(RowOutcomeLabel::Failed),
            transfer_bytes: self.inner.transfer_bytes_total.get(),
        }
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

fn collector(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsCollector { name, source }
}

fn register(name: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::MetricsRegister { name, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_row(RowOutcomeLabel::Succeeded);
        metrics.inc_row(RowOutcomeLabel::Succeeded);
        metrics.inc_row(RowOutcomeLabel::Failed);
        metrics.add_transfer_bytes(4_096);
        metrics.inc_plugin_error("field_pattern", "data");
        metrics.inc_task_finished("completed");

        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot,
            MetricsSnapshot {
                rows_succeeded: 2,
                rows_failed: 1,
                transfer_bytes: 4_096,
            }
        );

        let rendered = metrics.render()?;
        assert!(rendered.contains("rows_processed_total"));
        assert!(rendered.contains("plugin_errors_total"));
        assert!(rendered.contains("tasks_finished_total"));
        Ok(())
    }

    #[test]
    fn clones_share_the_registry() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        let clone = metrics.clone();
        clone.add_transfer_bytes(10);
        assert_eq!(metrics.snapshot().transfer_bytes, 10);
        Ok(())
    }
}
