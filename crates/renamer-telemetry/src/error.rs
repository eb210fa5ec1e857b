//! Failures of logging setup and metrics rendering.
//!
//! Messages are constant; [`TelemetryError::detail`] adds the captured context.

use prometheus::Error as PrometheusError;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while setting up logging or exporting metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already installed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Log format that was requested.
        format: &'static str,
        /// Underlying subscriber error.
        source: TryInitError,
    },
    /// A row, byte, plugin or task counter could not be built.
    #[error("failed to build metrics collector")]
    MetricsCollector {
        /// Counter name.
        name: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// A counter could not be added to the registry.
    #[error("failed to register metrics collector")]
    MetricsRegister {
        /// Counter name.
        name: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The text exposition could not be produced.
    #[error("failed to encode metrics")]
    MetricsEncode {
        /// Metric families gathered before encoding.
        families: usize,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// The rendered exposition was not UTF-8.
    #[error("metrics output was not valid utf-8")]
    MetricsUtf8 {
        /// Underlying conversion error.
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    /// One-line rendering with the captured context.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::SubscriberInstall { format, source } => {
                format!("{format} logging not installed: {source}")
            }
            Self::MetricsCollector { name, source } => format!("counter {name}: {source}"),
            Self::MetricsRegister { name, source } => {
                format!("counter {name} not registered: {source}")
            }
            Self::MetricsEncode { families, source } => {
                format!("encoding {families} metric families: {source}")
            }
            Self::MetricsUtf8 { source } => format!("metrics output: {source}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn metric_failures_name_the_counter() {
        let err = TelemetryError::MetricsRegister {
            name: "rows_processed_total",
            source: PrometheusError::AlreadyReg,
        };
        assert_eq!(err.to_string(), "failed to register metrics collector");
        assert!(err.detail().starts_with("counter rows_processed_total not registered"));
        assert!(err.source().is_some());

        let err = TelemetryError::MetricsEncode {
            families: 4,
            source: PrometheusError::Msg("bad label".into()),
        };
        assert_eq!(err.detail(), "encoding 4 metric families: bad label");
    }

    #[test]
    fn invalid_exposition_bytes_are_reported() -> anyhow::Result<()> {
        let Err(source) = String::from_utf8(vec![b'r', 0xff]) else {
            anyhow::bail!("expected invalid utf-8");
        };
        let err = TelemetryError::MetricsUtf8 { source };
        assert_eq!(err.to_string(), "metrics output was not valid utf-8");
        assert!(err.detail().starts_with("metrics output: "));
        Ok(())
    }
}
