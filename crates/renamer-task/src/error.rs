//! # Design
//!
//! - Only failures that refuse a whole session surface as [`TaskError`].
//! - Row failures never escape the row loop; they become summary lines.

use std::io;

use renamer_config::ConfigError;
use renamer_core::PluginError;
use renamer_telemetry::TelemetryError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for task operations.
pub type TaskResult<T> = Result<T, TaskError>;

/// Errors that prevent a session from running.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The output directory recipe or session derivation was rejected.
    #[error("task configuration invalid")]
    Configuration {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: ConfigError,
    },
    /// The working directory needed to resolve relative paths is unavailable.
    #[error("working directory unavailable")]
    WorkingDirectory {
        /// Underlying IO error.
        source: io::Error,
    },
    /// A session listener refused the session.
    #[error("session start refused")]
    SessionStart {
        /// Session that was refused.
        session: Uuid,
        /// Error raised by the listener.
        source: PluginError,
    },
    /// The metrics registry could not be built.
    #[error("task metrics unavailable")]
    Metrics {
        /// Source telemetry error.
        source: TelemetryError,
    },
    /// The worker thread could not be spawned.
    #[error("task worker spawn failed")]
    Spawn {
        /// Task that failed to start.
        task_id: Uuid,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl TaskError {
    /// Whether the operator can fix the failure by editing configuration.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::SessionStart { .. })
    }

    /// One-line rendering with the captured context.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Configuration { operation, source } => {
                format!("{operation}: {}", source.detail())
            }
            Self::WorkingDirectory { source } => format!("working directory: {source}"),
            Self::SessionStart { session, source } => {
                format!("session {session} refused: {}", source.detail())
            }
            Self::Metrics { source } => format!("metrics: {}", source.detail()),
            Self::Spawn { task_id, source } => {
                format!("task {task_id} worker spawn failed: {source}")
            }
        }
    }
}
