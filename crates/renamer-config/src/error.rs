//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: &'static str,
        /// Field that failed validation.
        field: String,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// The output directory recipe cannot produce an absolute base path.
    #[error("invalid output directory configuration")]
    InvalidOutputDirectory {
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The resolved base directory is missing, not a directory, or read-only.
    #[error("output directory unavailable")]
    OutputDirectoryUnavailable {
        /// Resolved base path.
        path: PathBuf,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// A modification-time component carries an unusable date pattern.
    #[error("invalid date pattern")]
    InvalidTimePattern {
        /// Pattern provided by the project file.
        pattern: String,
    },
    /// Project file could not be parsed.
    #[error("failed to parse project file")]
    Parse {
        /// Project file path.
        path: PathBuf,
        /// Source parse error.
        source: serde_json::Error,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

impl ConfigError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// One-line rendering with the captured context.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::InvalidField {
                section,
                field,
                value,
                reason,
            } => match value {
                Some(value) => format!("{section}.{field} ({value}): {reason}"),
                None => format!("{section}.{field}: {reason}"),
            },
            Self::InvalidOutputDirectory { reason, value } => match value {
                Some(value) => format!("output directory ({value}): {reason}"),
                None => format!("output directory: {reason}"),
            },
            Self::OutputDirectoryUnavailable { path, reason } => {
                format!("output directory {} {reason}", path.display())
            }
            Self::InvalidTimePattern { pattern } => {
                format!("date pattern '{pattern}' is not a valid strftime pattern")
            }
            Self::Parse { path, source } => format!("{}: {source}", path.display()),
            Self::Io {
                operation,
                path,
                source,
            } => format!("{operation} failed for {}: {source}", path.display()),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
