//! # Design
//!
//! - Row errors describe misuse of the narrow row mutation surface.
//! - Plugin errors carry the taxonomy the task engine routes on: configuration
//!   errors refuse a session, data and system errors fail a single row.
//! - Messages stay constant; context lives in fields so callers can render it.

use std::error::Error as StdError;

use thiserror::Error;

/// Errors produced when building or mutating a [`crate::Row`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    /// Two fields in the same row share a display name.
    #[error("duplicate field display name")]
    DuplicateField {
        /// Display name that appeared more than once.
        display_name: String,
    },
    /// A plugin tried to overwrite a field that belongs to the operator.
    #[error("field is not writable by plugins")]
    FieldNotWritable {
        /// Display name of the protected field.
        display_name: String,
    },
}

/// Broad classification of a [`PluginError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginErrorKind {
    /// Missing or invalid plugin configuration.
    Configuration,
    /// The row content was rejected; the operator can fix it and retry.
    Data,
    /// An external dependency of the plugin failed.
    System,
}

impl PluginErrorKind {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Data => "data",
            Self::System => "system",
        }
    }
}

/// Errors raised by plugins during initialisation, validation, or event handling.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A required property is missing or carries an unusable value.
    #[error("plugin configuration invalid")]
    Configuration {
        /// Plugin that rejected its configuration.
        plugin: String,
        /// Offending property name.
        property: String,
        /// Human-readable reason.
        reason: String,
    },
    /// The plugin rejected the content of a row.
    #[error("plugin rejected row data")]
    Data {
        /// Plugin that rejected the row.
        plugin: String,
        /// Human-readable reason shown to the operator.
        message: String,
    },
    /// An infrastructure dependency failed while the plugin handled a row.
    #[error("plugin dependency failed")]
    System {
        /// Plugin whose dependency failed.
        plugin: String,
        /// Human-readable description of the failed operation.
        message: String,
        /// Underlying failure, when one is available.
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl PluginError {
    /// Build a configuration error.
    pub fn configuration(
        plugin: impl Into<String>,
        property: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            plugin: plugin.into(),
            property: property.into(),
            reason: reason.into(),
        }
    }

    /// Build a data error.
    pub fn data(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Data {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Build a system error wrapping an underlying failure.
    pub fn system<E>(plugin: impl Into<String>, message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::System {
            plugin: plugin.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Build a data error from a rejected row mutation.
    pub fn from_row(plugin: impl Into<String>, error: &RowError) -> Self {
        let message = match error {
            RowError::DuplicateField { display_name } => {
                format!("duplicate field '{display_name}'")
            }
            RowError::FieldNotWritable { display_name } => {
                format!("field '{display_name}' is not writable by plugins")
            }
        };
        Self::data(plugin, message)
    }

    /// Classification used to route the error.
    #[must_use]
    pub const fn kind(&self) -> PluginErrorKind {
        match self {
            Self::Configuration { .. } => PluginErrorKind::Configuration,
            Self::Data { .. } => PluginErrorKind::Data,
            Self::System { .. } => PluginErrorKind::System,
        }
    }

    /// Name of the plugin that raised the error.
    #[must_use]
    pub fn plugin(&self) -> &str {
        match self {
            Self::Configuration { plugin, .. }
            | Self::Data { plugin, .. }
            | Self::System { plugin, .. } => plugin,
        }
    }

    /// One-line rendering suitable for summaries and dialogs.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Configuration {
                plugin,
                property,
                reason,
            } => format!("{plugin}: property '{property}' {reason}"),
            Self::Data { plugin, message } => format!("{plugin}: {message}"),
            Self::System {
                plugin,
                message,
                source,
            } => match source {
                Some(source) => format!("{plugin}: {message} ({source})"),
                None => format!("{plugin}: {message}"),
            },
        }
    }
}
