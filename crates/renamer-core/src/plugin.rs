//! Plugin capability contracts.
//!
//! A plugin advertises the roles it implements through the `as_*` accessors;
//! the pipeline only dispatches to roles that are present. Plugin instances
//! are shared between concurrently running sessions, so every method takes
//! `&self` and any internal state must be synchronised by the plugin.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PluginError, RowError};
use crate::model::{Field, FieldLookup, Row, Target};

/// Row-scoped lifecycle events delivered to row listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowEvent {
    /// Before validation and before the destination name is composed.
    StartRow,
    /// After validation, immediately before the transfer.
    Start,
    /// The transfer and every prior plugin step succeeded.
    EndSuccess,
    /// Validation, a plugin step, or the transfer failed.
    EndFail,
}

impl RowEvent {
    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartRow => "start_row",
            Self::Start => "start",
            Self::EndSuccess => "end_success",
            Self::EndFail => "end_fail",
        }
    }
}

impl fmt::Display for RowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Property bag supplied to a plugin at configuration time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin kind used to select an implementation.
    pub kind: String,
    /// Plugin-specific properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl PluginConfig {
    /// Create an empty configuration for `kind`.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter.
    #[must_use]
    pub fn with(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(property.into(), value.into());
        self
    }

    /// Optional property, `None` when absent or blank.
    #[must_use]
    pub fn get(&self, property: &str) -> Option<&str> {
        self.properties
            .get(property)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Required property.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Configuration`] naming the plugin and property.
    pub fn require(&self, property: &str) -> Result<&str, PluginError> {
        self.get(property)
            .ok_or_else(|| PluginError::configuration(&self.kind, property, "is required"))
    }
}

/// Roles a plugin implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PluginRoles {
    /// Implements [`RowValidator`].
    pub validator: bool,
    /// Implements [`RowListener`].
    pub row_listener: bool,
    /// Implements [`SessionListener`].
    pub session_listener: bool,
}

impl PluginRoles {
    /// Comma separated role labels for display.
    #[must_use]
    pub fn describe(self) -> String {
        let mut roles = Vec::new();
        if self.validator {
            roles.push("validator");
        }
        if self.row_listener {
            roles.push("row-listener");
        }
        if self.session_listener {
            roles.push("session-listener");
        }
        if roles.is_empty() {
            return "none".to_string();
        }
        roles.join(",")
    }
}

/// A configurable processing component.
pub trait Plugin: Send + Sync {
    /// Stable plugin name used in logs and summaries.
    fn name(&self) -> &str;

    /// Validate configuration and perform one-time setup.
    ///
    /// Called exactly once, before the instance is shared.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Configuration`] when required properties are
    /// missing, or [`PluginError::System`] when setup cannot complete.
    fn init(&mut self, config: &PluginConfig) -> Result<(), PluginError>;

    /// Validator role, when implemented.
    fn as_validator(&self) -> Option<&dyn RowValidator> {
        None
    }

    /// Row listener role, when implemented.
    fn as_row_listener(&self) -> Option<&dyn RowListener> {
        None
    }

    /// Session listener role, when implemented.
    fn as_session_listener(&self) -> Option<&dyn SessionListener> {
        None
    }

    /// Roles derived from the capability accessors.
    fn roles(&self) -> PluginRoles {
        PluginRoles {
            validator: self.as_validator().is_some(),
            row_listener: self.as_row_listener().is_some(),
            session_listener: self.as_session_listener().is_some(),
        }
    }
}

/// Inspects a row before it is transferred.
pub trait RowValidator: Send + Sync {
    /// Accept or reject the row.
    ///
    /// # Errors
    ///
    /// Returns a data error for recoverable content problems or a system
    /// error when an external dependency fails.
    fn validate(&self, row: &PluginRow<'_>) -> Result<(), PluginError>;
}

/// Reacts to row lifecycle events and may write plugin-derived values.
pub trait RowListener: Send + Sync {
    /// Handle `event` for `row`.
    ///
    /// # Errors
    ///
    /// Returns a data or system error to fail the row.
    fn process_event(&self, event: RowEvent, row: &mut PluginRow<'_>) -> Result<(), PluginError>;
}

/// Acts once per session.
pub trait SessionListener: Send + Sync {
    /// Session is about to process its first row.
    ///
    /// # Errors
    ///
    /// Any error refuses the session before rows are touched.
    fn session_started(&self, session: &SessionInfo) -> Result<(), PluginError>;

    /// Session finished or was cancelled.
    ///
    /// # Errors
    ///
    /// Errors are logged by the caller; the session result is unaffected.
    fn session_ended(
        &self,
        session: &SessionInfo,
        outcome: &SessionOutcome,
    ) -> Result<(), PluginError>;
}

/// Identity of a running session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Unique session identifier.
    pub id: Uuid,
    /// Human-readable session (project) name.
    pub name: String,
    /// Number of rows scheduled.
    pub row_count: usize,
    /// When processing started.
    pub started_at: DateTime<Utc>,
}

impl SessionInfo {
    /// Create a session identity stamped with the current time.
    pub fn new(name: impl Into<String>, row_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            row_count,
            started_at: Utc::now(),
        }
    }
}

/// Final tally handed to session listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    /// Whether the session stopped early on request.
    pub cancelled: bool,
    /// Rows attempted.
    pub processed: usize,
    /// Rows that failed.
    pub failures: usize,
    /// Rendered plain-text summary.
    pub summary: String,
}

/// Plugin-facing view of a row while it is being processed.
#[derive(Debug)]
pub struct PluginRow<'a> {
    index: usize,
    row: &'a mut Row,
    destination: Option<PathBuf>,
}

impl<'a> PluginRow<'a> {
    /// Wrap `row`, which sits at `index` in the session.
    pub fn new(index: usize, row: &'a mut Row) -> Self {
        Self {
            index,
            row,
            destination: None,
        }
    }

    /// Position of the row in the session.
    #[must_use]
    pub const fn row_index(&self) -> usize {
        self.index
    }

    /// Target being processed.
    #[must_use]
    pub fn target(&self) -> &Target {
        self.row.target()
    }

    /// Source path of the target.
    #[must_use]
    pub fn source(&self) -> &Path {
        self.row.target().path()
    }

    /// Destination path, known once the name has been composed.
    #[must_use]
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Record the composed destination path.
    pub fn set_destination(&mut self, destination: PathBuf) {
        self.destination = Some(destination);
    }

    /// Display names of every field, in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.row.fields().iter().map(Field::display_name)
    }

    /// Store a plugin-derived value.
    ///
    /// # Errors
    ///
    /// Returns [`RowError::FieldNotWritable`] for operator-owned fields.
    pub fn set_plugin_value(
        &mut self,
        display_name: &str,
        value: impl Into<String>,
    ) -> Result<(), RowError> {
        self.row.set_plugin_value(display_name, value)
    }

    /// Destination file name as currently composed by the row's fields.
    #[must_use]
    pub fn destination_file_name(&self) -> String {
        self.row.destination_file_name()
    }

    /// Underlying row.
    #[must_use]
    pub fn row(&self) -> &Row {
        self.row
    }
}

impl FieldLookup for PluginRow<'_> {
    fn core_value(&self, display_name: &str) -> Option<&str> {
        self.row.core_value(display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    struct ValidatorOnly;

    impl Plugin for ValidatorOnly {
        fn name(&self) -> &str {
            "validator_only"
        }

        fn init(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
            config.require("field").map(|_| ())
        }

        fn as_validator(&self) -> Option<&dyn RowValidator> {
            Some(self)
        }
    }

    impl RowValidator for ValidatorOnly {
        fn validate(&self, _row: &PluginRow<'_>) -> Result<(), PluginError> {
            Ok(())
        }
    }

    #[test]
    fn roles_follow_capability_accessors() {
        let plugin = ValidatorOnly;
        let roles = plugin.roles();
        assert!(roles.validator);
        assert!(!roles.row_listener);
        assert!(!roles.session_listener);
        assert_eq!(roles.describe(), "validator");
        assert_eq!(PluginRoles::default().describe(), "none");
    }

    #[test]
    fn require_rejects_missing_and_blank_properties() {
        let mut plugin = ValidatorOnly;
        let blank = PluginConfig::new("validator_only").with("field", "  ");
        let err = plugin.init(&blank).expect_err("blank property is missing");
        assert!(matches!(
            err,
            PluginError::Configuration { ref property, .. } if property == "field"
        ));
        assert!(
            plugin
                .init(&PluginConfig::new("validator_only").with("field", "Batch"))
                .is_ok()
        );
    }

    #[test]
    fn plugin_row_writes_through_to_row() -> Result<()> {
        let mut row = Row::new(
            Target::new("/scan/a.lsm"),
            vec![Field::new("Batch", "B1"), Field::plugin("Seq")],
        )?;
        {
            let mut view = PluginRow::new(4, &mut row);
            assert_eq!(view.row_index(), 4);
            assert_eq!(view.core_value("Batch"), Some("B1"));
            assert_eq!(view.field_names().collect::<Vec<_>>(), ["Batch", "Seq"]);
            view.set_plugin_value("Seq", "01")?;
            view.set_destination(PathBuf::from("/out/B101.lsm"));
            assert_eq!(view.destination(), Some(Path::new("/out/B101.lsm")));
        }
        assert_eq!(row.destination_file_name(), "B101.lsm");
        Ok(())
    }
}
