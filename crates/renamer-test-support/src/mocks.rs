//! Plugins that record or fail on demand.

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use renamer_core::{
    FieldLookup, Plugin, PluginConfig, PluginError, PluginRow, RowEvent, RowListener,
    RowValidator, SessionInfo, SessionListener, SessionOutcome,
};

/// One recorded row event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Row index the event was delivered for.
    pub row: usize,
    /// Event delivered.
    pub event: RowEvent,
}

/// Row and session listener that remembers everything it was told.
#[derive(Debug, Default)]
pub struct RecordingListener {
    name: String,
    events: Mutex<Vec<RecordedEvent>>,
    sessions_started: Mutex<Vec<SessionInfo>>,
    sessions_ended: Mutex<Vec<SessionOutcome>>,
}

impl RecordingListener {
    /// Listener reporting `name` in logs and errors.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Every row event, in delivery order.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events delivered for `row`, in order.
    #[must_use]
    pub fn events_for(&self, row: usize) -> Vec<RowEvent> {
        self.events()
            .into_iter()
            .filter(|recorded| recorded.row == row)
            .map(|recorded| recorded.event)
            .collect()
    }

    /// Sessions that started.
    #[must_use]
    pub fn sessions_started(&self) -> Vec<SessionInfo> {
        self.sessions_started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Outcomes of sessions that ended.
    #[must_use]
    pub fn sessions_ended(&self) -> Vec<SessionOutcome> {
        self.sessions_ended
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Plugin for RecordingListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, _config: &PluginConfig) -> Result<(), PluginError> {
        Ok(())
    }

    fn as_row_listener(&self) -> Option<&dyn RowListener> {
        Some(self)
    }

    fn as_session_listener(&self) -> Option<&dyn SessionListener> {
        Some(self)
    }
}

impl RowListener for RecordingListener {
    fn process_event(&self, event: RowEvent, row: &mut PluginRow<'_>) -> Result<(), PluginError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                row: row.row_index(),
                event,
            });
        Ok(())
    }
}

impl SessionListener for RecordingListener {
    fn session_started(&self, session: &SessionInfo) -> Result<(), PluginError> {
        self.sessions_started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session.clone());
        Ok(())
    }

    fn session_ended(
        &self,
        _session: &SessionInfo,
        outcome: &SessionOutcome,
    ) -> Result<(), PluginError> {
        self.sessions_ended
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome.clone());
        Ok(())
    }
}

/// How a [`FailingPlugin`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Recoverable data error.
    Data,
    /// Infrastructure error.
    System,
}

/// Validator and listener that fails for selected rows.
#[derive(Debug)]
pub struct FailingPlugin {
    name: String,
    failure: Failure,
    rows: BTreeSet<usize>,
    field_value: Option<(String, String)>,
    on_event: Option<RowEvent>,
    on_session_start: bool,
}

impl FailingPlugin {
    /// Validator that rejects the given row indices.
    pub fn validator_for_rows(
        name: impl Into<String>,
        failure: Failure,
        rows: impl IntoIterator<Item = usize>,
    ) -> Self {
        Self {
            name: name.into(),
            failure,
            rows: rows.into_iter().collect(),
            field_value: None,
            on_event: None,
            on_session_start: false,
        }
    }

    /// Validator that rejects rows whose `field` core value equals `value`.
    pub fn validator_for_value(
        name: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            failure: Failure::Data,
            rows: BTreeSet::new(),
            field_value: Some((field.into(), value.into())),
            on_event: None,
            on_session_start: false,
        }
    }

    /// Listener that fails on `event` for the given row indices.
    pub fn listener_on(
        name: impl Into<String>,
        event: RowEvent,
        rows: impl IntoIterator<Item = usize>,
    ) -> Self {
        Self {
            name: name.into(),
            failure: Failure::Data,
            rows: rows.into_iter().collect(),
            field_value: None,
            on_event: Some(event),
            on_session_start: false,
        }
    }

    /// Session listener that refuses every session.
    pub fn refusing_sessions(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure: Failure::System,
            rows: BTreeSet::new(),
            field_value: None,
            on_event: None,
            on_session_start: true,
        }
    }

    fn error(&self, message: String) -> PluginError {
        match self.failure {
            Failure::Data => PluginError::data(&self.name, message),
            Failure::System => PluginError::System {
                plugin: self.name.clone(),
                message,
                source: None,
            },
        }
    }

    fn rejects(&self, row: &PluginRow<'_>) -> bool {
        if self.rows.contains(&row.row_index()) {
            return true;
        }
        self.field_value
            .as_ref()
            .is_some_and(|(field, value)| row.core_value(field) == Some(value.as_str()))
    }
}

impl Plugin for FailingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, _config: &PluginConfig) -> Result<(), PluginError> {
        Ok(())
    }

    fn as_validator(&self) -> Option<&dyn RowValidator> {
        (self.on_event.is_none() && !self.on_session_start).then_some(self as &dyn RowValidator)
    }

    fn as_row_listener(&self) -> Option<&dyn RowListener> {
        self.on_event.map(|_| self as &dyn RowListener)
    }

    fn as_session_listener(&self) -> Option<&dyn SessionListener> {
        self.on_session_start.then_some(self as &dyn SessionListener)
    }
}

impl RowValidator for FailingPlugin {
    fn validate(&self, row: &PluginRow<'_>) -> Result<(), PluginError> {
        if self.rejects(row) {
            return Err(self.error(format!("row {} rejected", row.row_index())));
        }
        Ok(())
    }
}

impl RowListener for FailingPlugin {
    fn process_event(&self, event: RowEvent, row: &mut PluginRow<'_>) -> Result<(), PluginError> {
        if Some(event) == self.on_event && self.rejects(row) {
            return Err(self.error(format!("{event} failed for row {}", row.row_index())));
        }
        Ok(())
    }
}

impl SessionListener for FailingPlugin {
    fn session_started(&self, session: &SessionInfo) -> Result<(), PluginError> {
        Err(self.error(format!("session {} refused", session.name)))
    }

    fn session_ended(
        &self,
        _session: &SessionInfo,
        _outcome: &SessionOutcome,
    ) -> Result<(), PluginError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renamer_core::{Field, Row, Target};

    #[test]
    fn failing_validator_targets_selected_rows() -> anyhow::Result<()> {
        let plugin = FailingPlugin::validator_for_rows("reject", Failure::System, [1]);
        assert!(plugin.roles().validator);
        assert!(!plugin.roles().row_listener);

        let mut row = Row::new(Target::new("a.lsm"), vec![Field::new("Batch", "B1")])?;
        assert!(plugin.validate(&PluginRow::new(0, &mut row)).is_ok());
        let err = plugin
            .validate(&PluginRow::new(1, &mut row))
            .expect_err("row 1 rejected");
        assert_eq!(err.detail(), "reject: row 1 rejected");
        Ok(())
    }

    #[test]
    fn recording_listener_keeps_delivery_order() -> anyhow::Result<()> {
        let listener = RecordingListener::new("recorder");
        let mut row = Row::new(Target::new("a.lsm"), Vec::new())?;
        let mut view = PluginRow::new(3, &mut row);
        listener.process_event(RowEvent::StartRow, &mut view)?;
        listener.process_event(RowEvent::Start, &mut view)?;
        assert_eq!(
            listener.events_for(3),
            [RowEvent::StartRow, RowEvent::Start]
        );
        assert!(listener.events_for(0).is_empty());
        Ok(())
    }
}
