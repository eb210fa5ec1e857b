//! Ordered dispatch of row and session events to plugin roles.
//!
//! # Design
//! - Plugins are held behind `Arc` and shared by every clone of the pipeline,
//!   including clones handed to concurrently running sessions.
//! - Success-path events stop at the first error; `EndFail` and session end
//!   are delivered to every listener regardless of earlier errors.

use std::fmt;
use std::sync::Arc;

use renamer_core::{
    Plugin, PluginError, PluginErrorKind, PluginRoles, PluginRow, RowEvent, SessionInfo,
    SessionOutcome,
};
use tracing::{error, warn};

/// Shared, ordered set of initialised plugins.
#[derive(Clone, Default)]
pub struct PluginPipeline {
    plugins: Arc<Vec<Arc<dyn Plugin>>>,
}

impl fmt::Debug for PluginPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|plugin| plugin.name()))
            .finish()
    }
}

impl PluginPipeline {
    /// Pipeline over already initialised plugins, in invocation order.
    #[must_use]
    pub fn from_plugins(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self {
            plugins: Arc::new(plugins),
        }
    }

    /// Number of plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether the pipeline has no plugins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Name and roles of every plugin, in order.
    pub fn describe(&self) -> impl Iterator<Item = (&str, PluginRoles)> {
        self.plugins
            .iter()
            .map(|plugin| (plugin.name(), plugin.roles()))
    }

    /// Run every validator; the first rejection wins.
    ///
    /// # Errors
    ///
    /// Returns the first validator error.
    pub fn validate(&self, row: &PluginRow<'_>) -> Result<(), PluginError> {
        for plugin in self.plugins.iter() {
            if let Some(validator) = plugin.as_validator() {
                validator.validate(row)?;
            }
        }
        Ok(())
    }

    /// Deliver `event` to every row listener in order.
    ///
    /// For `StartRow`, `Start` and `EndSuccess` the first error stops
    /// delivery. `EndFail` reaches every listener; failures are logged and the
    /// first is returned.
    ///
    /// # Errors
    ///
    /// Returns the first listener error.
    pub fn dispatch(&self, event: RowEvent, row: &mut PluginRow<'_>) -> Result<(), PluginError> {
        let listeners = self.plugins.iter().filter_map(|plugin| plugin.as_row_listener());
        if event != RowEvent::EndFail {
            for listener in listeners {
                listener.process_event(event, row)?;
            }
            return Ok(());
        }

        let mut first = None;
        for listener in listeners {
            if let Err(err) = listener.process_event(event, row) {
                warn!(
                    plugin = err.plugin(),
                    row = row.row_index(),
                    source_path = %row.source().display(),
                    detail = %err.detail(),
                    "end_fail listener failed"
                );
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Notify session listeners that `session` is starting.
    ///
    /// # Errors
    ///
    /// Returns the first listener error; later listeners are not notified.
    pub fn session_started(&self, session: &SessionInfo) -> Result<(), PluginError> {
        for plugin in self.plugins.iter() {
            if let Some(listener) = plugin.as_session_listener() {
                listener.session_started(session)?;
            }
        }
        Ok(())
    }

    /// Notify every session listener that `session` ended.
    ///
    /// Returns the errors raised, each already logged.
    pub fn session_ended(
        &self,
        session: &SessionInfo,
        outcome: &SessionOutcome,
    ) -> Vec<PluginError> {
        let mut errors = Vec::new();
        for plugin in self.plugins.iter() {
            let Some(listener) = plugin.as_session_listener() else {
                continue;
            };
            if let Err(err) = listener.session_ended(session, outcome) {
                match err.kind() {
                    PluginErrorKind::System => error!(
                        plugin = err.plugin(),
                        session = %session.id,
                        error = ?err,
                        "session end listener failed"
                    ),
                    PluginErrorKind::Configuration | PluginErrorKind::Data => warn!(
                        plugin = err.plugin(),
                        session = %session.id,
                        detail = %err.detail(),
                        "session end listener failed"
                    ),
                }
                errors.push(err);
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use renamer_core::{Field, Row, Target};
    use renamer_test_support::mocks::{FailingPlugin, RecordingListener};

    fn row() -> Result<Row> {
        Ok(Row::new(
            Target::new("/scan/a.lsm"),
            vec![Field::new("Batch", "B1")],
        )?)
    }

    #[test]
    fn success_path_stops_at_first_listener_error() -> Result<()> {
        let before = Arc::new(RecordingListener::new("before"));
        let after = Arc::new(RecordingListener::new("after"));
        let pipeline = PluginPipeline::from_plugins(vec![
            before.clone(),
            Arc::new(FailingPlugin::listener_on("boom", RowEvent::Start, [0])),
            after.clone(),
        ]);

        let mut row = row()?;
        let mut view = PluginRow::new(0, &mut row);
        pipeline.dispatch(RowEvent::StartRow, &mut view)?;
        let err = pipeline
            .dispatch(RowEvent::Start, &mut view)
            .expect_err("start fails");
        assert_eq!(err.plugin(), "boom");

        assert_eq!(before.events_for(0), [RowEvent::StartRow, RowEvent::Start]);
        assert_eq!(after.events_for(0), [RowEvent::StartRow]);
        Ok(())
    }

    #[test]
    fn end_fail_reaches_every_listener() -> Result<()> {
        let after = Arc::new(RecordingListener::new("after"));
        let pipeline = PluginPipeline::from_plugins(vec![
            Arc::new(FailingPlugin::listener_on("boom", RowEvent::EndFail, [0])),
            after.clone(),
        ]);

        let mut row = row()?;
        let mut view = PluginRow::new(0, &mut row);
        let err = pipeline
            .dispatch(RowEvent::EndFail, &mut view)
            .expect_err("first end_fail error is reported");
        assert_eq!(err.plugin(), "boom");
        assert_eq!(after.events_for(0), [RowEvent::EndFail]);
        Ok(())
    }

    #[test]
    fn validators_run_in_order_and_skip_other_roles() -> Result<()> {
        let pipeline = PluginPipeline::from_plugins(vec![
            Arc::new(RecordingListener::new("listener")),
            Arc::new(FailingPlugin::validator_for_value("batch", "Batch", "B1")),
        ]);
        let mut row = row()?;
        let view = PluginRow::new(0, &mut row);
        let err = pipeline.validate(&view).expect_err("B1 rejected");
        assert_eq!(err.kind(), PluginErrorKind::Data);

        let roles: Vec<_> = pipeline
            .describe()
            .map(|(name, roles)| format!("{name}:{}", roles.describe()))
            .collect();
        assert_eq!(
            roles,
            ["listener:row-listener,session-listener", "batch:validator"]
        );
        Ok(())
    }

    #[test]
    fn session_start_refusal_stops_notification() {
        let recorder = Arc::new(RecordingListener::new("recorder"));
        let pipeline = PluginPipeline::from_plugins(vec![
            Arc::new(FailingPlugin::refusing_sessions("gate")),
            recorder.clone(),
        ]);
        let session = SessionInfo::new("screen", 3);
        assert!(pipeline.session_started(&session).is_err());
        assert!(recorder.sessions_started().is_empty());

        let outcome = SessionOutcome {
            cancelled: false,
            processed: 0,
            failures: 0,
            summary: String::new(),
        };
        assert!(pipeline.session_ended(&session, &outcome).is_empty());
        assert_eq!(recorder.sessions_ended(), [outcome]);
    }

    #[test]
    fn clones_share_plugin_instances() -> Result<()> {
        let recorder = Arc::new(RecordingListener::new("recorder"));
        let pipeline = PluginPipeline::from_plugins(vec![recorder.clone()]);
        let clone = pipeline.clone();

        let mut row = row()?;
        clone.dispatch(RowEvent::Start, &mut PluginRow::new(2, &mut row))?;
        assert_eq!(recorder.events_for(2), [RowEvent::Start]);
        assert_eq!(pipeline.len(), 1);
        Ok(())
    }
}
