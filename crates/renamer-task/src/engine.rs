//! Session state machine.
//!
//! # Design
//! - Configuration is checked in [`TaskBuilder::prepare`], before any row is
//!   touched. Session listeners run synchronously in [`Task::start`].
//! - Each row threads a `Result` through its stages; the first failure skips
//!   the remaining success-path stages and `EndFail` listeners run instead.
//! - Row failures are logged, counted and summarised; they never stop the
//!   session.
//! - Progress and the terminal notice travel on one channel, so the notice is
//!   always the last message the observer sees.

use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use renamer_config::{
    OutputDirectoryConfig, ProjectConfig, TransferMode, TransferSettings, VerifiedOutputDirectory,
};
use renamer_core::{
    PluginError, PluginErrorKind, PluginRow, Row, RowEvent, SessionInfo, SessionOutcome,
};
use renamer_events::{CompletionNotice, EventPublisher, EventStream, ProgressSnapshot, TaskState};
use renamer_fsops::{FsOpsError, TransferReport};
use renamer_plugins::PluginPipeline;
use renamer_telemetry::{Metrics, RowOutcomeLabel};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::error::{TaskError, TaskResult};
use crate::progress::ProgressTracker;
use crate::summary::{FailureKind, RowOutcome, RowReport, TaskSummary};

/// Collects everything a session needs before it is verified.
#[derive(Debug)]
pub struct TaskBuilder {
    name: String,
    rows: Vec<Row>,
    output_directory: OutputDirectoryConfig,
    transfer: TransferSettings,
    pipeline: PluginPipeline,
    metrics: Option<Metrics>,
    working_directory: Option<PathBuf>,
}

impl TaskBuilder {
    /// Builder for a session named `name` over `rows`, in processing order.
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
            output_directory: OutputDirectoryConfig::default(),
            transfer: TransferSettings::default(),
            pipeline: PluginPipeline::default(),
            metrics: None,
            working_directory: None,
        }
    }

    /// Builder seeded from a project file. The pipeline is built by the
    /// caller so that it can be shared between sessions.
    pub fn from_project(project: &ProjectConfig, pipeline: PluginPipeline, rows: Vec<Row>) -> Self {
        Self::new(project.name.clone(), rows)
            .output_directory(project.output_directory.clone())
            .transfer(project.transfer)
            .pipeline(pipeline)
    }

    /// Destination directory recipe.
    #[must_use]
    pub fn output_directory(mut self, output_directory: OutputDirectoryConfig) -> Self {
        self.output_directory = output_directory;
        self
    }

    /// Transfer behaviour.
    #[must_use]
    pub fn transfer(mut self, transfer: TransferSettings) -> Self {
        self.transfer = transfer;
        self
    }

    /// Initialised plugins.
    #[must_use]
    pub fn pipeline(mut self, pipeline: PluginPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Metrics registry shared with other sessions.
    #[must_use]
    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Directory relative output bases resolve against. Defaults to the
    /// process working directory.
    #[must_use]
    pub fn working_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(directory.into());
        self
    }

    /// Verify the configuration and derive the session destination.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Configuration`] when the output recipe is rejected or
    ///   the session directory cannot be derived.
    /// - [`TaskError::WorkingDirectory`] when no working directory was given
    ///   and the process one is unavailable.
    /// - [`TaskError::Metrics`] when a default registry cannot be built.
    pub fn prepare(self) -> TaskResult<Task> {
        let cwd = match self.working_directory {
            Some(directory) => directory,
            None => std::env::current_dir()
                .map_err(|source| TaskError::WorkingDirectory { source })?,
        };
        let output = self.output_directory.verify(&cwd).map_err(|source| {
            TaskError::Configuration {
                operation: "output_directory.verify",
                source,
            }
        })?;
        let session_destination = if output.is_session_scoped() {
            let directory = output.derive_for_session(&self.rows).map_err(|source| {
                TaskError::Configuration {
                    operation: "output_directory.derive_session",
                    source,
                }
            })?;
            Some(directory)
        } else {
            None
        };
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Metrics::new().map_err(|source| TaskError::Metrics { source })?,
        };

        let session = SessionInfo::new(self.name, self.rows.len());
        info!(
            task_id = %session.id,
            session = %session.name,
            rows = session.row_count,
            output = %output.base().display(),
            session_destination = ?session_destination,
            mode = self.transfer.mode.as_str(),
            plugins = self.pipeline.len(),
            "task prepared"
        );
        Ok(Task {
            session,
            rows: self.rows,
            output,
            session_destination,
            transfer: self.transfer,
            pipeline: self.pipeline,
            metrics,
            cancel: CancelToken::new(),
            state: TaskState::NotStarted,
        })
    }
}

/// A verified session, ready to run once.
#[derive(Debug)]
pub struct Task {
    session: SessionInfo,
    rows: Vec<Row>,
    output: VerifiedOutputDirectory,
    session_destination: Option<PathBuf>,
    transfer: TransferSettings,
    pipeline: PluginPipeline,
    metrics: Metrics,
    cancel: CancelToken,
    state: TaskState,
}

/// Handles to a task running on its worker thread.
#[derive(Debug)]
pub struct TaskHandle {
    /// Task identifier, equal to the session id.
    pub id: Uuid,
    /// Stops the task before its next row.
    pub cancel: CancelToken,
    /// Progress envelopes followed by one completion notice.
    pub events: EventStream,
    /// Worker thread; yields the final report.
    pub join: JoinHandle<TaskReport>,
}

/// Final account of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    /// Task identifier.
    pub task_id: Uuid,
    /// Terminal state.
    pub state: TaskState,
    /// Number of failed rows.
    pub failures: usize,
    /// Every processed row, in order.
    pub rows: Vec<RowReport>,
    /// Rendered summary text.
    pub summary: String,
}

struct RowFailure {
    kind: FailureKind,
    reason: String,
    stage: RowEvent,
}

impl Task {
    /// Task identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.session.id
    }

    /// Session identity handed to listeners.
    #[must_use]
    pub const fn session(&self) -> &SessionInfo {
        &self.session
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    /// Token that cancels this task.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Directory shared by every row, when derived once per session.
    #[must_use]
    pub fn session_destination(&self) -> Option<&Path> {
        self.session_destination.as_deref()
    }

    /// Notify session listeners, then process rows on a named worker thread.
    ///
    /// # Errors
    ///
    /// - [`TaskError::SessionStart`] when a session listener refuses.
    /// - [`TaskError::Spawn`] when the worker cannot be spawned.
    pub fn start(self) -> TaskResult<TaskHandle> {
        self.begin_session()?;
        let id = self.id();
        let cancel = self.cancel_token();
        let (publisher, events) = renamer_events::channel(id);
        let join = thread::Builder::new()
            .name(format!("renamer-task-{}", id.simple()))
            .spawn(move || self.process(&publisher))
            .map_err(|source| TaskError::Spawn { task_id: id, source })?;
        Ok(TaskHandle {
            id,
            cancel,
            events,
            join,
        })
    }

    /// Run the whole session on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::SessionStart`] when a session listener refuses;
    /// no row is touched in that case.
    pub fn run(self, publisher: &EventPublisher) -> TaskResult<TaskReport> {
        self.begin_session()?;
        Ok(self.process(publisher))
    }

    fn begin_session(&self) -> TaskResult<()> {
        self.pipeline
            .session_started(&self.session)
            .map_err(|source| {
                warn!(
                    task_id = %self.session.id,
                    plugin = source.plugin(),
                    detail = %source.detail(),
                    "session start refused"
                );
                self.metrics
                    .inc_plugin_error(source.plugin(), source.kind().as_str());
                TaskError::SessionStart {
                    session: self.session.id,
                    source,
                }
            })
    }

    fn process(mut self, publisher: &EventPublisher) -> TaskReport {
        self.state = TaskState::Running;
        let total = self.rows.len();
        info!(task_id = %self.session.id, rows = total, "task running");

        let sizes: Vec<u64> = self.rows.iter().map(|row| row.target().size_bytes()).collect();
        let mut progress = ProgressTracker::new(&sizes);
        let mut summary = TaskSummary::new(&self.session.name, total);
        let mut reports = Vec::with_capacity(total);

        let rows = std::mem::take(&mut self.rows);
        for (index, mut row) in rows.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(
                    task_id = %self.session.id,
                    next_row = index,
                    "cancellation observed; no further rows start"
                );
                self.state = TaskState::Cancelled;
                break;
            }

            let report = self.process_row(index, &mut row);
            let percent = progress.advance(index);
            self.publish_progress(
                publisher,
                ProgressSnapshot {
                    row_index: index,
                    total_rows: total,
                    percent,
                    status: report.status_line(total),
                },
            );
            summary.record(&report);
            reports.push(report);
        }
        if self.state == TaskState::Running {
            self.state = TaskState::Completed;
        }

        let rendered = summary.render();
        let outcome = SessionOutcome {
            cancelled: self.state == TaskState::Cancelled,
            processed: reports.len(),
            failures: summary.failed(),
            summary: rendered.clone(),
        };
        for err in self.pipeline.session_ended(&self.session, &outcome) {
            self.metrics.inc_plugin_error(err.plugin(), err.kind().as_str());
        }
        self.metrics.inc_task_finished(self.state.as_str());
        info!(
            task_id = %self.session.id,
            state = self.state.as_str(),
            processed = reports.len(),
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "task finished"
        );

        if let Err(err) = publisher.complete(CompletionNotice {
            state: self.state,
            failures: summary.failed(),
            summary: rendered.clone(),
        }) {
            warn!(
                task_id = %self.session.id,
                event_id = ?err.event_id(),
                event_kind = err.event_kind(),
                error = %err,
                "failed to publish completion"
            );
        }

        TaskReport {
            task_id: self.session.id,
            state: self.state,
            failures: summary.failed(),
            rows: reports,
            summary: rendered,
        }
    }

    fn process_row(&self, index: usize, row: &mut Row) -> RowReport {
        let source = row.target().path().to_path_buf();
        let mut view = PluginRow::new(index, row);
        let result = self.run_row(&mut view);
        let destination = view.destination().map(Path::to_path_buf);

        let outcome = match result {
            Ok(transfer) => {
                self.metrics.inc_row(RowOutcomeLabel::Succeeded);
                self.metrics.add_transfer_bytes(transfer.bytes);
                info!(
                    task_id = %self.session.id,
                    row = index,
                    source = %source.display(),
                    destination = ?destination,
                    bytes = transfer.bytes,
                    renamed = transfer.renamed,
                    digest = ?transfer.digest.as_ref().map(ToString::to_string),
                    "row succeeded"
                );
                RowOutcome::Succeeded {
                    bytes: transfer.bytes,
                    renamed: transfer.renamed,
                }
            }
            Err(failure) => {
                if failure.stage != RowEvent::EndSuccess {
                    if let Err(err) = self.pipeline.dispatch(RowEvent::EndFail, &mut view) {
                        self.metrics.inc_plugin_error(err.plugin(), err.kind().as_str());
                    }
                }
                self.metrics.inc_row(RowOutcomeLabel::Failed);
                RowOutcome::Failed {
                    kind: failure.kind,
                    reason: failure.reason,
                }
            }
        };

        RowReport {
            index,
            source,
            destination,
            outcome,
        }
    }

    fn run_row(&self, view: &mut PluginRow<'_>) -> Result<TransferReport, RowFailure> {
        if let Err(err) = self.pipeline.dispatch(RowEvent::StartRow, view) {
            return Err(self.plugin_failure(view, RowEvent::StartRow, &err));
        }

        let destination = self.destination_for(view)?;
        view.set_destination(destination.clone());

        if let Err(err) = self.pipeline.validate(view) {
            return Err(self.plugin_failure(view, RowEvent::Start, &err));
        }
        if let Err(err) = self.pipeline.dispatch(RowEvent::Start, view) {
            return Err(self.plugin_failure(view, RowEvent::Start, &err));
        }

        let transfer = match self.transfer_row(view.source(), &destination) {
            Ok(transfer) => transfer,
            Err(err) => return Err(self.transfer_failure(view, &destination, &err)),
        };

        if let Err(err) = self.pipeline.dispatch(RowEvent::EndSuccess, view) {
            return Err(self.plugin_failure(view, RowEvent::EndSuccess, &err));
        }
        Ok(transfer)
    }

    fn destination_for(&self, view: &PluginRow<'_>) -> Result<PathBuf, RowFailure> {
        let directory = match &self.session_destination {
            Some(directory) => directory.clone(),
            None => self.output.derive_for_row(view.row()).map_err(|err| {
                warn!(
                    task_id = %self.session.id,
                    row = view.row_index(),
                    source = %view.source().display(),
                    detail = %err.detail(),
                    "destination could not be derived"
                );
                RowFailure {
                    kind: FailureKind::System,
                    reason: err.detail(),
                    stage: RowEvent::StartRow,
                }
            })?,
        };
        let destination = directory.join(view.destination_file_name());
        debug!(
            task_id = %self.session.id,
            row = view.row_index(),
            destination = %destination.display(),
            "destination composed"
        );
        Ok(destination)
    }

    fn transfer_row(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<TransferReport, FsOpsError> {
        let transfer = self.transfer.safe_transfer();
        let overwrite = self.transfer.overwrite_allowed;
        match self.transfer.mode {
            TransferMode::Copy => transfer.copy(source, destination, overwrite),
            TransferMode::Move => transfer.move_path(source, destination, overwrite),
        }
    }

    fn plugin_failure(
        &self,
        view: &PluginRow<'_>,
        stage: RowEvent,
        err: &PluginError,
    ) -> RowFailure {
        self.metrics.inc_plugin_error(err.plugin(), err.kind().as_str());
        let kind = match err.kind() {
            PluginErrorKind::Data => {
                warn!(
                    task_id = %self.session.id,
                    row = view.row_index(),
                    plugin = err.plugin(),
                    stage = stage.as_str(),
                    source = %view.source().display(),
                    detail = %err.detail(),
                    "row rejected by plugin"
                );
                FailureKind::Data
            }
            PluginErrorKind::System | PluginErrorKind::Configuration => {
                error!(
                    task_id = %self.session.id,
                    row = view.row_index(),
                    plugin = err.plugin(),
                    stage = stage.as_str(),
                    source = %view.source().display(),
                    destination = ?view.destination(),
                    error = ?err,
                    "plugin failed while processing row"
                );
                if err.kind() == PluginErrorKind::System {
                    FailureKind::System
                } else {
                    FailureKind::Configuration
                }
            }
        };
        RowFailure {
            kind,
            reason: err.detail(),
            stage,
        }
    }

    fn transfer_failure(
        &self,
        view: &PluginRow<'_>,
        destination: &Path,
        err: &FsOpsError,
    ) -> RowFailure {
        let kind = match err {
            FsOpsError::Integrity { .. } => FailureKind::Integrity,
            FsOpsError::SourceRetained { .. } => FailureKind::PartialSuccess,
            FsOpsError::MissingSource { .. }
            | FsOpsError::DestinationExists { .. }
            | FsOpsError::SamePath { .. } => FailureKind::Data,
            FsOpsError::Io { .. } | FsOpsError::Walkdir { .. } => FailureKind::System,
        };
        match kind {
            FailureKind::Data | FailureKind::Integrity => warn!(
                task_id = %self.session.id,
                row = view.row_index(),
                source = %view.source().display(),
                destination = %destination.display(),
                kind = kind.as_str(),
                detail = %err.detail(),
                "transfer failed"
            ),
            _ => error!(
                task_id = %self.session.id,
                row = view.row_index(),
                source = %view.source().display(),
                destination = %destination.display(),
                kind = kind.as_str(),
                error = ?err,
                "transfer failed"
            ),
        }
        RowFailure {
            kind,
            reason: err.detail(),
            stage: RowEvent::Start,
        }
    }

    fn publish_progress(&self, publisher: &EventPublisher, snapshot: ProgressSnapshot) {
        if let Err(err) = publisher.progress(snapshot) {
            warn!(
                task_id = %self.session.id,
                event_id = ?err.event_id(),
                event_kind = err.event_kind(),
                error = %err,
                "failed to publish progress"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use renamer_core::Field;
    use renamer_test_support::fixtures::Workspace;

    fn per_row_output(workspace: &Workspace) -> OutputDirectoryConfig {
        OutputDirectoryConfig {
            components: vec![
                renamer_config::PathComponent::literal(workspace.output_dir().to_string_lossy()),
                renamer_config::PathComponent::wrapped_field("Batch", "/", ""),
            ],
            ..OutputDirectoryConfig::default()
        }
    }

    #[test]
    fn prepare_rejects_unusable_output_before_touching_rows() -> Result<()> {
        let workspace = Workspace::new()?;
        let rows = workspace.batch_rows(&[("a.lsm", "B1")])?;
        let err = TaskBuilder::new("screen", rows)
            .output_directory(OutputDirectoryConfig {
                components: vec![renamer_config::PathComponent::literal(
                    workspace.root().join("missing").to_string_lossy(),
                )],
                ..OutputDirectoryConfig::default()
            })
            .prepare()
            .expect_err("missing base");
        assert!(err.is_configuration());
        assert!(workspace.source_dir().join("a.lsm").exists());
        Ok(())
    }

    #[test]
    fn per_row_destinations_follow_field_values() -> Result<()> {
        let workspace = Workspace::new()?;
        let rows = workspace.batch_rows(&[("a.lsm", "B1"), ("b.lsm", "B2")])?;
        let task = TaskBuilder::new("screen", rows)
            .output_directory(per_row_output(&workspace))
            .prepare()?;
        assert_eq!(task.state(), TaskState::NotStarted);
        assert!(task.session_destination().is_none());

        let (publisher, _events) = renamer_events::channel(task.id());
        let report = task.run(&publisher)?;
        assert_eq!(report.state, TaskState::Completed);
        assert_eq!(report.failures, 0);
        assert_eq!(
            report.rows[1].destination.as_deref(),
            Some(workspace.output_dir().join("B2").join("B2.lsm").as_path())
        );
        assert!(workspace.output_dir().join("B1").join("B1.lsm").is_file());
        assert!(publisher.is_completed());
        Ok(())
    }

    #[test]
    fn manual_output_directory_is_shared_by_every_row() -> Result<()> {
        let workspace = Workspace::new()?;
        let chosen = workspace.root().join("chosen");
        let rows = vec![
            workspace.row("x.lsm", vec![Field::new("Batch", "B9")])?,
            workspace.row("y.lsm", vec![Field::metadata("Note", "kept")])?,
        ];
        workspace.write_source("x.lsm", b"x")?;
        workspace.write_source("y.lsm", b"y")?;

        let task = TaskBuilder::new("screen", rows)
            .output_directory(OutputDirectoryConfig::manual(&chosen))
            .prepare()?;
        assert_eq!(task.session_destination(), Some(chosen.as_path()));

        let (publisher, _events) = renamer_events::channel(task.id());
        let report = task.run(&publisher)?;
        assert_eq!(report.failures, 0);
        assert!(chosen.join("B9.lsm").is_file());
        assert!(chosen.join("y.lsm").is_file());
        Ok(())
    }
}
