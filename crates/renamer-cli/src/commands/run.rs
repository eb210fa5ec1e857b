use std::io;

use anyhow::anyhow;
use renamer_config::{OutputDirectoryConfig, ProjectConfig, TransferMode};
use renamer_task::{CancelToken, TaskBuilder, TaskHandle, TaskState};
use tokio::signal;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::{CliError, CliResult};
use crate::output::{render_progress, render_summary};
use crate::scan::{build_rows, include_set, scan_targets};

use super::load_project;

pub(crate) async fn handle_run(args: RunArgs) -> CliResult<()> {
    let (mut project, pipeline) = load_project(&args.project)?;
    apply_overrides(&mut project, &args);

    let include = include_set(&args.include)
        .map_err(|err| CliError::validation(format!("{err:#}")))?;
    let targets = scan_targets(&args.source, include.as_ref()).map_err(CliError::failure)?;
    if targets.is_empty() {
        return Err(CliError::validation(format!(
            "no entries of {} matched",
            args.source.display()
        )));
    }
    let rows = build_rows(targets, &args.fields, &args.plugin_fields)
        .map_err(|err| CliError::validation(format!("{err:#}")))?;

    let task = TaskBuilder::from_project(&project, pipeline, rows).prepare()?;
    info!(
        task_id = %task.id(),
        rows = task.session().row_count,
        mode = project.transfer.mode.as_str(),
        "starting session"
    );
    let TaskHandle {
        cancel,
        mut events,
        join,
        ..
    } = task.start()?;

    let mut watch_interrupts = true;
    loop {
        tokio::select! {
            batch = events.next_batch() => {
                let Some(batch) = batch else { break };
                if let Some(snapshot) = batch.progress() {
                    render_progress(snapshot);
                }
                if batch.is_final() {
                    break;
                }
            }
            result = signal::ctrl_c(), if watch_interrupts => {
                watch_interrupts = false;
                handle_interrupt(result, &cancel);
            }
        }
    }

    let report = tokio::task::spawn_blocking(move || join.join())
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to await task worker: {err}")))?
        .map_err(|_| CliError::failure(anyhow!("task worker panicked")))?;
    render_summary(&report.summary);

    if report.failures > 0 {
        return Err(CliError::RowsFailed(report.failures));
    }
    if report.state == TaskState::Cancelled {
        return Err(CliError::failure(anyhow!(
            "session cancelled after {} rows",
            report.rows.len()
        )));
    }
    Ok(())
}

/// Cancels on a delivered interrupt. A listener that could not be installed
/// leaves the session running.
fn handle_interrupt(result: io::Result<()>, cancel: &CancelToken) {
    match result {
        Ok(()) => {
            warn!("interrupt received; stopping after the current row");
            cancel.cancel();
        }
        Err(err) => warn!(error = %err, "failed to listen for interrupts"),
    }
}

fn apply_overrides(project: &mut ProjectConfig, args: &RunArgs) {
    if let Some(directory) = &args.output_dir {
        project.output_directory = OutputDirectoryConfig::manual(directory.clone());
    }
    if args.move_files {
        project.transfer.mode = TransferMode::Move;
    }
    if args.overwrite {
        project.transfer.overwrite_allowed = true;
    }
}
