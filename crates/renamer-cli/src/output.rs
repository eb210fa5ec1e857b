//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use renamer_config::ProjectConfig;
use renamer_core::PluginRoles;
use renamer_events::ProgressSnapshot;
use serde_json::{Value, json};

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};

pub(crate) fn render_progress(snapshot: &ProgressSnapshot) {
    eprintln!("{}", progress_line(snapshot));
}

pub(crate) fn render_summary(summary: &str) {
    print!("{summary}");
}

pub(crate) fn render_description(
    project: &ProjectConfig,
    plugins: &[(String, PluginRoles)],
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(&description_json(project, plugins))
                .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
            println!("{text}");
        }
        OutputFormat::Table => print!("{}", description_table(project, plugins)),
    }
    Ok(())
}

fn progress_line(snapshot: &ProgressSnapshot) -> String {
    format!("[{:>3}%] {}", snapshot.percent, snapshot.status)
}

fn description_json(project: &ProjectConfig, plugins: &[(String, PluginRoles)]) -> Value {
    let output = &project.output_directory;
    json!({
        "name": project.name,
        "output_directory": {
            "recipe": output.description(),
            "manually_chosen": output.manually_chosen,
            "derive_for_session": output.derive_for_session,
        },
        "transfer": {
            "mode": project.transfer.mode.as_str(),
            "overwrite_allowed": project.transfer.overwrite_allowed,
            "digest": project.transfer.digest.as_str(),
            "atomic_rename": project.transfer.atomic_rename,
        },
        "plugins": plugins
            .iter()
            .map(|(name, roles)| json!({ "name": name, "roles": roles.describe() }))
            .collect::<Vec<_>>(),
    })
}

fn description_table(project: &ProjectConfig, plugins: &[(String, PluginRoles)]) -> String {
    let output = &project.output_directory;
    let transfer = &project.transfer;
    let scope = if output.derive_for_session {
        "session"
    } else {
        "row"
    };
    let mut text = String::new();
    text.push_str(&format!("project: {}\n", project.name));
    text.push_str(&format!("output: {} (per {scope})\n", output.description()));
    text.push_str(&format!(
        "transfer: {} digest={} overwrite={} atomic_rename={}\n",
        transfer.mode.as_str(),
        transfer.digest.as_str(),
        transfer.overwrite_allowed,
        transfer.atomic_rename
    ));
    if plugins.is_empty() {
        text.push_str("plugins: none\n");
        return text;
    }
    text.push_str(&format!("{:<24} ROLES\n", "PLUGIN"));
    for (name, roles) in plugins {
        text.push_str(&format!("{name:<24} {}\n", roles.describe()));
    }
    text
}
