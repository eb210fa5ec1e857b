//! Command handlers.

mod describe;
mod run;

pub(crate) use describe::handle_describe;
pub(crate) use run::handle_run;

use std::path::Path;

use renamer_config::ProjectConfig;
use renamer_plugins::{PluginPipeline, PluginRegistry};

use crate::error::{CliError, CliResult};

/// Load a project file and build its plugin chain from the built-in kinds.
fn load_project(path: &Path) -> CliResult<(ProjectConfig, PluginPipeline)> {
    let project = ProjectConfig::load(path).map_err(|err| CliError::validation(err.detail()))?;
    let pipeline = PluginRegistry::with_builtins()
        .build(&project.plugins)
        .map_err(|err| CliError::validation(err.detail()))?;
    Ok((project, pipeline))
}
