use crate::cli::DescribeArgs;
use crate::error::CliResult;
use crate::output::render_description;

use super::load_project;

pub(crate) fn handle_describe(args: &DescribeArgs) -> CliResult<()> {
    let (project, pipeline) = load_project(&args.project)?;
    let plugins: Vec<_> = pipeline
        .describe()
        .map(|(name, roles)| (name.to_string(), roles))
        .collect();
    render_description(&project, &plugins, args.format)
}
