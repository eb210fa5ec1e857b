//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use renamer_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};

use crate::commands::{handle_describe, handle_run};
use crate::error::CliResult;
use crate::scan::parse_field;

/// Parses CLI arguments, installs logging, and executes the requested
/// command. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli
            .log_format
            .as_deref()
            .map_or_else(LogFormat::infer, LogFormat::from_label),
        build_sha: build_sha(),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging disabled: {err}");
    }

    match dispatch(cli.command).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(command: Command) -> CliResult<()> {
    match command {
        Command::Run(args) => handle_run(args).await,
        Command::Describe(args) => handle_describe(&args),
    }
}

#[derive(Parser)]
#[command(name = "renamer", about = "Rename, copy, and move files into derived folders")]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "RENAMER_LOG",
        default_value = DEFAULT_LOG_LEVEL
    )]
    log_level: String,
    #[arg(
        long,
        global = true,
        env = "RENAMER_LOG_FORMAT",
        help = "Log format: json or pretty"
    )]
    log_format: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transfer every matching entry of a source directory.
    Run(RunArgs),
    /// Show the output recipe and plugin chain of a project.
    Describe(DescribeArgs),
}

#[derive(Args)]
pub(crate) struct RunArgs {
    /// Project file (JSON).
    #[arg(long, short = 'p')]
    pub(crate) project: PathBuf,
    /// Directory whose entries become rows.
    #[arg(long, short = 's')]
    pub(crate) source: PathBuf,
    /// Glob on entry names; repeatable. Defaults to every entry.
    #[arg(long = "include", short = 'i')]
    pub(crate) include: Vec<String>,
    /// Operator field for every row, as NAME=VALUE; repeatable.
    #[arg(long = "field", short = 'f', value_parser = parse_field)]
    pub(crate) fields: Vec<(String, String)>,
    /// Empty field filled in by a plugin, e.g. a sequence number; repeatable.
    #[arg(long = "plugin-field")]
    pub(crate) plugin_fields: Vec<String>,
    /// Use this directory for the whole session instead of the project recipe.
    #[arg(long)]
    pub(crate) output_dir: Option<PathBuf>,
    /// Move instead of copy.
    #[arg(long = "move")]
    pub(crate) move_files: bool,
    /// Replace existing destinations.
    #[arg(long)]
    pub(crate) overwrite: bool,
}

#[derive(Args)]
pub(crate) struct DescribeArgs {
    /// Project file (JSON).
    #[arg(long, short = 'p')]
    pub(crate) project: PathBuf,
    #[arg(
        long = "output",
        alias = "format",
        value_enum,
        default_value_t = OutputFormat::Table
    )]
    pub(crate) format: OutputFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}
