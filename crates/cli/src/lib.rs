pub mod commands;

use clap::{Parser, Subcommand};
use deskbook_core::config::{AppConfig, LogFormat};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "deskbook",
    about = "Deskbook operator CLI",
    long_about = "Operate the desk booking bot: migrations, readiness checks, and the daily roster announcement.",
    after_help = "Examples:\n  deskbook doctor --json\n  deskbook migrate\n  deskbook announce"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Validate config, Slack settings, and database readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Post the roster for the next workday to the announcement channel (run on a schedule)"
    )]
    Announce,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Announce => commands::announce::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays a single JSON outcome line.
pub fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(log_level);

    // A subscriber may already be installed when commands run in-process.
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
