pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "callbrief",
    about = "Callbrief operator CLI",
    long_about = "Inspect callbrief configuration, check integration readiness, and dry-run the \
                  context and prompt built for a webhook payload.",
    after_help = "Examples:\n  callbrief doctor --json\n  callbrief config\n  \
                  callbrief render payload.json --now 2026-10-14T09:00:00Z"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Validate config and check that the agent and sandbox endpoints answer")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Print the sandbox files and instructions built for a payload, offline")]
    Render {
        #[arg(help = "Path to a webhook payload JSON file")]
        payload: PathBuf,
        #[arg(long, help = "RFC 3339 timestamp to embed instead of the current time")]
        now: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Render { payload, now } => commands::render::run(&payload, now.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
