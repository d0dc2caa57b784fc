pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "brokerdesk",
    about = "Brokerdesk operator CLI",
    long_about = "Inspect configuration, check readiness, list CRM tools, and run one-off assistant queries.",
    after_help = "Examples:\n  brokerdesk doctor --json\n  brokerdesk tools\n  brokerdesk ask --role broker --owner-id U1 \"mis leads de esta semana\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, provider strategy, tool catalog and CRM routes")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List the CRM tools exposed to the model")]
    Tools {
        #[arg(long, help = "Emit the tool definitions as JSON")]
        json: bool,
    },
    #[command(about = "Run one assistant query against the configured model and CRM")]
    Ask {
        #[arg(long, default_value = "broker", help = "admin or broker")]
        role: String,
        #[arg(long, help = "CRM user id used to scope broker queries")]
        owner_id: Option<String>,
        #[arg(long, default_value = "Operador", help = "Display name shown to the model")]
        name: String,
        query: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Tools { json } => {
            commands::CommandResult { exit_code: 0, output: commands::tools::run(json) }
        }
        Command::Ask { role, owner_id, name, query } => {
            commands::ask::run(commands::ask::AskArgs { role, owner_id, name, query })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
