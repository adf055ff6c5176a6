pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "concierge",
    about = "Concierge operator CLI",
    long_about = "Inspect configuration, check domain agent readiness, and send messages through the router.",
    after_help = "Examples:\n  concierge doctor --json\n  concierge config\n  concierge send \"recommend a travel card\""
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
    #[command(about = "Validate config, domain tool sets, and domain agent health")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
        #[arg(long, help = "Skip HTTP health probes of configured domain agents")]
        offline: bool,
    },
    #[command(about = "Send one message through the router and print the reply")]
    Send {
        #[arg(help = "Message text")]
        text: String,
        #[arg(long, help = "Continue an existing session")]
        session: Option<String>,
        #[arg(long, help = "Router base URL (defaults to the configured bind address and port)")]
        router_url: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json, offline } => commands::doctor::run(json, !offline),
        Command::Send { text, session, router_url } => {
            commands::send::run(&text, session.as_deref(), router_url.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
