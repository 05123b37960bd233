pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "orderbot",
    about = "Orderbot operator CLI",
    long_about = "Inspect configuration, check readiness, migrate the sqlite ledger, and chat with the bot from a terminal.",
    after_help = "Examples:\n  orderbot doctor --json\n  orderbot config\n  orderbot chat --conversation demo"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending ledger migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, AppSheet credentials, database and backend wiring")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Talk to the bot on stdin/stdout; /quit ends the session")]
    Chat {
        #[arg(long, default_value = commands::chat::DEFAULT_CONVERSATION, help = "Conversation id to use")]
        conversation: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            let (passed, output) = commands::doctor::run(json);
            commands::CommandResult { exit_code: if passed { 0 } else { 1 }, output }
        }
        Command::Chat { conversation } => {
            init_logging();
            commands::chat::run(&conversation)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Chat owns stdout, so logs go to stderr and stay quiet unless `RUST_LOG` asks.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .compact()
        .try_init();
}
