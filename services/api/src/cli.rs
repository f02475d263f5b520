use crate::commands::{
    run_evaluate, run_logs_export, run_logs_import, run_normalize, run_rules, EvaluateArgs,
    LogsExportArgs, LogsImportArgs, NormalizeArgs, RulesArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use uw_engine::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Underwriting Engine",
    about = "Evaluate clients against carrier underwriting rules from the command line or over HTTP",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Evaluate a client against one or more carriers
    Evaluate(EvaluateArgs),
    /// List carrier rules with normalized outcomes and duplicate criteria
    Rules(RulesArgs),
    /// Map raw outcome labels onto the configured vocabulary
    Normalize(NormalizeArgs),
    /// Manage the outcome log book
    Logs {
        #[command(subcommand)]
        command: LogsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum LogsCommand {
    /// Write the outcome logs as a JSON array
    Export(LogsExportArgs),
    /// Replace the outcome logs with a JSON array read from a file
    Import(LogsImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Evaluate(args) => run_evaluate(args),
        Command::Rules(args) => run_rules(args),
        Command::Normalize(args) => run_normalize(args),
        Command::Logs {
            command: LogsCommand::Export(args),
        } => run_logs_export(args),
        Command::Logs {
            command: LogsCommand::Import(args),
        } => run_logs_import(args),
    }
}
