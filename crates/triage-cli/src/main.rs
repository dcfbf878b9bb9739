mod bootstrap;
mod cli_args;
mod commands;

use anyhow::Result;
use clap::Parser;

use crate::bootstrap::{build_runtime, init_tracing, resolve_config};
use crate::cli_args::{Cli, CliCommand};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    if let CliCommand::CheckConfig = cli.command {
        println!("{}", commands::render_config_summary(&config));
        return Ok(());
    }

    let runtime = build_runtime(&config, &cli.state_dir)?;
    match cli.command {
        CliCommand::Serve { bind } => commands::run_serve(runtime, bind).await,
        CliCommand::Submit { issue } => commands::run_submit(&runtime, &issue.join(" ")).await,
        CliCommand::Approve {
            ticket_id,
            principal,
        } => commands::run_approve(&runtime, &ticket_id, &principal).await,
        CliCommand::Tickets { id } => commands::run_tickets(&runtime, id.as_deref()).await,
        CliCommand::CheckConfig => Ok(()),
    }
}
