use std::path::PathBuf;

use clap::{Parser, Subcommand};

fn parse_non_empty(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("value cannot be empty".to_string());
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Parser)]
#[command(
    name = "triage",
    about = "Approval-gated IT support triage service",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long,
        env = "TRIAGE_CONFIG",
        help = "Path to the JSON configuration file. Built-in defaults are used when omitted."
    )]
    pub(crate) config: Option<PathBuf>,

    #[arg(
        long = "state-dir",
        env = "TRIAGE_STATE_DIR",
        default_value = ".triage",
        help = "Directory holding tickets.json, feedback.jsonl and command-audit.jsonl"
    )]
    pub(crate) state_dir: PathBuf,

    #[arg(
        long = "reasoning-mode",
        env = "TRIAGE_REASONING_MODE",
        value_parser = ["ollama", "rules"],
        help = "Override reasoning.mode from the configuration"
    )]
    pub(crate) reasoning_mode: Option<String>,

    #[arg(
        long = "ollama-url",
        env = "TRIAGE_OLLAMA_URL",
        help = "Override reasoning.api_base from the configuration"
    )]
    pub(crate) ollama_url: Option<String>,

    #[arg(
        long = "runner-mode",
        env = "TRIAGE_RUNNER_MODE",
        value_parser = ["ssh", "simulated"],
        help = "Override runner.mode from the configuration"
    )]
    pub(crate) runner_mode: Option<String>,

    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub(crate) enum CliCommand {
    /// Serve the HTTP API.
    Serve {
        #[arg(long, env = "TRIAGE_BIND", default_value = "127.0.0.1:8080")]
        bind: String,
    },
    /// Submit an issue and print the resulting ticket.
    Submit {
        #[arg(required = true, num_args = 1.., help = "Issue text")]
        issue: Vec<String>,
    },
    /// Approve and execute the stored plan of a ticket.
    Approve {
        #[arg(value_parser = parse_non_empty)]
        ticket_id: String,
        #[arg(long, env = "TRIAGE_PRINCIPAL", value_parser = parse_non_empty)]
        principal: String,
    },
    /// List tickets, or print one in full.
    Tickets {
        #[arg(long)]
        id: Option<String>,
    },
    /// Load and validate the configuration, then print a summary.
    CheckConfig,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn unit_submit_joins_issue_words() {
        let cli = Cli::try_parse_from(["triage", "submit", "nginx", "returns", "502"])
            .expect("parse");
        match cli.command {
            CliCommand::Submit { issue } => assert_eq!(issue.join(" "), "nginx returns 502"),
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.state_dir, PathBuf::from(".triage"));
    }

    #[test]
    fn unit_approve_requires_principal() {
        let parsed = Cli::try_parse_from([
            "triage",
            "approve",
            "ticket-1",
            "--principal",
            "system",
        ])
        .expect("parse");
        match parsed.command {
            CliCommand::Approve {
                ticket_id,
                principal,
            } => {
                assert_eq!(ticket_id, "ticket-1");
                assert_eq!(principal, "system");
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["triage", "approve", "ticket-1", "--principal", " "]).is_err());
    }

    #[test]
    fn unit_mode_overrides_are_restricted() {
        assert!(Cli::try_parse_from(["triage", "--runner-mode", "telnet", "check-config"]).is_err());
        let cli = Cli::try_parse_from(["triage", "--runner-mode", "ssh", "check-config"])
            .expect("parse");
        assert_eq!(cli.runner_mode.as_deref(), Some("ssh"));
    }
}
