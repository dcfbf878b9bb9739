//! Remote command execution behind the per-server allow-list.
//!
//! [`GuardedRunner`] is the only path from a plan to a server. It refuses
//! commands carrying shell metacharacters or missing from the allow-list, and
//! bounds every dispatch with a timeout before handing it to a [`CommandTransport`].

mod guarded_runner;
mod output;
mod simulated_transport;
mod ssh_transport;

use async_trait::async_trait;
use triage_core::{CommandOutcome, ServerSpec};

pub use guarded_runner::{GuardedRunner, GuardedRunnerConfig};
pub use output::truncate_output;
pub use simulated_transport::SimulatedTransport;
pub use ssh_transport::{discover_vagrant_private_key, SshTransport, SshTransportConfig};

/// Moves one already-permitted command to a server and reports what happened.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn dispatch(&self, server: &str, spec: &ServerSpec, command: &str) -> CommandOutcome;
}

/// Runs a command on a named inventory server.
#[async_trait]
pub trait RemoteCommandRunner: Send + Sync {
    async fn run(&self, server: &str, command: &str) -> CommandOutcome;
}
