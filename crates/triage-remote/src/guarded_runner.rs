use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::timeout;
use triage_core::{
    elapsed_ms, sanitize_command_input, AllowList, CommandAuditRecord, CommandAuditSink,
    CommandOutcome, Inventory, NoopAuditSink, TriageError,
};

use crate::output::truncate_output;
use crate::{CommandTransport, RemoteCommandRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardedRunnerConfig {
    pub command_timeout: Duration,
    pub max_output_bytes: usize,
}

impl Default for GuardedRunnerConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(30),
            max_output_bytes: 16_000,
        }
    }
}

pub struct GuardedRunner {
    inventory: Arc<Inventory>,
    allow_list: Arc<AllowList>,
    transport: Arc<dyn CommandTransport>,
    audit: Arc<dyn CommandAuditSink>,
    config: GuardedRunnerConfig,
}

impl GuardedRunner {
    pub fn new(
        inventory: Arc<Inventory>,
        allow_list: Arc<AllowList>,
        transport: Arc<dyn CommandTransport>,
        config: GuardedRunnerConfig,
    ) -> Self {
        Self {
            inventory,
            allow_list,
            transport,
            audit: Arc::new(NoopAuditSink),
            config,
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn CommandAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the trimmed command when `server` may run it exactly as given.
    ///
    /// Input carrying shell metacharacters is refused, not repaired.
    pub fn check(&self, server: &str, command: &str) -> Result<String, TriageError> {
        let trimmed = command.trim();
        let clean = sanitize_command_input(trimmed) == trimmed;
        if clean && self.inventory.get(server).is_some() && self.allow_list.permits(server, trimmed)
        {
            return Ok(trimmed.to_string());
        }
        Err(TriageError::CommandNotPermitted {
            server: server.to_string(),
            command: command.to_string(),
        })
    }

    fn finish(&self, server: &str, outcome: CommandOutcome) -> CommandOutcome {
        self.audit
            .record(&CommandAuditRecord::from_outcome(server, &outcome));
        outcome
    }
}

#[async_trait]
impl RemoteCommandRunner for GuardedRunner {
    async fn run(&self, server: &str, command: &str) -> CommandOutcome {
        let command = match self.check(server, command) {
            Ok(command) => command,
            Err(error) => {
                tracing::warn!(server, command, error = %error, "refused command outside allow-list");
                return self.finish(server, CommandOutcome::not_permitted(server, command));
            }
        };
        let Some(spec) = self.inventory.get(server) else {
            return self.finish(server, CommandOutcome::not_permitted(server, command));
        };

        tracing::debug!(server, command = %command, "dispatching remote command");
        let started = Instant::now();
        let dispatched = timeout(
            self.config.command_timeout,
            self.transport.dispatch(server, spec, &command),
        )
        .await;
        let duration_ms = elapsed_ms(started);
        let outcome = match dispatched {
            Ok(mut outcome) => {
                outcome.command = command.clone();
                outcome.output = truncate_output(&outcome.output, self.config.max_output_bytes);
                outcome.with_duration(duration_ms)
            }
            Err(_) => {
                tracing::warn!(
                    server,
                    command = %command,
                    timeout_ms = self.config.command_timeout.as_millis() as u64,
                    "remote command timed out"
                );
                CommandOutcome::timed_out(command.clone(), duration_ms)
            }
        };
        tracing::info!(
            server,
            command = %command,
            success = outcome.success,
            duration_ms,
            "remote command finished"
        );
        self.finish(server, outcome)
    }
}
