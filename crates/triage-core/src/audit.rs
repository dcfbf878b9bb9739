use serde::{Deserialize, Serialize};

use crate::plan::CommandOutcome;
use crate::time_utils::current_unix_timestamp_ms;

pub const COMMAND_AUDIT_SCHEMA_VERSION: u32 = 1;

/// One dispatched (or refused) command, as written to the audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandAuditRecord {
    pub schema_version: u32,
    pub timestamp_unix_ms: u64,
    pub server: String,
    pub command: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl CommandAuditRecord {
    pub fn from_outcome(server: &str, outcome: &CommandOutcome) -> Self {
        Self {
            schema_version: COMMAND_AUDIT_SCHEMA_VERSION,
            timestamp_unix_ms: current_unix_timestamp_ms(),
            server: server.to_string(),
            command: outcome.command.clone(),
            success: outcome.success,
            duration_ms: outcome.duration_ms,
            failure: outcome.failure.map(|kind| kind.as_str().to_string()),
            exit_code: outcome.exit_code,
        }
    }
}

/// Destination for command audit records.
pub trait CommandAuditSink: Send + Sync {
    fn record(&self, record: &CommandAuditRecord);
}

/// Sink that drops every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl CommandAuditSink for NoopAuditSink {
    fn record(&self, _record: &CommandAuditRecord) {}
}
