use std::path::{Path, PathBuf};

use anyhow::Result;
use triage_core::{CommandAuditRecord, CommandAuditSink};

use crate::jsonl_log::{JsonlFile, LogRotation};

/// One JSON line per dispatched or refused command.
#[derive(Debug, Clone)]
pub struct CommandAuditLog {
    file: JsonlFile,
}

impl CommandAuditLog {
    pub fn new(path: impl Into<PathBuf>, rotation: LogRotation) -> Self {
        Self {
            file: JsonlFile::new(path.into(), rotation),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn append(&self, record: &CommandAuditRecord) -> Result<()> {
        self.file.append(record)
    }
}

impl CommandAuditSink for CommandAuditLog {
    fn record(&self, record: &CommandAuditRecord) {
        if let Err(error) = self.append(record) {
            tracing::warn!(
                path = %self.path().display(),
                error = %error,
                "failed to write command audit record"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::CommandOutcome;

    #[test]
    fn functional_audit_sink_writes_one_line_per_command() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log = CommandAuditLog::new(temp.path().join("audit.jsonl"), LogRotation::default());
        let sink: &dyn CommandAuditSink = &log;
        sink.record(&CommandAuditRecord::from_outcome(
            "web01",
            &CommandOutcome::succeeded("uptime", "up 2 days"),
        ));
        sink.record(&CommandAuditRecord::from_outcome(
            "web01",
            &CommandOutcome::not_permitted("web01", "rm -rf /"),
        ));

        let raw = std::fs::read_to_string(log.path()).expect("read");
        let records: Vec<CommandAuditRecord> = raw
            .lines()
            .map(|line| serde_json::from_str(line).expect("parse"))
            .collect();
        assert_eq!(records.len(), 2);
        assert!(records[0].success);
        assert_eq!(records[1].failure.as_deref(), Some("not_permitted"));
    }
}
