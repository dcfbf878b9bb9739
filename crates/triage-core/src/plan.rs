//! Resolution plan, validation and execution records.
//!
//! These are fixed-shape records: every optional field is an explicit `Option`
//! and consumers handle absence themselves.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse_label(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" | "minor" => Some(Self::Low),
            "medium" | "moderate" => Some(Self::Medium),
            "high" | "critical" | "major" => Some(Self::High),
            _ => None,
        }
    }
}

/// Dependency phase of a playbook entry. Plans are ordered by phase first.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    #[default]
    Diagnose,
    Remediate,
    Verify,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    /// The action command executed on the target server.
    #[serde(alias = "action")]
    pub step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default)]
    pub phase: StepPhase,
    pub purpose: String,
    pub validation: String,
    /// Absent means the step is not reversible.
    #[serde(default)]
    pub rollback: Option<String>,
}

impl Step {
    pub fn action(&self) -> &str {
        &self.step
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolutionPlan {
    pub issue_summary: String,
    pub service: String,
    pub server: String,
    #[serde(default)]
    pub severity: Severity,
    pub resolution_steps: Vec<Step>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

impl ResolutionPlan {
    /// SHA-256 over the target and the ordered step commands.
    ///
    /// Descriptive fields are excluded so a caller echoing back the plan is only
    /// held to what would actually run.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.server.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.service.as_bytes());
        for step in &self.resolution_steps {
            hasher.update([1u8]);
            hasher.update(step.step.as_bytes());
            hasher.update([0u8]);
            hasher.update(step.validation.as_bytes());
            hasher.update([0u8]);
            if let Some(rollback) = &step.rollback {
                hasher.update(rollback.as_bytes());
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    /// The only gate the approval path consults.
    pub approved: bool,
    /// Advisory score in `[0, 1]`.
    pub confidence: f64,
    pub reason: String,
    #[serde(default)]
    pub risks_identified: Vec<String>,
    #[serde(default)]
    pub suggested_modifications: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandFailureKind {
    /// Rejected by the local allow-list before any dispatch.
    NotPermitted,
    Timeout,
    /// Unreachable host, rejected credentials or a transport that could not start.
    Transport,
    NonZeroExit,
}

impl CommandFailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotPermitted => "not_permitted",
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::NonZeroExit => "non_zero_exit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: String,
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<CommandFailureKind>,
}

impl CommandOutcome {
    pub fn succeeded(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            success: true,
            output: output.into(),
            exit_code: Some(0),
            duration_ms: 0,
            failure: None,
        }
    }

    pub fn failed(
        command: impl Into<String>,
        kind: CommandFailureKind,
        output: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            success: false,
            output: output.into(),
            exit_code: None,
            duration_ms: 0,
            failure: Some(kind),
        }
    }

    pub fn not_permitted(server: &str, command: impl Into<String>) -> Self {
        let command = command.into();
        let output = format!("command not permitted on {server}: {command}");
        Self::failed(command, CommandFailureKind::NotPermitted, output)
    }

    pub fn timed_out(command: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            duration_ms,
            ..Self::failed(command, CommandFailureKind::Timeout, "timeout")
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }
}

/// Terminal state a single step reached during execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcomeState {
    Succeeded,
    Failed,
    RolledBack,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepOutcome {
    pub index: usize,
    pub command: String,
    pub output: String,
    /// True only when both the action and its validation succeeded.
    pub success: bool,
    pub state: StepOutcomeState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_failure: Option<CommandFailureKind>,
    #[serde(default)]
    pub validation: Option<CommandOutcome>,
    #[serde(default)]
    pub rollback: Option<CommandOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResult {
    pub successful: bool,
    pub server: String,
    pub service: String,
    pub timestamp: String,
    pub results: Vec<StepOutcome>,
    /// Executor state labels in the order they were entered.
    #[serde(default)]
    pub transitions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> ResolutionPlan {
        ResolutionPlan {
            issue_summary: "nginx returns 502".to_string(),
            service: "nginx".to_string(),
            server: "web01".to_string(),
            severity: Severity::High,
            resolution_steps: vec![Step {
                step: "sudo systemctl restart nginx".to_string(),
                intent: Some("restart".to_string()),
                phase: StepPhase::Remediate,
                purpose: "restart".to_string(),
                validation: "systemctl is-active nginx".to_string(),
                rollback: None,
            }],
            risks: Vec::new(),
            prerequisites: Vec::new(),
        }
    }

    #[test]
    fn unit_fingerprint_ignores_descriptive_fields_but_tracks_commands() {
        let plan = sample_plan();
        let mut reworded = plan.clone();
        reworded.issue_summary = "different words".to_string();
        reworded.resolution_steps[0].purpose = "other purpose".to_string();
        assert_eq!(plan.fingerprint(), reworded.fingerprint());

        let mut tampered = plan.clone();
        tampered.resolution_steps[0].step = "sudo systemctl stop nginx".to_string();
        assert_ne!(plan.fingerprint(), tampered.fingerprint());
    }

    #[test]
    fn unit_step_accepts_action_alias_and_missing_rollback() {
        let step: Step = serde_json::from_value(serde_json::json!({
            "action": "uptime",
            "purpose": "check load",
            "validation": "uptime"
        }))
        .expect("parse step");
        assert_eq!(step.action(), "uptime");
        assert_eq!(step.rollback, None);
        assert_eq!(step.phase, StepPhase::Diagnose);
    }

    #[test]
    fn unit_timed_out_outcome_reports_timeout_output() {
        let outcome = CommandOutcome::timed_out("uptime", 30_000);
        assert!(!outcome.success);
        assert_eq!(outcome.output, "timeout");
        assert_eq!(outcome.failure, Some(CommandFailureKind::Timeout));
    }
}
