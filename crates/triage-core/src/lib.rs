//! Domain model shared by the triage service crates.
//!
//! Tickets and their set-once sections, resolution plans, the server inventory,
//! the command catalog with its rendered allow-list, RBAC and configuration.

pub mod audit;
pub mod command_catalog;
pub mod config;
pub mod error;
pub mod inventory;
pub mod plan;
pub mod rbac;
pub mod ticket;
pub mod time_utils;

pub use audit::{CommandAuditRecord, CommandAuditSink, NoopAuditSink};
pub use command_catalog::{
    is_read_only_command, matches_destructive_pattern, sanitize_command_input, AllowList,
    CommandCatalog, CommandSpec, DiagnosticCommand, RenderedCommand, ServiceCatalog,
};
pub use config::{load_triage_config, ReasoningConfig, RunnerConfig, TriageConfig};
pub use error::TriageError;
pub use inventory::{Inventory, ServerSpec};
pub use plan::{
    CommandFailureKind, CommandOutcome, ExecutionResult, ResolutionPlan, Severity, Step,
    StepOutcome, StepOutcomeState, StepPhase, ValidationResult,
};
pub use rbac::{RbacPolicy, PERMISSION_APPROVE_REMEDIATION};
pub use ticket::{
    ApprovalRecord, QueryCategory, QueryKind, QueryResult, ServerReport, Target, Ticket,
    TicketData, TicketFailure, TicketStatus,
};
pub use time_utils::{current_rfc3339, current_unix_timestamp_ms, elapsed_ms};
