//! Ticket record and its set-once sections.

use serde::{Deserialize, Serialize};

use crate::error::TriageError;
use crate::plan::{CommandOutcome, ExecutionResult, ResolutionPlan, ValidationResult};
use crate::time_utils::current_rfc3339;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueryCategory {
    InfrastructureQuery,
    KnowledgeQuery,
    ApiQuery,
    Resolution,
}

impl QueryCategory {
    pub const ALL: [QueryCategory; 4] = [
        QueryCategory::InfrastructureQuery,
        QueryCategory::KnowledgeQuery,
        QueryCategory::ApiQuery,
        QueryCategory::Resolution,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InfrastructureQuery => "infrastructure_query",
            Self::KnowledgeQuery => "knowledge_query",
            Self::ApiQuery => "api_query",
            Self::Resolution => "resolution",
        }
    }

    /// Parses a category label, accepting the legacy two-way labels.
    pub fn parse_label(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "infrastructure_query" | "infrastructure" | "general_query" => {
                Some(Self::InfrastructureQuery)
            }
            "knowledge_query" | "knowledge" => Some(Self::KnowledgeQuery),
            "api_query" | "api" => Some(Self::ApiQuery),
            "resolution" | "needs_resolution" => Some(Self::Resolution),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Processing,
    Completed,
    Error,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    pub server: String,
    #[serde(default)]
    pub service: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    InfrastructureOverview,
    ServerStatus,
    KnowledgeAnswer,
    ApiAnswer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerReport {
    pub server: String,
    pub ip: String,
    pub os: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<CommandOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryResult {
    pub kind: QueryKind,
    pub reasoning: String,
    pub answer: String,
    #[serde(default)]
    pub servers: Vec<ServerReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovalRecord {
    pub approved_by: String,
    pub approved_at: String,
    pub plan_fingerprint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketFailure {
    pub code: String,
    pub message: String,
}

/// Per-stage sections. Each is written at most once.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TicketData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TicketFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: String,
    pub issue: String,
    #[serde(default)]
    pub category: Option<QueryCategory>,
    #[serde(default)]
    pub classification_reason: String,
    #[serde(default)]
    pub status: TicketStatus,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub data: TicketData,
}

fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    ticket_id: &str,
    section: &'static str,
) -> Result<(), TriageError> {
    if slot.is_some() {
        return Err(TriageError::SectionAlreadySet {
            ticket_id: ticket_id.to_string(),
            section,
        });
    }
    *slot = Some(value);
    Ok(())
}

impl Ticket {
    pub fn new(issue: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            issue: issue.into(),
            category: None,
            classification_reason: String::new(),
            status: TicketStatus::Processing,
            timestamp: current_rfc3339(),
            updated_at: None,
            data: TicketData::default(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(current_rfc3339());
    }

    pub fn classify(
        &mut self,
        category: QueryCategory,
        reason: impl Into<String>,
        target: Option<Target>,
    ) -> Result<(), TriageError> {
        if self.category.is_some() {
            return Err(TriageError::SectionAlreadySet {
                ticket_id: self.id.clone(),
                section: "category",
            });
        }
        if let Some(target) = target {
            set_once(&mut self.data.target, target, &self.id, "target")?;
        }
        self.category = Some(category);
        self.classification_reason = reason.into();
        Ok(())
    }

    pub fn attach_query(&mut self, query: QueryResult) -> Result<(), TriageError> {
        set_once(&mut self.data.query, query, &self.id, "query")
    }

    pub fn attach_resolution(&mut self, plan: ResolutionPlan) -> Result<(), TriageError> {
        set_once(&mut self.data.resolution, plan, &self.id, "resolution")
    }

    pub fn attach_validation(&mut self, validation: ValidationResult) -> Result<(), TriageError> {
        set_once(&mut self.data.validation, validation, &self.id, "validation")
    }

    /// True when the ticket carries a plan the validator approved.
    pub fn is_approvable(&self) -> bool {
        self.data.resolution.is_some()
            && self
                .data
                .validation
                .as_ref()
                .is_some_and(|validation| validation.approved)
    }

    pub fn record_approval(&mut self, approval: ApprovalRecord) -> Result<(), TriageError> {
        if !self.is_approvable() {
            return Err(TriageError::NotApproved(self.id.clone()));
        }
        set_once(&mut self.data.approval, approval, &self.id, "approval")
    }

    /// Stores the execution result and moves the ticket to its terminal status.
    ///
    /// Requires an approved validation and a recorded human approval.
    pub fn record_execution(&mut self, execution: ExecutionResult) -> Result<(), TriageError> {
        if self.data.execution.is_some() {
            return Err(TriageError::AlreadyExecuted(self.id.clone()));
        }
        if !self.is_approvable() || self.data.approval.is_none() {
            return Err(TriageError::NotApproved(self.id.clone()));
        }
        self.status = if execution.successful {
            TicketStatus::Completed
        } else {
            TicketStatus::Error
        };
        self.data.execution = Some(execution);
        self.touch();
        Ok(())
    }

    pub fn complete(&mut self) {
        self.status = TicketStatus::Completed;
        self.touch();
    }

    /// Marks the ticket failed. The first recorded failure wins.
    pub fn fail(&mut self, code: impl Into<String>, message: impl Into<String>) {
        if self.data.error.is_none() {
            self.data.error = Some(TicketFailure {
                code: code.into(),
                message: message.into(),
            });
        }
        self.status = TicketStatus::Error;
        self.touch();
    }
}
