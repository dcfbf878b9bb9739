use thiserror::Error;

/// Failures surfaced to callers of the triage workflow.
///
/// Per-command failures are not represented here: they are recorded as
/// [`crate::CommandOutcome`] values on the step that produced them.
#[derive(Debug, Error)]
pub enum TriageError {
    #[error("issue text must be non-empty")]
    EmptyIssue,
    #[error("classification unavailable: {0}")]
    ClassificationUnavailable(String),
    #[error("reasoning engine unavailable: {0}")]
    ReasoningUnavailable(String),
    #[error("no playbook for service '{service}' on server '{server}'")]
    NoPlaybook { server: String, service: String },
    #[error("command not permitted on server '{server}': {command}")]
    CommandNotPermitted { server: String, command: String },
    #[error("ticket '{0}' was not found")]
    TicketNotFound(String),
    #[error("ticket '{0}' has no approved resolution plan")]
    NotApproved(String),
    #[error("ticket '{0}' is not a resolution ticket")]
    NotAResolution(String),
    #[error("submitted plan does not match the stored plan for ticket '{0}'")]
    PlanMismatch(String),
    #[error("ticket '{0}' has already been executed")]
    AlreadyExecuted(String),
    #[error("ticket '{ticket_id}' already has a {section} section")]
    SectionAlreadySet {
        ticket_id: String,
        section: &'static str,
    },
    #[error("principal '{principal}' lacks permission '{permission}'")]
    PermissionDenied {
        principal: String,
        permission: String,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl TriageError {
    /// Stable machine-readable code used in API envelopes and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyIssue => "empty_issue",
            Self::ClassificationUnavailable(_) => "classification_unavailable",
            Self::ReasoningUnavailable(_) => "reasoning_unavailable",
            Self::NoPlaybook { .. } => "no_playbook",
            Self::CommandNotPermitted { .. } => "command_not_permitted",
            Self::TicketNotFound(_) => "ticket_not_found",
            Self::NotApproved(_) => "not_approved",
            Self::NotAResolution(_) => "not_a_resolution",
            Self::PlanMismatch(_) => "plan_mismatch",
            Self::AlreadyExecuted(_) => "already_executed",
            Self::SectionAlreadySet { .. } => "section_already_set",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::Store(_) => "store_failure",
        }
    }
}
