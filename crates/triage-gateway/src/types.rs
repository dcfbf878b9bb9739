use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use triage_core::{ResolutionPlan, TriageError};

/// Error mapped to the `{error:{type,code,message}}` envelope.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) code: &'static str,
    pub(crate) message: String,
    pub(crate) ticket_id: Option<String>,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            ticket_id: None,
        }
    }

    pub(crate) fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    pub(crate) fn with_ticket_id(mut self, ticket_id: impl Into<String>) -> Self {
        self.ticket_id = Some(ticket_id.into());
        self
    }
}

impl From<TriageError> for ApiError {
    fn from(error: TriageError) -> Self {
        let status = match &error {
            TriageError::EmptyIssue => StatusCode::BAD_REQUEST,
            TriageError::ClassificationUnavailable(_) | TriageError::ReasoningUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            TriageError::TicketNotFound(_) => StatusCode::NOT_FOUND,
            TriageError::NotApproved(_)
            | TriageError::NotAResolution(_)
            | TriageError::PlanMismatch(_)
            | TriageError::AlreadyExecuted(_)
            | TriageError::SectionAlreadySet { .. } => StatusCode::CONFLICT,
            TriageError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            TriageError::NoPlaybook { .. }
            | TriageError::CommandNotPermitted { .. }
            | TriageError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.code(), error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_type = if self.status.is_client_error() {
            "invalid_request_error"
        } else {
            "server_error"
        };
        let mut body = json!({
            "error": {
                "type": error_type,
                "code": self.code,
                "message": self.message,
            }
        });
        if let Some(ticket_id) = self.ticket_id {
            body["error"]["ticket_id"] = json!(ticket_id);
        }
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitIssueRequest {
    #[serde(default)]
    pub(crate) issue: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApproveRequest {
    pub(crate) execution_plan: ResolutionPlan,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedbackRequest {
    pub(crate) user: String,
    pub(crate) query: String,
    pub(crate) rating: u8,
    #[serde(default)]
    pub(crate) comments: String,
    #[serde(default)]
    pub(crate) ticket_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnomalyReportRequest {
    pub(crate) server_metrics: BTreeMap<String, Vec<f64>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnomalyReportResponse {
    pub(crate) anomalies: BTreeMap<String, Vec<usize>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) tickets: usize,
    pub(crate) servers: usize,
}
