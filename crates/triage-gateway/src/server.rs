use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use regex::Regex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use triage_agents::analyze_server_metrics;
use triage_core::{ExecutionResult, Inventory, Ticket, TicketStatus};
use triage_orchestrator::Orchestrator;
use triage_store::{FeedbackLog, FeedbackRecord, FEEDBACK_RATING_MAX, FEEDBACK_RATING_MIN};

use crate::types::{
    AnomalyReportRequest, AnomalyReportResponse, ApiError, ApproveRequest, FeedbackRequest,
    HealthResponse, SubmitIssueRequest,
};

pub(crate) const ISSUES_ENDPOINT: &str = "/api/issues";
pub(crate) const TICKETS_ENDPOINT: &str = "/api/tickets";
pub(crate) const TICKET_ENDPOINT: &str = "/api/tickets/{ticket_id}";
pub(crate) const TICKET_APPROVE_ENDPOINT: &str = "/api/tickets/{ticket_id}/approve";
pub(crate) const INVENTORY_ENDPOINT: &str = "/api/inventory";
pub(crate) const FEEDBACK_ENDPOINT: &str = "/api/feedback";
pub(crate) const ANOMALY_REPORT_ENDPOINT: &str = "/api/anomaly-report";
pub(crate) const HEALTH_ENDPOINT: &str = "/healthz";
pub(crate) const PRINCIPAL_HEADER: &str = "x-triage-principal";

const TICKET_ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9-]{0,63}$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayServerConfig {
    pub bind: String,
}

/// Shared handler state.
pub struct GatewayState {
    orchestrator: Arc<Orchestrator>,
    feedback: FeedbackLog,
    ticket_id_pattern: Regex,
}

impl GatewayState {
    pub fn new(orchestrator: Arc<Orchestrator>, feedback: FeedbackLog) -> Result<Self> {
        let ticket_id_pattern =
            Regex::new(TICKET_ID_PATTERN).context("failed to compile ticket id pattern")?;
        Ok(Self {
            orchestrator,
            feedback,
            ticket_id_pattern,
        })
    }

    fn checked_ticket_id<'a>(&self, ticket_id: &'a str) -> Result<&'a str, ApiError> {
        if self.ticket_id_pattern.is_match(ticket_id) {
            Ok(ticket_id)
        } else {
            Err(ApiError::bad_request(
                "invalid_ticket_id",
                format!("'{ticket_id}' is not a valid ticket id"),
            ))
        }
    }
}

pub fn build_gateway_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route(ISSUES_ENDPOINT, post(handle_submit_issue))
        .route(TICKETS_ENDPOINT, get(handle_list_tickets))
        .route(TICKET_ENDPOINT, get(handle_get_ticket))
        .route(TICKET_APPROVE_ENDPOINT, post(handle_approve))
        .route(INVENTORY_ENDPOINT, get(handle_inventory))
        .route(FEEDBACK_ENDPOINT, post(handle_feedback))
        .route(ANOMALY_REPORT_ENDPOINT, post(handle_anomaly_report))
        .route(HEALTH_ENDPOINT, get(handle_health))
        .with_state(state)
}

pub async fn run_gateway_server(config: GatewayServerConfig, state: Arc<GatewayState>) -> Result<()> {
    let bind_addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid bind address '{}'", config.bind))?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind triage gateway on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound gateway address")?;
    tracing::info!(addr = %local_addr, "triage gateway listening");

    axum::serve(listener, build_gateway_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("triage gateway exited unexpectedly")?;
    tracing::info!("triage gateway stopped");
    Ok(())
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request("invalid_request_body", rejection.body_text()))
}

async fn handle_submit_issue(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<SubmitIssueRequest>, JsonRejection>,
) -> Result<Json<Ticket>, ApiError> {
    let request = json_body(payload)?;
    let ticket = state.orchestrator.handle_issue(&request.issue).await?;
    if ticket.status != TicketStatus::Error {
        return Ok(Json(ticket));
    }
    let Some(failure) = &ticket.data.error else {
        return Ok(Json(ticket));
    };
    let code = match failure.code.as_str() {
        "classification_unavailable" => "classification_unavailable",
        "reasoning_unavailable" => "reasoning_unavailable",
        _ => return Ok(Json(ticket)),
    };
    Err(
        ApiError::new(StatusCode::SERVICE_UNAVAILABLE, code, failure.message.clone())
            .with_ticket_id(ticket.id.clone()),
    )
}

async fn handle_approve(
    State(state): State<Arc<GatewayState>>,
    Path(ticket_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<ApproveRequest>, JsonRejection>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let ticket_id = state.checked_ticket_id(&ticket_id)?;
    let principal = headers
        .get(PRINCIPAL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ApiError::bad_request(
                "missing_principal",
                format!("header '{PRINCIPAL_HEADER}' is required"),
            )
        })?;
    let request = json_body(payload)?;
    let result = state
        .orchestrator
        .approve_execution(ticket_id, &request.execution_plan, principal)
        .await
        .map_err(|error| ApiError::from(error).with_ticket_id(ticket_id))?;
    Ok(Json(result))
}

async fn handle_get_ticket(
    State(state): State<Arc<GatewayState>>,
    Path(ticket_id): Path<String>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket_id = state.checked_ticket_id(&ticket_id)?;
    Ok(Json(state.orchestrator.get_ticket(ticket_id).await?))
}

async fn handle_list_tickets(State(state): State<Arc<GatewayState>>) -> Json<Vec<Ticket>> {
    Json(state.orchestrator.list_tickets().await)
}

async fn handle_inventory(State(state): State<Arc<GatewayState>>) -> Json<Inventory> {
    Json(state.orchestrator.inventory().clone())
}

async fn handle_feedback(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = json_body(payload)?;
    if request.user.trim().is_empty() {
        return Err(ApiError::bad_request("invalid_feedback", "user cannot be empty"));
    }
    if !(FEEDBACK_RATING_MIN..=FEEDBACK_RATING_MAX).contains(&request.rating) {
        return Err(ApiError::bad_request(
            "invalid_feedback",
            format!("rating must be between {FEEDBACK_RATING_MIN} and {FEEDBACK_RATING_MAX}"),
        ));
    }
    let record = FeedbackRecord::new(
        request.user,
        request.query,
        request.rating,
        request.comments,
        request.ticket_id,
    );
    let feedback = state.feedback.clone();
    tokio::task::spawn_blocking(move || feedback.append(&record))
        .await
        .map_err(|error| ApiError::internal(format!("feedback writer failed: {error}")))?
        .map_err(|error| ApiError::internal(format!("{error:#}")))?;
    Ok(Json(json!({"status": "recorded"})))
}

async fn handle_anomaly_report(
    payload: Result<Json<AnomalyReportRequest>, JsonRejection>,
) -> Result<Json<AnomalyReportResponse>, ApiError> {
    let request = json_body(payload)?;
    Ok(Json(AnomalyReportResponse {
        anomalies: analyze_server_metrics(&request.server_metrics),
    }))
}

async fn handle_health(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        tickets: state.orchestrator.list_tickets().await.len(),
        servers: state.orchestrator.inventory().len(),
    })
}
