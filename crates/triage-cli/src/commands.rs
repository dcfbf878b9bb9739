use std::sync::Arc;

use anyhow::{Context, Result};
use triage_core::{Ticket, TriageConfig, TriageError};
use triage_gateway::{run_gateway_server, GatewayServerConfig, GatewayState};

use crate::bootstrap::TriageRuntime;

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render json")?;
    println!("{rendered}");
    Ok(())
}

pub(crate) fn render_ticket_line(ticket: &Ticket) -> String {
    let category = ticket
        .category
        .map(|category| category.as_str())
        .unwrap_or("unclassified");
    let mut issue: String = ticket.issue.chars().take(60).collect();
    if ticket.issue.chars().count() > 60 {
        issue.push_str("...");
    }
    format!(
        "{} {} status={} category={} issue={}",
        ticket.timestamp,
        ticket.id,
        ticket.status.as_str(),
        category,
        issue
    )
}

pub(crate) fn render_config_summary(config: &TriageConfig) -> String {
    let mut lines = vec![format!(
        "config ok: schema_version={} servers={} services={} reasoning={} runner={}",
        config.schema_version,
        config.inventory.len(),
        config.catalog.services.len(),
        config.reasoning.mode,
        config.runner.mode
    )];
    for (name, spec) in config.inventory.iter() {
        lines.push(format!(
            "  {name} {} {} services={}",
            spec.ip,
            spec.os,
            spec.services.join(",")
        ));
    }
    lines.join("\n")
}

pub(crate) async fn run_serve(runtime: TriageRuntime, bind: String) -> Result<()> {
    let state = GatewayState::new(runtime.orchestrator, runtime.feedback)?;
    run_gateway_server(GatewayServerConfig { bind }, Arc::new(state)).await
}

pub(crate) async fn run_submit(runtime: &TriageRuntime, issue: &str) -> Result<()> {
    let ticket = runtime.orchestrator.handle_issue(issue).await?;
    print_json(&ticket)
}

/// Approves the plan stored on the ticket, as an operator reviewing it locally would.
pub(crate) async fn run_approve(
    runtime: &TriageRuntime,
    ticket_id: &str,
    principal: &str,
) -> Result<()> {
    let ticket = runtime.orchestrator.get_ticket(ticket_id).await?;
    let plan = ticket
        .data
        .resolution
        .ok_or_else(|| TriageError::NotAResolution(ticket_id.to_string()))?;
    let result = runtime
        .orchestrator
        .approve_execution(ticket_id, &plan, principal)
        .await?;
    print_json(&result)
}

pub(crate) async fn run_tickets(runtime: &TriageRuntime, id: Option<&str>) -> Result<()> {
    if let Some(id) = id {
        let ticket = runtime.orchestrator.get_ticket(id).await?;
        return print_json(&ticket);
    }
    let tickets = runtime.orchestrator.list_tickets().await;
    if tickets.is_empty() {
        println!("no tickets in {}", runtime.state_dir.display());
    }
    for ticket in &tickets {
        println!("{}", render_ticket_line(ticket));
    }
    Ok(())
}
