use std::sync::Arc;

use triage_core::{AllowList, Inventory, QueryKind, QueryResult, ServerReport, ServerSpec, Target};
use triage_remote::RemoteCommandRunner;

fn report_for(server: &str, spec: &ServerSpec) -> ServerReport {
    ServerReport {
        server: server.to_string(),
        ip: spec.ip.clone(),
        os: spec.os.clone(),
        services: spec.services.clone(),
        outputs: Vec::new(),
    }
}

/// Answers infrastructure questions with inventory facts and read-only diagnostics.
pub struct InfrastructureQuery {
    inventory: Arc<Inventory>,
    allow_list: Arc<AllowList>,
    runner: Arc<dyn RemoteCommandRunner>,
}

impl InfrastructureQuery {
    pub fn new(
        inventory: Arc<Inventory>,
        allow_list: Arc<AllowList>,
        runner: Arc<dyn RemoteCommandRunner>,
    ) -> Self {
        Self {
            inventory,
            allow_list,
            runner,
        }
    }

    /// Inventory summary used when no server could be matched.
    pub fn overview(&self, reasoning: impl Into<String>) -> QueryResult {
        let servers: Vec<ServerReport> = self
            .inventory
            .iter()
            .map(|(name, spec)| report_for(name, spec))
            .collect();
        let lines: Vec<String> = servers
            .iter()
            .map(|report| {
                format!(
                    "{} ({}, {}): {}",
                    report.server,
                    report.ip,
                    report.os,
                    report.services.join(", ")
                )
            })
            .collect();
        QueryResult {
            kind: QueryKind::InfrastructureOverview,
            reasoning: reasoning.into(),
            answer: format!(
                "Managed servers ({}):\n{}",
                servers.len(),
                lines.join("\n")
            ),
            servers,
        }
    }

    /// Runs the server's diagnostics one after another and reports every outcome.
    pub async fn server_status(&self, target: &Target) -> QueryResult {
        let Some(spec) = self.inventory.get(&target.server) else {
            return self.overview(format!("server '{}' is not in the inventory", target.server));
        };
        let mut report = report_for(&target.server, spec);
        for diagnostic in self.allow_list.diagnostics(&target.server) {
            let outcome = self.runner.run(&target.server, &diagnostic.command).await;
            report.outputs.push(outcome);
        }
        let failed = report
            .outputs
            .iter()
            .filter(|outcome| !outcome.success)
            .count();
        tracing::info!(
            server = %target.server,
            commands = report.outputs.len(),
            failed,
            "collected server diagnostics"
        );
        let answer = if failed == 0 {
            format!(
                "{} ({}) answered all {} diagnostics.",
                target.server,
                spec.ip,
                report.outputs.len()
            )
        } else {
            format!(
                "{} ({}) failed {failed} of {} diagnostics.",
                target.server,
                spec.ip,
                report.outputs.len()
            )
        };
        let reasoning = match &target.service {
            Some(service) => format!("status of {service} on {}", target.server),
            None => format!("status of {}", target.server),
        };
        QueryResult {
            kind: QueryKind::ServerStatus,
            reasoning,
            answer,
            servers: vec![report],
        }
    }
}
