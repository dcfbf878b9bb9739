use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use triage_agents::{CatalogResolver, KeywordClassifier, KnowledgeResponder, PolicyValidator};
use triage_core::{
    AllowList, CommandCatalog, CommandFailureKind, CommandOutcome, Inventory, QueryCategory,
    RbacPolicy, ServerSpec, StepOutcomeState, TicketStatus, TriageError,
};
use triage_orchestrator::{Executor, InfrastructureQuery, Orchestrator, OrchestratorComponents};
use triage_remote::{CommandTransport, GuardedRunner, GuardedRunnerConfig};
use triage_store::TicketStore;

/// Transport that records every dispatch and fails the scripted commands.
#[derive(Default)]
struct RecordingTransport {
    failing: Vec<String>,
    dispatched: Mutex<Vec<String>>,
}

impl RecordingTransport {
    fn failing_on(commands: &[&str]) -> Self {
        Self {
            failing: commands.iter().map(|command| command.to_string()).collect(),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    fn dispatched(&self) -> Vec<String> {
        self.dispatched.lock().expect("dispatch log").clone()
    }
}

#[async_trait]
impl CommandTransport for RecordingTransport {
    async fn dispatch(&self, _server: &str, _spec: &ServerSpec, command: &str) -> CommandOutcome {
        self.dispatched
            .lock()
            .expect("dispatch log")
            .push(command.to_string());
        if self.failing.iter().any(|failing| failing == command) {
            CommandOutcome::failed(command, CommandFailureKind::NonZeroExit, "exit status 1")
                .with_exit_code(Some(1))
        } else {
            CommandOutcome::succeeded(command, "ok")
        }
    }
}

fn orchestrator(
    tickets: &Path,
    catalog: CommandCatalog,
    transport: Arc<RecordingTransport>,
) -> Orchestrator {
    let inventory = Arc::new(Inventory::default());
    let catalog = Arc::new(catalog);
    let allow_list = Arc::new(AllowList::build(&inventory, &catalog));
    let runner = Arc::new(GuardedRunner::new(
        inventory.clone(),
        allow_list.clone(),
        transport,
        GuardedRunnerConfig::default(),
    ));
    Orchestrator::new(OrchestratorComponents {
        store: Arc::new(TicketStore::open(tickets).expect("open store")),
        inventory: inventory.clone(),
        classifier: Arc::new(KeywordClassifier::new(inventory.clone(), catalog)),
        resolver: Arc::new(CatalogResolver::new(allow_list.clone())),
        validator: Arc::new(PolicyValidator::new(inventory.clone(), allow_list.clone())),
        knowledge: KnowledgeResponder::new(None),
        infrastructure: InfrastructureQuery::new(inventory, allow_list, runner.clone()),
        executor: Executor::new(runner),
        rbac: Arc::new(RbacPolicy::default()),
    })
}

fn catalog_without_nginx_rollback() -> CommandCatalog {
    let mut catalog = CommandCatalog::default();
    if let Some(nginx) = catalog.services.get_mut("nginx") {
        for entry in &mut nginx.playbook {
            entry.rollback = None;
        }
    }
    catalog
}

#[tokio::test]
async fn integration_nginx_outage_is_resolved_after_approval() {
    let temp = tempfile::tempdir().expect("tempdir");
    let transport = Arc::new(RecordingTransport::default());
    let orchestrator = orchestrator(
        &temp.path().join("tickets.json"),
        CommandCatalog::default(),
        transport.clone(),
    );

    let ticket = orchestrator
        .handle_issue("Nginx is returning 502 errors")
        .await
        .expect("ticket");
    let plan = ticket.data.resolution.clone().expect("plan");
    let intents: Vec<&str> = plan
        .resolution_steps
        .iter()
        .filter_map(|step| step.intent.as_deref())
        .collect();
    assert_eq!(intents, vec!["check_status", "restart", "verify"]);
    assert!(plan.resolution_steps[1].rollback.is_some());
    assert!(ticket.data.validation.as_ref().is_some_and(|v| v.approved));
    assert!(transport.dispatched().is_empty(), "nothing runs before approval");

    let result = orchestrator
        .approve_execution(&ticket.id, &plan, "system")
        .await
        .expect("execution");
    assert!(result.successful);
    assert_eq!(result.results.len(), 3);
    assert_eq!(transport.dispatched().len(), 6);
}

#[tokio::test]
async fn integration_failed_restart_without_rollback_stops_the_plan() {
    let temp = tempfile::tempdir().expect("tempdir");
    let transport = Arc::new(RecordingTransport::failing_on(&["sudo systemctl restart nginx"]));
    let orchestrator = orchestrator(
        &temp.path().join("tickets.json"),
        catalog_without_nginx_rollback(),
        transport.clone(),
    );

    let ticket = orchestrator
        .handle_issue("Nginx is returning 502 errors")
        .await
        .expect("ticket");
    let validation = ticket.data.validation.clone().expect("validation");
    assert!(validation.approved, "{}", validation.reason);
    assert!(!validation.risks_identified.is_empty());

    let plan = ticket.data.resolution.clone().expect("plan");
    let result = orchestrator
        .approve_execution(&ticket.id, &plan, "system")
        .await
        .expect("execution");
    assert!(!result.successful);
    assert_eq!(result.results.len(), 2);
    assert_eq!(result.results[0].state, StepOutcomeState::Succeeded);
    assert_eq!(result.results[1].state, StepOutcomeState::Failed);
    assert!(result.results[1].rollback.is_none());
    assert_eq!(result.transitions.last().map(String::as_str), Some("failed"));
    assert!(!transport
        .dispatched()
        .iter()
        .any(|command| command.starts_with("curl")));

    let stored = orchestrator.get_ticket(&ticket.id).await.expect("ticket");
    assert_eq!(stored.status, TicketStatus::Error);
}

#[tokio::test]
async fn integration_unknown_ticket_approval_leaves_store_untouched() {
    let temp = tempfile::tempdir().expect("tempdir");
    let tickets = temp.path().join("tickets.json");
    let transport = Arc::new(RecordingTransport::default());
    let orchestrator = orchestrator(&tickets, CommandCatalog::default(), transport.clone());
    let ticket = orchestrator
        .handle_issue("Nginx is returning 502 errors")
        .await
        .expect("ticket");
    let plan = ticket.data.resolution.clone().expect("plan");
    let before = std::fs::read_to_string(&tickets).expect("ticket file");

    let error = orchestrator
        .approve_execution("unknown-id", &plan, "system")
        .await
        .expect_err("unknown ticket");
    assert!(matches!(error, TriageError::TicketNotFound(_)));
    assert_eq!(std::fs::read_to_string(&tickets).expect("ticket file"), before);
    assert!(transport.dispatched().is_empty());
}

#[tokio::test]
async fn integration_knowledge_question_never_reaches_the_executor() {
    let temp = tempfile::tempdir().expect("tempdir");
    let transport = Arc::new(RecordingTransport::default());
    let orchestrator = orchestrator(
        &temp.path().join("tickets.json"),
        CommandCatalog::default(),
        transport.clone(),
    );
    let ticket = orchestrator
        .handle_issue("What is the difference between Docker and Kubernetes?")
        .await
        .expect("ticket");
    assert_eq!(ticket.category, Some(QueryCategory::KnowledgeQuery));
    assert_eq!(ticket.status, TicketStatus::Completed);
    assert!(ticket.data.resolution.is_none());
    assert!(ticket.data.execution.is_none());
    assert!(transport.dispatched().is_empty());
}

#[tokio::test]
async fn integration_pending_approval_survives_restart() {
    let temp = tempfile::tempdir().expect("tempdir");
    let tickets = temp.path().join("tickets.json");
    let ticket = {
        let orchestrator = orchestrator(
            &tickets,
            CommandCatalog::default(),
            Arc::new(RecordingTransport::default()),
        );
        orchestrator
            .handle_issue("Nginx is returning 502 errors")
            .await
            .expect("ticket")
    };

    let orchestrator = orchestrator(
        &tickets,
        CommandCatalog::default(),
        Arc::new(RecordingTransport::default()),
    );
    let reloaded = orchestrator.get_ticket(&ticket.id).await.expect("reloaded");
    assert_eq!(reloaded, ticket);
    let plan = reloaded.data.resolution.clone().expect("plan");
    let result = orchestrator
        .approve_execution(&ticket.id, &plan, "system")
        .await
        .expect("execution");
    assert!(result.successful);
}

#[tokio::test]
async fn integration_infrastructure_query_runs_only_read_only_diagnostics() {
    let temp = tempfile::tempdir().expect("tempdir");
    let transport = Arc::new(RecordingTransport::default());
    let orchestrator = orchestrator(
        &temp.path().join("tickets.json"),
        CommandCatalog::default(),
        transport.clone(),
    );
    let ticket = orchestrator
        .handle_issue("What is the memory usage on db01?")
        .await
        .expect("ticket");
    assert_eq!(ticket.category, Some(QueryCategory::InfrastructureQuery));
    assert_eq!(ticket.status, TicketStatus::Completed);
    let dispatched = transport.dispatched();
    assert!(dispatched.contains(&"free -m".to_string()));
    assert!(dispatched
        .iter()
        .all(|command| triage_core::is_read_only_command(command)));
}
