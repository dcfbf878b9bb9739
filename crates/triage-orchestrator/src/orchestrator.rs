use std::sync::Arc;

use triage_agents::{Classification, Classifier, KnowledgeResponder, Resolver, Validator};
use triage_core::{
    current_rfc3339, ApprovalRecord, ExecutionResult, Inventory, QueryCategory, QueryKind,
    RbacPolicy, ResolutionPlan, Target, Ticket, TriageError, PERMISSION_APPROVE_REMEDIATION,
};
use triage_store::TicketStore;

use crate::executor::Executor;
use crate::infra_query::InfrastructureQuery;

/// Everything the orchestrator delegates to.
pub struct OrchestratorComponents {
    pub store: Arc<TicketStore>,
    pub inventory: Arc<Inventory>,
    pub classifier: Arc<dyn Classifier>,
    pub resolver: Arc<dyn Resolver>,
    pub validator: Arc<dyn Validator>,
    pub knowledge: KnowledgeResponder,
    pub infrastructure: InfrastructureQuery,
    pub executor: Executor,
    pub rbac: Arc<RbacPolicy>,
}

/// Drives a ticket from submission to its approval gate, and from approval to execution.
pub struct Orchestrator {
    store: Arc<TicketStore>,
    inventory: Arc<Inventory>,
    classifier: Arc<dyn Classifier>,
    resolver: Arc<dyn Resolver>,
    validator: Arc<dyn Validator>,
    knowledge: KnowledgeResponder,
    infrastructure: InfrastructureQuery,
    executor: Executor,
    rbac: Arc<RbacPolicy>,
}

impl Orchestrator {
    pub fn new(components: OrchestratorComponents) -> Self {
        let OrchestratorComponents {
            store,
            inventory,
            classifier,
            resolver,
            validator,
            knowledge,
            infrastructure,
            executor,
            rbac,
        } = components;
        Self {
            store,
            inventory,
            classifier,
            resolver,
            validator,
            knowledge,
            infrastructure,
            executor,
            rbac,
        }
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Creates a ticket for `issue` and advances it as far as it can go without a human.
    ///
    /// Stage failures after the ticket exists are recorded on the ticket, which is
    /// returned with status `error`. Only an empty issue or a store failure is an `Err`.
    pub async fn handle_issue(&self, issue: &str) -> Result<Ticket, TriageError> {
        let issue = issue.trim();
        if issue.is_empty() {
            return Err(TriageError::EmptyIssue);
        }
        let ticket = self.store.create(Ticket::new(issue)).await?;
        let ticket_id = ticket.id.clone();
        tracing::info!(ticket_id = %ticket_id, "ticket created");

        let classification = match self.classifier.classify(issue).await {
            Ok(classification) => classification,
            Err(error) => return self.fail_ticket(&ticket_id, &error).await,
        };
        tracing::info!(
            ticket_id = %ticket_id,
            category = classification.category().as_str(),
            "ticket classified"
        );
        self.store
            .update(&ticket_id, |ticket| {
                ticket.classify(
                    classification.category(),
                    classification.reason(),
                    classification.target().cloned(),
                )
            })
            .await?;

        let outcome = match &classification {
            Classification::Resolution {
                target: Some(target),
                ..
            } => self.draft_resolution(&ticket_id, issue, target).await,
            Classification::Resolution { target: None, .. } => {
                let overview = self
                    .infrastructure
                    .overview("no managed server or service matched the issue");
                self.finish_with_query(&ticket_id, overview).await
            }
            Classification::InfrastructureQuery { target, .. } => {
                let result = match target {
                    Some(target) => self.infrastructure.server_status(target).await,
                    None => self
                        .infrastructure
                        .overview("no specific server was named"),
                };
                self.finish_with_query(&ticket_id, result).await
            }
            Classification::KnowledgeQuery { .. } => {
                self.answer_directly(&ticket_id, QueryKind::KnowledgeAnswer, issue)
                    .await
            }
            Classification::ApiQuery { .. } => {
                self.answer_directly(&ticket_id, QueryKind::ApiAnswer, issue)
                    .await
            }
        };
        match outcome {
            Ok(ticket) => Ok(ticket),
            Err(error @ TriageError::Store(_)) => Err(error),
            Err(error) => self.fail_ticket(&ticket_id, &error).await,
        }
    }

    async fn draft_resolution(
        &self,
        ticket_id: &str,
        issue: &str,
        target: &Target,
    ) -> Result<Ticket, TriageError> {
        let Some(service) = target.service.clone() else {
            let overview = self.infrastructure.overview(format!(
                "no managed service on '{}' matched the issue",
                target.server
            ));
            return self.finish_with_query(ticket_id, overview).await;
        };

        let plan = match self.resolver.resolve(issue, &target.server, &service).await {
            Ok(plan) => plan,
            Err(TriageError::NoPlaybook { server, service }) => {
                let overview = self.infrastructure.overview(format!(
                    "no playbook for {service} on {server}"
                ));
                return self.finish_with_query(ticket_id, overview).await;
            }
            Err(error) => return Err(error),
        };
        let validation = self.validator.validate(&plan);
        tracing::info!(
            ticket_id,
            server = %plan.server,
            service = %plan.service,
            steps = plan.resolution_steps.len(),
            approved = validation.approved,
            "resolution drafted"
        );

        self.store
            .update(ticket_id, |ticket| {
                ticket.attach_resolution(plan)?;
                ticket.touch();
                Ok(())
            })
            .await?;
        self.store
            .update(ticket_id, |ticket| {
                let approved = validation.approved;
                ticket.attach_validation(validation)?;
                if approved {
                    ticket.touch();
                } else {
                    ticket.complete();
                }
                Ok(())
            })
            .await
    }

    async fn answer_directly(
        &self,
        ticket_id: &str,
        kind: QueryKind,
        question: &str,
    ) -> Result<Ticket, TriageError> {
        let result = self.knowledge.answer(kind, question).await?;
        self.finish_with_query(ticket_id, result).await
    }

    async fn finish_with_query(
        &self,
        ticket_id: &str,
        result: triage_core::QueryResult,
    ) -> Result<Ticket, TriageError> {
        self.store
            .update(ticket_id, |ticket| {
                ticket.attach_query(result)?;
                ticket.complete();
                Ok(())
            })
            .await
    }

    async fn fail_ticket(&self, ticket_id: &str, error: &TriageError) -> Result<Ticket, TriageError> {
        tracing::warn!(ticket_id, code = error.code(), error = %error, "ticket failed");
        let code = error.code();
        let message = error.to_string();
        self.store
            .update(ticket_id, |ticket| {
                ticket.fail(code, message);
                Ok(())
            })
            .await
    }

    /// Executes the stored plan of `ticket_id` after a human approved it.
    ///
    /// `plan` must be the plan the approver saw; it is compared to the stored one by
    /// fingerprint. The ticket stays leased from the checks through the final commit.
    pub async fn approve_execution(
        &self,
        ticket_id: &str,
        plan: &ResolutionPlan,
        principal: &str,
    ) -> Result<ExecutionResult, TriageError> {
        let mut lease = self.store.lease(ticket_id).await?;
        let ticket = lease.ticket();
        if ticket.category != Some(QueryCategory::Resolution) {
            return Err(TriageError::NotAResolution(ticket_id.to_string()));
        }
        let Some(stored_plan) = ticket.data.resolution.clone() else {
            return Err(TriageError::NotAResolution(ticket_id.to_string()));
        };
        if !ticket.is_approvable() {
            return Err(TriageError::NotApproved(ticket_id.to_string()));
        }
        if ticket.data.execution.is_some() {
            return Err(TriageError::AlreadyExecuted(ticket_id.to_string()));
        }
        let fingerprint = stored_plan.fingerprint();
        if plan.fingerprint() != fingerprint {
            return Err(TriageError::PlanMismatch(ticket_id.to_string()));
        }
        if !self
            .rbac
            .has_permission(principal, PERMISSION_APPROVE_REMEDIATION)
        {
            tracing::warn!(ticket_id, principal, "approval denied");
            return Err(TriageError::PermissionDenied {
                principal: principal.to_string(),
                permission: PERMISSION_APPROVE_REMEDIATION.to_string(),
            });
        }

        lease.ticket_mut().record_approval(ApprovalRecord {
            approved_by: principal.to_string(),
            approved_at: current_rfc3339(),
            plan_fingerprint: fingerprint,
        })?;
        self.store.commit(&lease).await?;
        tracing::info!(ticket_id, principal, "plan approved, executing");

        let result = self.executor.execute(&stored_plan).await;
        lease.ticket_mut().record_execution(result.clone())?;
        if let Err(error) = self.store.commit(&lease).await {
            tracing::error!(ticket_id, error = %error, "execution result not persisted");
            lease.ticket_mut().fail(
                error.code(),
                format!("execution finished but its result was not persisted: {error}"),
            );
            if let Err(retry) = self.store.commit(&lease).await {
                tracing::error!(ticket_id, error = %retry, "ticket left without its execution result");
            }
            return Err(error);
        }
        Ok(result)
    }

    pub async fn get_ticket(&self, ticket_id: &str) -> Result<Ticket, TriageError> {
        self.store
            .get(ticket_id)
            .await
            .ok_or_else(|| TriageError::TicketNotFound(ticket_id.to_string()))
    }

    pub async fn list_tickets(&self) -> Vec<Ticket> {
        self.store.list().await
    }
}
