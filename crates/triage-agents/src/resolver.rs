use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use triage_core::{
    is_read_only_command, AllowList, RenderedCommand, ResolutionPlan, Severity, Step, TriageError,
};

use crate::engine::ReasoningEngine;
use crate::extract_json_object;

const SUMMARY_MAX_CHARS: usize = 160;
const HIGH_SEVERITY_WORDS: &[&str] = &["502", "503", "504", "crash", "down", "outage", "unreachable"];

#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(
        &self,
        issue: &str,
        server: &str,
        service: &str,
    ) -> Result<ResolutionPlan, TriageError>;
}

/// What the engine contributed to a plan. Everything here is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct EngineDraft {
    summary: Option<String>,
    severity: Option<Severity>,
    intents: Vec<String>,
    risks: Vec<String>,
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_engine_draft(raw: &str) -> Option<EngineDraft> {
    let value = extract_json_object(raw)?;
    Some(EngineDraft {
        summary: value
            .get("issue_summary")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|summary| !summary.is_empty())
            .map(str::to_string),
        severity: value
            .get("severity")
            .and_then(Value::as_str)
            .and_then(Severity::parse_label),
        intents: string_list(&value, "intents"),
        risks: string_list(&value, "risks"),
    })
}

fn summarize(issue: &str) -> String {
    let first_line = issue.lines().next().unwrap_or_default().trim();
    if first_line.chars().count() <= SUMMARY_MAX_CHARS {
        return first_line.to_string();
    }
    let mut summary: String = first_line.chars().take(SUMMARY_MAX_CHARS).collect();
    summary.push_str("...");
    summary
}

fn heuristic_severity(issue: &str) -> Severity {
    let lowered = issue.to_ascii_lowercase();
    if HIGH_SEVERITY_WORDS
        .iter()
        .any(|word| lowered.split(|ch: char| !ch.is_ascii_alphanumeric()).any(|token| token == *word))
    {
        Severity::High
    } else {
        Severity::Medium
    }
}

fn to_step(entry: &RenderedCommand) -> Step {
    Step {
        step: entry.action.clone(),
        intent: Some(entry.intent.clone()),
        phase: entry.phase,
        purpose: entry.purpose.clone(),
        validation: entry.validation.clone(),
        rollback: entry.rollback.clone(),
    }
}

/// Keeps the selected intents, or the whole playbook when nothing known was selected.
fn select_entries<'a>(playbook: &'a [RenderedCommand], intents: &[String]) -> Vec<&'a RenderedCommand> {
    let wanted: BTreeSet<&str> = intents.iter().map(String::as_str).collect();
    let selected: Vec<&RenderedCommand> = playbook
        .iter()
        .filter(|entry| wanted.contains(entry.intent.as_str()))
        .collect();
    if selected.is_empty() {
        playbook.iter().collect()
    } else {
        selected
    }
}

/// Builds plans exclusively from the rendered playbook of the target service.
pub struct CatalogResolver {
    allow_list: Arc<AllowList>,
    engine: Option<Arc<dyn ReasoningEngine>>,
}

impl CatalogResolver {
    pub fn new(allow_list: Arc<AllowList>) -> Self {
        Self {
            allow_list,
            engine: None,
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn ReasoningEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    async fn draft(&self, issue: &str, server: &str, service: &str, playbook: &[RenderedCommand]) -> EngineDraft {
        let Some(engine) = &self.engine else {
            return EngineDraft::default();
        };
        let intents = playbook
            .iter()
            .map(|entry| format!("- {}: {}", entry.intent, entry.purpose))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "You are drafting a remediation for {service} on {server}.\n\
             Issue:\n{issue}\n\n\
             Available actions (choose by intent name only):\n{intents}\n\n\
             Respond only with JSON: {{\"issue_summary\": \"...\", \"severity\": \"low|medium|high\", \"intents\": [\"...\"], \"risks\": [\"...\"]}}"
        );
        match engine.generate(&prompt, true).await {
            Ok(raw) => parse_engine_draft(&raw).unwrap_or_else(|| {
                tracing::warn!(server, service, "resolver draft unparseable, using full playbook");
                EngineDraft::default()
            }),
            Err(error) => {
                tracing::warn!(server, service, error = %error, "resolver draft failed, using full playbook");
                EngineDraft::default()
            }
        }
    }
}

#[async_trait]
impl Resolver for CatalogResolver {
    async fn resolve(
        &self,
        issue: &str,
        server: &str,
        service: &str,
    ) -> Result<ResolutionPlan, TriageError> {
        let playbook = self
            .allow_list
            .playbook(server, service)
            .filter(|playbook| !playbook.is_empty())
            .ok_or_else(|| TriageError::NoPlaybook {
                server: server.to_string(),
                service: service.to_string(),
            })?;

        let draft = self.draft(issue, server, service, playbook).await;
        let mut steps: Vec<Step> = select_entries(playbook, &draft.intents)
            .into_iter()
            .filter(|entry| {
                let read_only = is_read_only_command(&entry.validation);
                if !read_only {
                    tracing::warn!(server, service, intent = %entry.intent, "skipping step with mutating validation");
                }
                read_only
            })
            .map(to_step)
            .collect();
        if steps.is_empty() {
            return Err(TriageError::NoPlaybook {
                server: server.to_string(),
                service: service.to_string(),
            });
        }
        // Stable: catalog order is kept within a phase.
        steps.sort_by_key(|step| step.phase);

        Ok(ResolutionPlan {
            issue_summary: draft.summary.unwrap_or_else(|| summarize(issue)),
            service: service.to_string(),
            server: server.to_string(),
            severity: draft.severity.unwrap_or_else(|| heuristic_severity(issue)),
            resolution_steps: steps,
            risks: draft.risks,
            prerequisites: vec![format!("{server} reachable over SSH")],
        })
    }
}
