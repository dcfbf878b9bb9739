use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use triage_core::{CommandCatalog, Inventory, QueryCategory, Target, TriageError};

use crate::engine::ReasoningEngine;
use crate::extract_json_object;

const RESOLUTION_WORDS: &[&str] = &[
    "502", "503", "504", "broken", "crash", "crashed", "crashing", "dead", "down", "error",
    "errors", "fail", "failed", "failing", "fix", "hang", "hanging", "outage", "restart",
    "stopped", "timeout", "unreachable", "unresponsive",
];
const RESOLUTION_PHRASES: &[&str] = &["not working", "not responding", "won't start", "keeps dying"];
const INFRASTRUCTURE_WORDS: &[&str] = &[
    "cpu", "disk", "health", "healthy", "inventory", "load", "memory", "ram", "servers",
    "space", "status", "uptime", "usage",
];
const API_WORDS: &[&str] = &["api", "endpoint", "endpoints", "json", "rest", "webhook"];

/// Outcome of classification. Each variant carries only what its branch needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    InfrastructureQuery {
        target: Option<Target>,
        reason: String,
    },
    KnowledgeQuery {
        reason: String,
    },
    ApiQuery {
        reason: String,
    },
    Resolution {
        target: Option<Target>,
        reason: String,
    },
}

impl Classification {
    pub fn category(&self) -> QueryCategory {
        match self {
            Self::InfrastructureQuery { .. } => QueryCategory::InfrastructureQuery,
            Self::KnowledgeQuery { .. } => QueryCategory::KnowledgeQuery,
            Self::ApiQuery { .. } => QueryCategory::ApiQuery,
            Self::Resolution { .. } => QueryCategory::Resolution,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::InfrastructureQuery { reason, .. }
            | Self::KnowledgeQuery { reason }
            | Self::ApiQuery { reason }
            | Self::Resolution { reason, .. } => reason,
        }
    }

    pub fn target(&self) -> Option<&Target> {
        match self {
            Self::InfrastructureQuery { target, .. } | Self::Resolution { target, .. } => {
                target.as_ref()
            }
            Self::KnowledgeQuery { .. } | Self::ApiQuery { .. } => None,
        }
    }

    fn build(category: QueryCategory, reason: String, target: Option<Target>) -> Self {
        match category {
            QueryCategory::InfrastructureQuery => Self::InfrastructureQuery { target, reason },
            QueryCategory::KnowledgeQuery => Self::KnowledgeQuery { reason },
            QueryCategory::ApiQuery => Self::ApiQuery { reason },
            QueryCategory::Resolution => Self::Resolution { target, reason },
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, issue: &str) -> Result<Classification, TriageError>;
}

fn words_of(text: &str) -> BTreeSet<String> {
    text.to_ascii_lowercase()
        .split(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '\''))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Target named in the text, falling back to the first host of a mentioned service.
fn locate_target(inventory: &Inventory, catalog: &CommandCatalog, text: &str) -> Option<Target> {
    inventory.find_target(text).or_else(|| {
        catalog
            .service_mentioned_in(text)
            .and_then(|service| inventory.resolve(None, Some(service)))
    })
}

/// Deterministic word-list classifier used when no engine is configured.
pub struct KeywordClassifier {
    inventory: Arc<Inventory>,
    catalog: Arc<CommandCatalog>,
}

impl KeywordClassifier {
    pub fn new(inventory: Arc<Inventory>, catalog: Arc<CommandCatalog>) -> Self {
        Self { inventory, catalog }
    }

    pub fn classify_text(&self, issue: &str) -> Classification {
        let words = words_of(issue);
        let lowered = issue.to_ascii_lowercase();
        let has_any = |list: &[&str]| list.iter().any(|word| words.contains(*word));
        let reports_fault = has_any(RESOLUTION_WORDS)
            || RESOLUTION_PHRASES
                .iter()
                .any(|phrase| lowered.contains(phrase));
        let target = locate_target(&self.inventory, &self.catalog, issue);

        if reports_fault {
            let reason = match &target {
                Some(target) => format!("reported fault on {}", target.server),
                None => "reported fault without a known server".to_string(),
            };
            return Classification::Resolution { target, reason };
        }
        if target.is_some() || has_any(INFRASTRUCTURE_WORDS) {
            return Classification::InfrastructureQuery {
                target,
                reason: "asks about infrastructure state".to_string(),
            };
        }
        if has_any(API_WORDS) {
            return Classification::ApiQuery {
                reason: "asks about an API".to_string(),
            };
        }
        Classification::KnowledgeQuery {
            reason: "general question with no infrastructure reference".to_string(),
        }
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, issue: &str) -> Result<Classification, TriageError> {
        if issue.trim().is_empty() {
            return Err(TriageError::EmptyIssue);
        }
        Ok(self.classify_text(issue))
    }
}

fn string_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

/// Maps raw model output onto a [`Classification`].
///
/// Output that is not a JSON object with a known category becomes a knowledge
/// query, so the result is always one of the four categories.
pub fn parse_classification_response(
    raw: &str,
    issue: &str,
    inventory: &Inventory,
    catalog: &CommandCatalog,
) -> Classification {
    let Some(value) = extract_json_object(raw) else {
        return Classification::KnowledgeQuery {
            reason: "classifier response could not be parsed".to_string(),
        };
    };
    let Some(category) = string_field(&value, "category").and_then(QueryCategory::parse_label)
    else {
        return Classification::KnowledgeQuery {
            reason: "classifier returned an unknown category".to_string(),
        };
    };
    let reason = string_field(&value, "reason")
        .unwrap_or("no reason provided")
        .to_string();
    let target = match category {
        QueryCategory::InfrastructureQuery | QueryCategory::Resolution => inventory
            .resolve(string_field(&value, "server"), string_field(&value, "service"))
            .or_else(|| locate_target(inventory, catalog, issue)),
        QueryCategory::KnowledgeQuery | QueryCategory::ApiQuery => None,
    };
    Classification::build(category, reason, target)
}

/// Classifier that asks the reasoning engine for a strict JSON verdict.
pub struct LlmClassifier {
    engine: Arc<dyn ReasoningEngine>,
    inventory: Arc<Inventory>,
    catalog: Arc<CommandCatalog>,
}

impl LlmClassifier {
    pub fn new(
        engine: Arc<dyn ReasoningEngine>,
        inventory: Arc<Inventory>,
        catalog: Arc<CommandCatalog>,
    ) -> Self {
        Self {
            engine,
            inventory,
            catalog,
        }
    }

    fn prompt(&self, issue: &str) -> String {
        let servers = self
            .inventory
            .iter()
            .map(|(name, spec)| format!("- {name} ({}): {}", spec.ip, spec.services.join(", ")))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "You are an IT support triage agent.\n\
             Classify the issue into exactly one category:\n\
             - infrastructure_query: asks about the state of servers or services\n\
             - knowledge_query: general IT question unrelated to these servers\n\
             - api_query: question about an API\n\
             - resolution: reports a fault on a server or service that needs fixing\n\n\
             Known servers:\n{servers}\n\n\
             Issue:\n{issue}\n\n\
             Respond only with JSON: {{\"category\": \"...\", \"reason\": \"...\", \"server\": \"<name or null>\", \"service\": \"<name or null>\"}}"
        )
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, issue: &str) -> Result<Classification, TriageError> {
        if issue.trim().is_empty() {
            return Err(TriageError::EmptyIssue);
        }
        let raw = self
            .engine
            .generate(&self.prompt(issue), true)
            .await
            .map_err(|error| TriageError::ClassificationUnavailable(error.to_string()))?;
        let classification =
            parse_classification_response(&raw, issue, &self.inventory, &self.catalog);
        tracing::debug!(
            category = classification.category().as_str(),
            reason = classification.reason(),
            "classified issue"
        );
        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::engine::ReasoningError;

    struct FixedEngine(Result<String, String>);

    #[async_trait]
    impl ReasoningEngine for FixedEngine {
        async fn generate(&self, _prompt: &str, _json_mode: bool) -> Result<String, ReasoningError> {
            self.0
                .clone()
                .map_err(ReasoningError::InvalidResponse)
        }
    }

    fn keyword() -> KeywordClassifier {
        KeywordClassifier::new(
            Arc::new(Inventory::default()),
            Arc::new(CommandCatalog::default()),
        )
    }

    fn llm(response: Result<String, String>) -> LlmClassifier {
        LlmClassifier::new(
            Arc::new(FixedEngine(response)),
            Arc::new(Inventory::default()),
            Arc::new(CommandCatalog::default()),
        )
    }

    #[test]
    fn unit_keyword_classifier_routes_by_intent() {
        let classifier = keyword();
        let classification = classifier.classify_text("Nginx is returning 502 errors");
        assert_eq!(classification.category(), QueryCategory::Resolution);
        let target = classification.target().expect("target");
        assert_eq!(target.server, "web01");
        assert_eq!(target.service.as_deref(), Some("nginx"));

        assert_eq!(
            classifier
                .classify_text("What is the memory usage on db01?")
                .category(),
            QueryCategory::InfrastructureQuery
        );
        assert_eq!(
            classifier
                .classify_text("How do I paginate the REST api?")
                .category(),
            QueryCategory::ApiQuery
        );
        assert_eq!(
            classifier
                .classify_text("What is the difference between Docker and Kubernetes?")
                .category(),
            QueryCategory::KnowledgeQuery
        );
    }

    #[tokio::test]
    async fn unit_empty_issue_is_rejected() {
        let error = keyword().classify("   ").await.expect_err("empty");
        assert!(matches!(error, TriageError::EmptyIssue));
        let error = llm(Ok("{}".to_string())).classify("").await.expect_err("empty");
        assert!(matches!(error, TriageError::EmptyIssue));
    }

    #[tokio::test]
    async fn unit_llm_legacy_category_and_hints_are_honoured() {
        let classifier = llm(Ok(
            r#"{"category":"needs_resolution","reason":"db crash","server":"db-server-01","service":"mysql"}"#
                .to_string(),
        ));
        let classification = classifier.classify("database is down").await.expect("classify");
        assert_eq!(classification.category(), QueryCategory::Resolution);
        let target = classification.target().expect("target");
        assert_eq!(target.server, "db01");
        assert_eq!(target.service.as_deref(), Some("mysql"));
        assert_eq!(classification.reason(), "db crash");
    }

    #[tokio::test]
    async fn unit_llm_unparseable_output_becomes_knowledge_query() {
        let classification = llm(Ok("I think this is about servers".to_string()))
            .classify("what is going on")
            .await
            .expect("classify");
        assert_eq!(classification.category(), QueryCategory::KnowledgeQuery);
    }

    #[tokio::test]
    async fn unit_llm_engine_failure_is_classification_unavailable() {
        let error = llm(Err("connection refused".to_string()))
            .classify("nginx is down")
            .await
            .expect_err("unavailable");
        assert!(matches!(error, TriageError::ClassificationUnavailable(_)));
    }

    proptest! {
        #[test]
        fn property_parsed_category_is_always_in_enum(raw in any::<String>(), issue in "[a-z ]{1,40}") {
            let inventory = Inventory::default();
            let catalog = CommandCatalog::default();
            let classification = parse_classification_response(&raw, &issue, &inventory, &catalog);
            prop_assert!(QueryCategory::ALL.contains(&classification.category()));
        }

        #[test]
        fn property_keyword_classifier_is_total(issue in any::<String>()) {
            let classification = keyword().classify_text(&issue);
            prop_assert!(QueryCategory::ALL.contains(&classification.category()));
            if classification.category() == QueryCategory::KnowledgeQuery {
                prop_assert!(classification.target().is_none());
            }
        }
    }
}
