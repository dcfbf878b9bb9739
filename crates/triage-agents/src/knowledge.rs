use std::sync::Arc;

use serde_json::Value;
use triage_core::{QueryKind, QueryResult, TriageError};

use crate::engine::ReasoningEngine;
use crate::extract_json_object;

const ESCALATION_ANSWER: &str =
    "No reasoning engine is configured to answer this question. Please escalate it to the support team.";

/// Answers knowledge and API questions directly, without touching servers.
pub struct KnowledgeResponder {
    engine: Option<Arc<dyn ReasoningEngine>>,
}

impl KnowledgeResponder {
    pub fn new(engine: Option<Arc<dyn ReasoningEngine>>) -> Self {
        Self { engine }
    }

    fn prompt(kind: QueryKind, question: &str) -> String {
        let role = match kind {
            QueryKind::ApiAnswer => "an API integration specialist",
            _ => "an IT support engineer",
        };
        format!(
            "You are {role}. Answer the question concisely.\n\
             Question:\n{question}\n\n\
             Respond only with JSON: {{\"reasoning\": \"...\", \"answer\": \"...\"}}"
        )
    }

    pub async fn answer(&self, kind: QueryKind, question: &str) -> Result<QueryResult, TriageError> {
        let Some(engine) = &self.engine else {
            return Ok(QueryResult {
                kind,
                reasoning: "answered without a reasoning engine".to_string(),
                answer: ESCALATION_ANSWER.to_string(),
                servers: Vec::new(),
            });
        };

        let raw = engine
            .generate(&Self::prompt(kind, question), true)
            .await
            .map_err(|error| TriageError::ReasoningUnavailable(error.to_string()))?;
        let (reasoning, answer) = match extract_json_object(&raw) {
            Some(value) => {
                let field = |key: &str| {
                    value
                        .get(key)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .unwrap_or_default()
                        .to_string()
                };
                (field("reasoning"), field("answer"))
            }
            None => (String::new(), raw.trim().to_string()),
        };
        if answer.is_empty() {
            return Err(TriageError::ReasoningUnavailable(
                "reasoning engine returned an empty answer".to_string(),
            ));
        }
        Ok(QueryResult {
            kind,
            reasoning,
            answer,
            servers: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::engine::ReasoningError;

    struct FixedEngine(Result<String, String>);

    #[async_trait]
    impl ReasoningEngine for FixedEngine {
        async fn generate(&self, _prompt: &str, _json_mode: bool) -> Result<String, ReasoningError> {
            self.0.clone().map_err(ReasoningError::InvalidResponse)
        }
    }

    fn responder(response: Result<String, String>) -> KnowledgeResponder {
        KnowledgeResponder::new(Some(Arc::new(FixedEngine(response))))
    }

    #[tokio::test]
    async fn unit_without_engine_answer_escalates() {
        let result = KnowledgeResponder::new(None)
            .answer(QueryKind::KnowledgeAnswer, "docker vs kubernetes?")
            .await
            .expect("answer");
        assert_eq!(result.kind, QueryKind::KnowledgeAnswer);
        assert!(result.answer.contains("escalate"));
    }

    #[tokio::test]
    async fn functional_engine_json_answer_is_used() {
        let result = responder(Ok(
            r#"{"reasoning":"pagination question","answer":"Use the cursor parameter."}"#.to_string(),
        ))
        .answer(QueryKind::ApiAnswer, "How do I paginate?")
        .await
        .expect("answer");
        assert_eq!(result.kind, QueryKind::ApiAnswer);
        assert_eq!(result.reasoning, "pagination question");
        assert_eq!(result.answer, "Use the cursor parameter.");
    }

    #[tokio::test]
    async fn functional_plain_text_answer_is_kept() {
        let result = responder(Ok("Containers share the host kernel.".to_string()))
            .answer(QueryKind::KnowledgeAnswer, "what is a container")
            .await
            .expect("answer");
        assert_eq!(result.answer, "Containers share the host kernel.");
    }

    #[tokio::test]
    async fn unit_engine_failure_is_reasoning_unavailable() {
        let error = responder(Err("connection refused".to_string()))
            .answer(QueryKind::KnowledgeAnswer, "anything")
            .await
            .expect_err("unavailable");
        assert!(matches!(error, TriageError::ReasoningUnavailable(_)));
    }
}
