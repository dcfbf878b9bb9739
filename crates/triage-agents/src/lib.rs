//! Reasoning steps of the triage workflow: classify, resolve, validate, answer.
//!
//! Each step is a trait with a deterministic implementation and, where it makes
//! sense, one backed by a [`ReasoningEngine`].

mod anomaly;
mod classifier;
mod engine;
mod knowledge;
mod resolver;
mod validator;

pub use anomaly::{analyze_server_metrics, detect_anomalies, DEFAULT_Z_SCORE_THRESHOLD};
pub use classifier::{
    parse_classification_response, Classification, Classifier, KeywordClassifier, LlmClassifier,
};
pub use engine::{OllamaConfig, OllamaEngine, ReasoningEngine, ReasoningError};
pub use knowledge::KnowledgeResponder;
pub use resolver::{CatalogResolver, Resolver};
pub use validator::{PolicyValidator, Validator};

/// Extracts the first JSON object embedded in model output.
pub(crate) fn extract_json_object(raw: &str) -> Option<serde_json::Value> {
    let trimmed = raw.trim();
    if let Ok(value @ serde_json::Value::Object(_)) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&trimmed[start..=end]) {
        Ok(value @ serde_json::Value::Object(_)) => Some(value),
        _ => None,
    }
}
