//! Core data models used throughout DocSense.
//!
//! These types represent the documents, analyses, and search results that flow
//! through the intake and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Metadata derived once from a document's extracted text.
///
/// Immutable after creation; a new upload with different bytes always
/// recomputes it from scratch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Lowercased file extension including the dot (e.g. `".pdf"`).
    pub ext: String,
    /// Language tag (`"eng"`, `"malayalam"`, `"bilingual_en_ml"`, `"unknown"`, …).
    pub language: String,
    pub is_bilingual: bool,
    /// One of the fixed category set; `"Unknown"` when no text was extracted.
    pub doc_type: String,
    pub suggested_role: String,
    pub char_count: usize,
}

/// Heuristic, non-ML extraction of actionable snippets.
///
/// Every list is hard-capped (10/10/10/5) so adversarially large documents
/// cannot grow it; truncation is silent and keeps document order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuickView {
    pub bullets: Vec<String>,
    pub dates: Vec<String>,
    pub amounts: Vec<String>,
    pub risks: Vec<String>,
}

/// Severity attached to a compliance flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A single fired compliance rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceFlag {
    pub rule_id: String,
    pub message: String,
    pub severity: Severity,
}

/// Output of the out-of-scope analysis collaborator.
///
/// Untrusted, partially-present input: every field tolerates absence, and a
/// payload that is not a JSON object degrades to the `raw` holder instead of
/// failing intake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_entities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_items: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compliance: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub summary: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl ExternalAnalysis {
    /// Best-effort parse of an arbitrary collaborator payload.
    ///
    /// Recognized fields are picked when present; list entries are coerced to
    /// strings where the schema expects them. Anything that is not a JSON
    /// object lands in `raw`.
    pub fn from_value(value: serde_json::Value) -> Self {
        let serde_json::Value::Object(map) = value else {
            return Self {
                raw: Some(coerce_string(&value)),
                ..Default::default()
            };
        };

        let string_field = |key: &str| -> Option<String> { map.get(key).map(coerce_string) };
        let string_list = |key: &str| -> Vec<String> {
            match map.get(key) {
                Some(serde_json::Value::Array(items)) => items.iter().map(coerce_string).collect(),
                Some(other) => vec![coerce_string(other)],
                None => Vec::new(),
            }
        };
        let value_list = |key: &str| -> Vec<serde_json::Value> {
            match map.get(key) {
                Some(serde_json::Value::Array(items)) => items.clone(),
                Some(other) => vec![other.clone()],
                None => Vec::new(),
            }
        };

        Self {
            classification: string_field("classification"),
            key_entities: string_list("key_entities"),
            action_items: value_list("action_items"),
            compliance: value_list("compliance"),
            risks: string_list("risks"),
            summary: string_list("summary"),
            error: string_field("error"),
            raw: string_field("raw"),
        }
    }
}

fn coerce_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The persisted unit returned by the document store's read paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Store-assigned, monotonic.
    pub id: i64,
    pub filename: String,
    /// Unique across all records; the sole deduplication key.
    pub content_hash: String,
    pub metadata: Metadata,
    pub quick_view: QuickView,
    pub external_analysis: Option<ExternalAnalysis>,
    pub compliance_flags: Vec<ComplianceFlag>,
    /// Unix timestamp (seconds).
    pub created_at: i64,
}

/// Result of a `DocumentStore::save` call.
#[derive(Debug, Clone, Copy)]
pub struct SaveOutcome {
    pub document_id: i64,
    /// True when the fingerprint was already known and the prior analysis
    /// was replaced instead of a new row being created.
    pub deduplicated: bool,
}

/// A snippet row from the store's lightweight lexical search.
#[derive(Debug, Clone, Serialize)]
pub struct BasicSearchHit {
    pub doc_id: i64,
    pub filename: String,
    pub doc_type: String,
    pub language: String,
    pub snippet: String,
}

/// A ranked result from the search engine.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub doc_id: i64,
    pub filename: String,
    pub score: f64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Retrieval strategy selector for the search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    FullText,
    Semantic,
    Hybrid,
}

/// A stored user, minus the credential column.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
}

/// Everything the intake entry point reports back to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct IntakeOutcome {
    pub document_id: i64,
    pub deduplicated: bool,
    pub metadata: Metadata,
    pub quick_view: QuickView,
    pub compliance_flags: Vec<ComplianceFlag>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_analysis_picks_known_fields() {
        let value = serde_json::json!({
            "classification": "Safety",
            "risks": ["track intrusion", {"kind": "structural"}],
            "summary": ["line one"],
            "ignored": true,
        });
        let parsed = ExternalAnalysis::from_value(value);
        assert_eq!(parsed.classification.as_deref(), Some("Safety"));
        assert_eq!(parsed.risks.len(), 2);
        assert!(parsed.risks[1].contains("structural"));
        assert_eq!(parsed.summary, vec!["line one".to_string()]);
        assert!(parsed.error.is_none());
    }

    #[test]
    fn external_analysis_non_object_degrades_to_raw() {
        let parsed = ExternalAnalysis::from_value(serde_json::json!("not json at all"));
        assert_eq!(parsed.raw.as_deref(), Some("not json at all"));
        assert!(parsed.classification.is_none());
        assert!(parsed.risks.is_empty());
    }

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::High).unwrap();
        assert_eq!(json, "\"high\"");
    }
}
